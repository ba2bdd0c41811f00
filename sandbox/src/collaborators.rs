//! HTML-convert and summarize collaborators (§6.1): narrow interfaces the
//! sandbox consumes instead of reimplementing a full HTML-to-markdown
//! pipeline or an LLM client.

use async_trait::async_trait;
use thiserror::Error;

pub trait HtmlConverter: Send + Sync {
    /// Non-HTML input passes through unchanged, per the `convert_html` host
    /// ABI contract.
    fn convert(&self, html: &str) -> String;
}

pub struct PassthroughHtmlConverter;

impl HtmlConverter for PassthroughHtmlConverter {
    fn convert(&self, html: &str) -> String {
        html.to_string()
    }
}

/// Strips tags while preserving block-level breaks, enough to turn
/// fetched HTML into a readable plain-text approximation without pulling
/// in a full markdown-conversion dependency.
pub struct HeuristicHtmlConverter;

const BLOCK_TAGS: &[&str] = &["p", "div", "br", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6"];

impl HtmlConverter for HeuristicHtmlConverter {
    fn convert(&self, html: &str) -> String {
        if !looks_like_html(html) {
            return html.to_string();
        }

        let mut output = String::with_capacity(html.len());
        let mut in_tag = false;
        let mut tag_name = String::new();
        for ch in html.chars() {
            match ch {
                '<' => {
                    in_tag = true;
                    tag_name.clear();
                }
                '>' => {
                    in_tag = false;
                    let name = tag_name.trim_start_matches('/').to_ascii_lowercase();
                    if BLOCK_TAGS.contains(&name.as_str()) {
                        output.push('\n');
                    }
                }
                c if in_tag => tag_name.push(c),
                c => output.push(c),
            }
        }
        collapse_blank_lines(&output)
    }
}

fn looks_like_html(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('<') || text.to_ascii_lowercase().contains("<html")
}

fn collapse_blank_lines(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        result.push_str(line.trim());
        result.push('\n');
    }
    result.trim().to_string()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SummarizeError {
    #[error("no summarizer is configured")]
    Unconfigured,

    #[error("summarization call failed: {0}")]
    Call(String),
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, prompt: &str, text: &str) -> Result<String, SummarizeError>;
}

pub struct NoSummarizer;

#[async_trait]
impl Summarizer for NoSummarizer {
    async fn summarize(&self, _prompt: &str, _text: &str) -> Result<String, SummarizeError> {
        Err(SummarizeError::Unconfigured)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn passthrough_returns_input_unchanged() {
        let converter = PassthroughHtmlConverter;
        assert_eq!(converter.convert("<p>hi</p>"), "<p>hi</p>");
    }

    #[test]
    fn heuristic_strips_tags_and_keeps_block_breaks() {
        let converter = HeuristicHtmlConverter;
        let converted = converter.convert("<p>first</p><p>second</p>");
        assert!(converted.contains("first"));
        assert!(converted.contains("second"));
        assert!(!converted.contains('<'));
    }

    #[test]
    fn heuristic_passes_through_non_html() {
        let converter = HeuristicHtmlConverter;
        assert_eq!(converter.convert("plain text, no markup"), "plain text, no markup");
    }

    #[tokio::test]
    async fn no_summarizer_is_always_unconfigured() {
        let summarizer = NoSummarizer;
        assert_eq!(
            summarizer.summarize("summarize", "text").await,
            Err(SummarizeError::Unconfigured)
        );
    }
}
