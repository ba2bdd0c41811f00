//! The LLM-judge external collaborator (§4.E.1). The authorization core
//! depends only on this trait, never on a concrete provider SDK.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct JudgePrompt {
    pub tool_name: String,
    pub redacted_params: String,
    pub secret_matches: Vec<super::secrets::SecretMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeVerdict {
    pub allowed: bool,
    pub reason: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JudgeError {
    #[error("no LLM judge is configured")]
    Unconfigured,

    #[error("LLM judge call failed: {0}")]
    Call(String),

    #[error("LLM judge response was not valid JSON: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait LlmJudge: Send + Sync {
    async fn judge(&self, prompt: JudgePrompt) -> Result<JudgeVerdict, JudgeError>;
}

/// Default judge when no LLM client is wired up. Matches "on no LLM
/// client, deny with requires_user_input=true" by always returning
/// `Unconfigured`, which the authorization core maps to that outcome.
pub struct NoJudge;

#[async_trait]
impl LlmJudge for NoJudge {
    async fn judge(&self, _prompt: JudgePrompt) -> Result<JudgeVerdict, JudgeError> {
        Err(JudgeError::Unconfigured)
    }
}

/// Parses the judge's required `{allowed: bool, reason: string}` JSON
/// contract. Any deviation is a caller-side `InvalidResponse`, never a
/// panic or a silent default-allow.
pub fn parse_verdict(raw: &str) -> Result<JudgeVerdict, JudgeError> {
    #[derive(serde::Deserialize)]
    struct Raw {
        allowed: bool,
        #[serde(default)]
        reason: String,
    }
    let parsed: Raw =
        serde_json::from_str(raw).map_err(|err| JudgeError::InvalidResponse(err.to_string()))?;
    Ok(JudgeVerdict {
        allowed: parsed.allowed,
        reason: parsed.reason,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[tokio::test]
    async fn no_judge_is_always_unconfigured() {
        let judge = NoJudge;
        let result = judge
            .judge(JudgePrompt {
                tool_name: "shell".to_string(),
                redacted_params: String::new(),
                secret_matches: vec![],
            })
            .await;
        assert_eq!(result, Err(JudgeError::Unconfigured));
    }

    #[test]
    fn parse_verdict_rejects_malformed_json() {
        assert!(parse_verdict("not json").is_err());
    }

    #[test]
    fn parse_verdict_accepts_contract_shape() {
        let verdict = parse_verdict(r#"{"allowed": true, "reason": "looks fine"}"#).unwrap();
        assert_eq!(verdict.allowed, true);
        assert_eq!(verdict.reason, "looks fine");
    }
}
