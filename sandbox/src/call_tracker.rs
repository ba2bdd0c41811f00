//! Append-only per-invocation record of host-function calls, surfaced in
//! execution metadata for observability.

use std::sync::Mutex;

const DETAIL_MAX_LEN: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub name: String,
    pub detail: String,
}

#[derive(Default)]
pub struct CallTracker {
    records: Mutex<Vec<CallRecord>>,
}

impl CallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: impl Into<String>, detail: impl AsRef<str>) {
        let detail = truncate(detail.as_ref());
        self.records
            .lock()
            .expect("call tracker mutex poisoned")
            .push(CallRecord { name: name.into(), detail });
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().expect("call tracker mutex poisoned").clone()
    }
}

fn truncate(detail: &str) -> String {
    if detail.chars().count() <= DETAIL_MAX_LEN {
        detail.to_string()
    } else {
        let mut truncated: String = detail.chars().take(DETAIL_MAX_LEN).collect();
        truncated.push('\u{2026}');
        truncated
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn long_detail_is_truncated_with_ellipsis() {
        let tracker = CallTracker::new();
        tracker.record("fetch", "x".repeat(200));
        let records = tracker.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].detail.ends_with('\u{2026}'));
        assert_eq!(records[0].detail.chars().count(), DETAIL_MAX_LEN + 1);
    }

    #[test]
    fn short_detail_is_untouched() {
        let tracker = CallTracker::new();
        tracker.record("read_file", "a.txt");
        assert_eq!(tracker.records()[0].detail, "a.txt");
    }
}
