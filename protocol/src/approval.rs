//! The human-approval round trip (§4.I). Mirrors the teacher's
//! `protocol.rs::ReviewDecision`, extended with the outcome wrapper the
//! interactive approval client returns once a request is resolved (approved,
//! timed out, or cancelled by a superseding deadline/cancellation).

use serde::Deserialize;
use serde::Serialize;

/// The user's answer to a single approval prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    ApprovedForSession,
    #[default]
    Denied,
    Abort,
}

impl ReviewDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, ReviewDecision::Approved | ReviewDecision::ApprovedForSession)
    }

    pub fn persists_for_session(&self) -> bool {
        matches!(self, ReviewDecision::ApprovedForSession)
    }
}

/// What actually happened to an outstanding approval request. Distinct from
/// `ReviewDecision` because a request can resolve without ever getting a
/// decision from the user (deadline fired, or the run was cancelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ApprovalOutcome {
    Decided { decision: ReviewDecision },
    TimedOut,
    Cancelled,
}

impl ApprovalOutcome {
    pub fn allows_execution(&self) -> bool {
        matches!(self, ApprovalOutcome::Decided { decision } if decision.is_approved())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn denied_is_default_and_not_approved() {
        assert_eq!(ReviewDecision::default(), ReviewDecision::Denied);
        assert!(!ReviewDecision::Denied.is_approved());
    }

    #[test]
    fn approved_for_session_persists() {
        assert!(ReviewDecision::ApprovedForSession.persists_for_session());
        assert!(!ReviewDecision::Approved.persists_for_session());
    }

    #[test]
    fn timed_out_and_cancelled_never_allow_execution() {
        assert!(!ApprovalOutcome::TimedOut.allows_execution());
        assert!(!ApprovalOutcome::Cancelled.allows_execution());
        assert!(ApprovalOutcome::Decided {
            decision: ReviewDecision::Approved
        }
        .allows_execution());
    }
}
