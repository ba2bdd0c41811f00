//! Interactive approval client (§4.I): a thin bridge to the human operator.
//! Calls block until the user responds, the call is cancelled, or an
//! implementation-defined timeout elapses. The client never mutates
//! session/config state itself — callers do, on approval — so denials
//! leave no trace.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use stec_protocol::ApprovalOutcome;
use stec_protocol::ReviewDecision;
use tokio::sync::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub tool_name: String,
    pub params: String,
    pub reason: String,
    pub suggested_prefix: String,
    pub tab_id: String,
}

#[derive(Debug, Clone)]
pub struct DomainAuthorizationRequest {
    pub host: String,
    pub reason: String,
    pub suggested_host: String,
    pub tab_id: String,
}

/// What the UI layer sees: a pending request plus the channel to answer it.
pub enum PendingRequest {
    Authorization(AuthorizationRequest, oneshot::Sender<ReviewDecision>),
    DomainAuthorization(DomainAuthorizationRequest, oneshot::Sender<ReviewDecision>),
}

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(300);

/// Dispatches pending requests to whatever surfaces them to a human (a TUI,
/// a CLI prompt, a remote operator channel); this crate only defines the
/// contract.
pub trait RequestSink: Send + Sync {
    fn submit(&self, request: PendingRequest);
}

pub struct NullSink;

impl RequestSink for NullSink {
    fn submit(&self, request: PendingRequest) {
        // No human is attached; every request auto-denies by dropping its
        // sender without a decision, which `ApprovalClient` maps to
        // `Cancelled` via the sender's drop — callers should prefer wiring
        // a real sink before relying on user-facing approval prompts.
        match request {
            PendingRequest::Authorization(_, tx) => drop(tx),
            PendingRequest::DomainAuthorization(_, tx) => drop(tx),
        }
    }
}

pub struct ApprovalClient {
    sink: Arc<dyn RequestSink>,
    timeout: Duration,
    tab_counter: Mutex<u64>,
}

impl ApprovalClient {
    pub fn new(sink: Arc<dyn RequestSink>) -> Self {
        Self {
            sink,
            timeout: DEFAULT_RESPONSE_TIMEOUT,
            tab_counter: Mutex::new(0),
        }
    }

    pub fn with_timeout(sink: Arc<dyn RequestSink>, timeout: Duration) -> Self {
        Self {
            sink,
            timeout,
            tab_counter: Mutex::new(0),
        }
    }

    async fn next_tab_id(&self) -> String {
        let mut counter = self.tab_counter.lock().await;
        *counter += 1;
        format!("tab-{counter}")
    }

    pub async fn request_authorization(
        &self,
        tool_name: &str,
        params: &str,
        reason: &str,
        suggested_prefix: &str,
        cancel: &CancellationToken,
    ) -> ApprovalOutcome {
        let tab_id = self.next_tab_id().await;
        let (tx, rx) = oneshot::channel();
        self.sink.submit(PendingRequest::Authorization(
            AuthorizationRequest {
                tool_name: tool_name.to_string(),
                params: params.to_string(),
                reason: reason.to_string(),
                suggested_prefix: suggested_prefix.to_string(),
                tab_id,
            },
            tx,
        ));
        self.await_decision(rx, cancel).await
    }

    pub async fn request_domain_authorization(
        &self,
        host: &str,
        reason: &str,
        suggested_host: &str,
        cancel: &CancellationToken,
    ) -> ApprovalOutcome {
        let tab_id = self.next_tab_id().await;
        let (tx, rx) = oneshot::channel();
        self.sink.submit(PendingRequest::DomainAuthorization(
            DomainAuthorizationRequest {
                host: host.to_string(),
                reason: reason.to_string(),
                suggested_host: suggested_host.to_string(),
                tab_id,
            },
            tx,
        ));
        self.await_decision(rx, cancel).await
    }

    async fn await_decision(
        &self,
        rx: oneshot::Receiver<ReviewDecision>,
        cancel: &CancellationToken,
    ) -> ApprovalOutcome {
        tokio::select! {
            _ = cancel.cancelled() => ApprovalOutcome::Cancelled,
            result = tokio::time::timeout(self.timeout, rx) => {
                match result {
                    Ok(Ok(decision)) => ApprovalOutcome::Decided { decision },
                    Ok(Err(_)) => ApprovalOutcome::Cancelled,
                    Err(_) => ApprovalOutcome::TimedOut,
                }
            }
        }
    }
}

/// An in-memory sink used by tests and the CLI harness: requests are
/// queued and answered programmatically instead of surfaced to a human.
pub struct QueueSink {
    pending: Mutex<HashMap<String, ()>>,
    auto_decision: ReviewDecision,
}

impl QueueSink {
    pub fn auto_respond(decision: ReviewDecision) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            auto_decision: decision,
        }
    }
}

impl RequestSink for QueueSink {
    fn submit(&self, request: PendingRequest) {
        let decision = self.auto_decision;
        match request {
            PendingRequest::Authorization(_, tx) => {
                let _ = tx.send(decision);
            }
            PendingRequest::DomainAuthorization(_, tx) => {
                let _ = tx.send(decision);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[tokio::test]
    async fn approved_decision_allows_execution() {
        let client = ApprovalClient::new(Arc::new(QueueSink::auto_respond(ReviewDecision::Approved)));
        let outcome = client
            .request_authorization("shell", "{}", "needs approval", "git status", &CancellationToken::new())
            .await;
        assert!(outcome.allows_execution());
    }

    #[tokio::test]
    async fn cancellation_short_circuits_to_cancelled() {
        let client = ApprovalClient::new(Arc::new(NullSink));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = client
            .request_authorization("shell", "{}", "needs approval", "git status", &cancel)
            .await;
        assert_eq!(outcome, ApprovalOutcome::Cancelled);
        assert!(!outcome.allows_execution());
    }

    #[tokio::test]
    async fn null_sink_never_answers_so_request_resolves_to_cancelled() {
        let client = ApprovalClient::with_timeout(Arc::new(NullSink), Duration::from_millis(20));
        let outcome = client
            .request_authorization("shell", "{}", "needs approval", "git status", &CancellationToken::new())
            .await;
        assert_eq!(outcome, ApprovalOutcome::Cancelled);
    }
}
