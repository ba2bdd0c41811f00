//! Pausable execution deadline (§4.B): a wall-clock budget that excludes
//! time spent waiting on a human, with an optional adaptive variant that
//! extends on continued activity.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct State {
    remaining: Duration,
    started_at: Option<Instant>,
    paused: bool,
    fired: bool,
}

/// A timer armed for `timeout` on construction, which can be paused
/// (subtracting elapsed time from what's left), resumed (re-arming for
/// whatever remains), or stopped permanently. All operations are race-free
/// under concurrent access; state lives behind a single mutex.
pub struct Deadline {
    state: Mutex<State>,
    cancel: CancellationToken,
    /// Bumped every time the timer is (re)armed so a stale timer task can
    /// tell it has been superseded and exit quietly.
    generation: std::sync::atomic::AtomicU64,
}

impl Deadline {
    /// `on_fire` runs exactly once, the first time the timer expires while
    /// not paused and not already stopped. It is invoked on a spawned task,
    /// never inline with `new`/`resume`.
    pub fn new(timeout: Duration, on_fire: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        let deadline = Arc::new(Self {
            state: Mutex::new(State {
                remaining: timeout,
                started_at: Some(Instant::now()),
                paused: false,
                fired: false,
            }),
            cancel: CancellationToken::new(),
            generation: std::sync::atomic::AtomicU64::new(0),
        });
        deadline.clone().arm(timeout, Arc::new(on_fire));
        deadline
    }

    /// Token cancelled the moment this deadline fires or is stopped; pass
    /// it down to whatever work the deadline bounds.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn arm(self: Arc<Self>, timeout: Duration, on_fire: Arc<dyn Fn() + Send + Sync>) {
        let generation = self
            .generation
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut state = this.state.lock().await;
            if state.fired || state.paused {
                return;
            }
            if this.generation.load(std::sync::atomic::Ordering::SeqCst) != generation {
                return;
            }
            state.fired = true;
            state.remaining = Duration::ZERO;
            drop(state);
            this.cancel.cancel();
            on_fire();
            debug!("deadline fired");
        });
    }

    /// Stops the timer and subtracts elapsed-since-last-start from
    /// `remaining` (clamped at zero). A second `pause` is a no-op. Safe to
    /// call on an absent/nil deadline via `Option<Arc<Deadline>>`.
    pub async fn pause(&self) {
        let mut state = self.state.lock().await;
        if state.paused || state.fired {
            return;
        }
        if let Some(started_at) = state.started_at.take() {
            let elapsed = started_at.elapsed();
            state.remaining = state.remaining.saturating_sub(elapsed);
        }
        state.paused = true;
        // Invalidate the currently-running timer task so it becomes a no-op
        // when it wakes; a future `resume` re-arms under a fresh generation.
        self.generation.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    /// Re-arms the timer for whatever remains. Fires immediately if
    /// `remaining` is already zero.
    pub async fn resume(self: &Arc<Self>, on_fire: impl Fn() + Send + Sync + 'static) {
        let mut state = self.state.lock().await;
        if state.fired || !state.paused {
            return;
        }
        state.paused = false;
        state.started_at = Some(Instant::now());
        let remaining = state.remaining;
        drop(state);
        self.clone().arm(remaining, Arc::new(on_fire));
    }

    /// Permanently disables the deadline without firing.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        state.fired = true;
        self.generation.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn has_fired(&self) -> bool {
        self.state.lock().await.fired
    }

    pub async fn remaining(&self) -> Duration {
        self.state.lock().await.remaining
    }
}

/// Drives activity-based extension of a [`Deadline`]: on `record_activity`,
/// if the deadline hasn't fired, has extensions left (default cap 4), and
/// the last activity is within `grace_period`, add one more
/// `original_timeout` to what remains and rearm.
pub struct AdaptiveDeadline {
    deadline: Arc<Deadline>,
    original_timeout: Duration,
    grace_period: Duration,
    max_extensions: u32,
    inner: Mutex<AdaptiveState>,
    on_fire: Arc<dyn Fn() + Send + Sync>,
}

struct AdaptiveState {
    extensions_taken: u32,
    last_activity: Instant,
}

impl AdaptiveDeadline {
    pub fn new(
        timeout: Duration,
        max_extensions: u32,
        on_fire: impl Fn() + Send + Sync + 'static,
    ) -> Arc<Self> {
        let on_fire: Arc<dyn Fn() + Send + Sync> = Arc::new(on_fire);
        let fire_clone = on_fire.clone();
        Arc::new(Self {
            deadline: Deadline::new(timeout, move || fire_clone()),
            original_timeout: timeout,
            grace_period: timeout / 2,
            max_extensions,
            inner: Mutex::new(AdaptiveState {
                extensions_taken: 0,
                last_activity: Instant::now(),
            }),
            on_fire,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.deadline.cancellation_token()
    }

    pub async fn record_activity(&self) {
        if self.deadline.has_fired().await {
            return;
        }
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let since_last = now.duration_since(inner.last_activity);
        inner.last_activity = now;
        if inner.extensions_taken >= self.max_extensions || since_last > self.grace_period {
            return;
        }
        inner.extensions_taken += 1;
        drop(inner);

        let mut state = self.deadline.state.lock().await;
        if state.fired {
            return;
        }
        state.remaining += self.original_timeout;
        let remaining = state.remaining;
        let was_paused = state.paused;
        drop(state);
        if !was_paused {
            let on_fire = self.on_fire.clone();
            self.deadline.clone().arm(remaining, move || on_fire());
        }
    }
}

/// Polls a captured output file's size every 100ms and records activity on
/// growth, so streaming long-running builds don't starve the adaptive
/// deadline. Stops when `stop` is signalled.
pub async fn poll_file_activity(
    path: std::path::PathBuf,
    deadline: Arc<AdaptiveDeadline>,
    stop: Arc<Notify>,
) {
    let mut last_len = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    loop {
        tokio::select! {
            _ = stop.notified() => return,
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                if let Ok(meta) = tokio::fs::metadata(&path).await {
                    if meta.len() != last_len {
                        last_len = meta.len();
                        deadline.record_activity().await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn fires_after_timeout() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let deadline = Deadline::new(Duration::from_millis(20), move || {
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(deadline.has_fired().await);
    }

    #[tokio::test]
    async fn pause_then_resume_fires_after_remaining_not_elapsed() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let deadline = Deadline::new(Duration::from_millis(100), move || {
            flag.store(true, Ordering::SeqCst);
        });
        deadline.pause().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!fired.load(Ordering::SeqCst), "paused deadline must not fire");

        let flag2 = fired.clone();
        deadline.resume(move || flag2.store(true, Ordering::SeqCst)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!fired.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stop_prevents_fire() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let deadline = Deadline::new(Duration::from_millis(20), move || {
            flag.store(true, Ordering::SeqCst);
        });
        deadline.stop().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn second_pause_is_noop() {
        let deadline = Deadline::new(Duration::from_millis(100), || {});
        deadline.pause().await;
        let remaining_after_first = deadline.remaining().await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        deadline.pause().await;
        let remaining_after_second = deadline.remaining().await;
        assert_eq!(remaining_after_first, remaining_after_second);
    }
}
