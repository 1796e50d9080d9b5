// Rate-limit gate shared between the client and its callers.
//
// The client closes the gate when the tenant responds 429; callers
// (the push orchestrator) await `ready()` before issuing each call so
// back-off is observed without the engine owning any retry policy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

/// Pause/resume signal owned by the API client.
///
/// Cheap to clone; all clones observe the same state. `ready()` resolves
/// immediately while the gate is open and suspends while it is closed.
#[derive(Debug, Clone)]
pub struct RateGate {
    open: Arc<watch::Sender<bool>>,
}

impl RateGate {
    pub fn new() -> Self {
        let (open, _) = watch::channel(true);
        Self { open: Arc::new(open) }
    }

    /// Whether calls may currently be issued.
    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    /// Wait until the gate is open.
    pub async fn ready(&self) {
        let mut rx = self.open.subscribe();
        // wait_for returns immediately when the current value matches.
        let _ = rx.wait_for(|open| *open).await;
    }

    /// Close the gate for `backoff`, reopening on a timer.
    ///
    /// Spawned as a detached task so the closing call can return its
    /// error to the caller without awaiting the back-off itself.
    pub fn close_for(&self, backoff: Duration) {
        // send_replace: plain send drops the value when no receiver is
        // subscribed, and subscribers only exist while ready() waits.
        self.open.send_replace(false);
        warn!(backoff_secs = backoff.as_secs(), "rate limited -- pausing API calls");
        let open = Arc::clone(&self.open);
        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            open.send_replace(true);
        });
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gate_starts_open() {
        let gate = RateGate::new();
        assert!(gate.is_open());
        // ready() must not block on an open gate
        tokio::time::timeout(Duration::from_millis(50), gate.ready())
            .await
            .expect("ready() should resolve immediately");
    }

    #[tokio::test(start_paused = true)]
    async fn gate_reopens_after_backoff() {
        let gate = RateGate::new();
        gate.close_for(Duration::from_secs(5));
        assert!(!gate.is_open());

        let waiter = gate.clone();
        let handle = tokio::spawn(async move { waiter.ready().await });

        tokio::time::advance(Duration::from_secs(6)).await;
        handle.await.expect("ready() should resolve after backoff");
        assert!(gate.is_open());
    }
}
