//! Observable mutation status.

use finanboard_core::MutationStatus;
use std::future::Future;
use tokio::sync::watch;

/// Publishes `Idle | Pending | Success | Error` for one mutation hook.
///
/// The latest status wins: if two calls overlap, the one that settles last
/// decides the final value.
#[derive(Debug)]
pub struct MutationTracker {
    tx: watch::Sender<MutationStatus>,
}

impl Default for MutationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(MutationStatus::Idle);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<MutationStatus> {
        self.tx.subscribe()
    }

    pub fn status(&self) -> MutationStatus {
        *self.tx.borrow()
    }

    pub fn reset(&self) {
        self.tx.send_replace(MutationStatus::Idle);
    }

    /// Run `fut`, publishing `Pending` before and the outcome after.
    pub async fn track<F, T, E>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.tx.send_replace(MutationStatus::Pending);
        let result = fut.await;
        let settled = match &result {
            Ok(_) => MutationStatus::Success,
            Err(_) => MutationStatus::Error,
        };
        self.tx.send_replace(settled);
        result
    }
}
