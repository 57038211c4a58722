//! Cooperative cancellation for in-flight submissions and monitors

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Cloneable cancellation signal. All clones observe the same state.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender is owned by every clone, so this only happens during teardown
            std::future::pending::<()>().await;
        }
    }

    /// Cancel automatically once `deadline` elapses
    pub fn cancel_after(&self, deadline: Duration) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            if !handle.is_cancelled() {
                debug!("Deadline of {:?} reached, cancelling", deadline);
                handle.cancel();
            }
        })
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}
