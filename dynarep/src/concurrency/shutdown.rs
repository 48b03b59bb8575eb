use thiserror::Error;
use tokio::sync::watch;

/// Returned when a shutdown is requested but every receiver is gone.
#[derive(Debug, Error)]
#[error("no task is listening for the shutdown signal")]
pub struct ShutdownError;

/// Sender side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Requests shutdown of every subscribed task.
    pub fn shutdown(&self) -> Result<(), ShutdownError> {
        self.0.send(true).map_err(|_| ShutdownError)
    }

    /// Creates a new receiver observing this sender.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Returns `true` once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Completes when shutdown is requested.
    ///
    /// If the sender is dropped without requesting shutdown, the future never completes.
    pub async fn wait_for_shutdown(&mut self) {
        if self.0.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a shutdown channel in the "running" state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_wakes_every_receiver() {
        let (tx, mut rx) = create_shutdown_channel();
        let mut other = tx.subscribe();

        assert!(!rx.is_shutdown());
        tx.shutdown().unwrap();

        rx.wait_for_shutdown().await;
        other.wait_for_shutdown().await;
        assert!(rx.is_shutdown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_does_not_trigger_shutdown() {
        let (tx, mut rx) = create_shutdown_channel();
        drop(tx);

        let waited = tokio::time::timeout(Duration::from_secs(1), rx.wait_for_shutdown()).await;
        assert!(waited.is_err());
        assert!(!rx.is_shutdown());
    }
}
