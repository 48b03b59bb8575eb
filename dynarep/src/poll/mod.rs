//! Waiting for remote operations to settle.
//!
//! [`Poller`] drives a status query until it reports a final value, sleeping cooperatively
//! between queries. Every wait is bounded by an optional attempt limit and aborted by the
//! shutdown signal. [`stack::StackStatusPoller`] specializes it for CloudFormation stacks.

pub mod stack;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dynarep_config::shared::PollingConfig;
use tokio::time::sleep;
use tracing::info;

use crate::bail;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{DynarepResult, ErrorKind};

/// Result of one status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState<T> {
    /// The operation is still running.
    Pending { status: String },
    /// The operation reached a final state.
    Done { status: String, value: T },
}

impl<T> PollState<T> {
    pub fn status(&self) -> &str {
        match self {
            PollState::Pending { status } | PollState::Done { status, .. } => status,
        }
    }
}

/// Receives one notification per status query.
///
/// Purely informational, the outcome of a wait never depends on it.
pub trait ProgressObserver: Send + Sync {
    fn on_poll(&self, target: &str, attempt: u32, status: &str);
}

/// Observer that logs every poll.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressObserver;

impl ProgressObserver for LogProgressObserver {
    fn on_poll(&self, target: &str, attempt: u32, status: &str) {
        info!(target_resource = target, attempt, status, "waiting for remote operation");
    }
}

/// Timing of a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Queries allowed before failing with [`ErrorKind::Timeout`]. `None` means unbounded.
    pub max_attempts: Option<u32>,
}

impl PollConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(PollingConfig::DEFAULT_INTERVAL_MS);
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            max_attempts: None,
        }
    }
}

impl From<&PollingConfig> for PollConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts,
        }
    }
}

/// Repeats a status query until it reports [`PollState::Done`].
#[derive(Clone)]
pub struct Poller {
    config: PollConfig,
    observer: Arc<dyn ProgressObserver>,
    shutdown_rx: Option<ShutdownRx>,
}

impl Poller {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            observer: Arc::new(LogProgressObserver),
            shutdown_rx: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Aborts waits with [`ErrorKind::Cancelled`] once shutdown is requested.
    pub fn with_shutdown(mut self, shutdown_rx: ShutdownRx) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Runs `query` until it returns [`PollState::Done`] and yields its value.
    ///
    /// Sleeps `interval` between queries. Query errors are returned immediately and are never
    /// retried here.
    pub async fn poll_until<T, F, Fut>(&self, target: &str, mut query: F) -> DynarepResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DynarepResult<PollState<T>>>,
    {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut attempt: u32 = 0;

        loop {
            if let Some(rx) = &shutdown_rx
                && rx.is_shutdown()
            {
                bail!(
                    ErrorKind::Cancelled,
                    "Wait cancelled by shutdown",
                    format!("target: {target}, attempts: {attempt}")
                );
            }

            attempt += 1;
            let state = query().await?;
            self.observer.on_poll(target, attempt, state.status());

            let status = match state {
                PollState::Done { value, .. } => return Ok(value),
                PollState::Pending { status } => status,
            };

            if let Some(max_attempts) = self.config.max_attempts
                && attempt >= max_attempts
            {
                bail!(
                    ErrorKind::Timeout,
                    "Remote operation did not settle in time",
                    format!("target: {target}, attempts: {attempt}, last status: {status}")
                );
            }

            match shutdown_rx.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        _ = sleep(self.config.interval) => {}
                        _ = rx.wait_for_shutdown() => {
                            bail!(
                                ErrorKind::Cancelled,
                                "Wait cancelled by shutdown",
                                format!("target: {target}, attempts: {attempt}, last status: {status}")
                            );
                        }
                    }
                }
                None => sleep(self.config.interval).await,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_observer {
    use std::sync::Mutex;

    use super::ProgressObserver;

    /// Observer recording `(attempt, status)` pairs.
    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        pub polls: Mutex<Vec<(u32, String)>>,
    }

    impl ProgressObserver for RecordingObserver {
        fn on_poll(&self, _target: &str, attempt: u32, status: &str) {
            self.polls.lock().unwrap().push((attempt, status.to_string()));
        }
    }
}
