use std::fmt;
use std::future::Future;

use crate::error::DynarepResult;
use crate::poll::{PollState, Poller};

/// Status of a CloudFormation stack operation.
///
/// Only the statuses ending a create or update are modeled. Every other value, including the
/// `*_IN_PROGRESS` family, is [`StackStatus::InProgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackStatus {
    CreateComplete,
    UpdateComplete,
    RollbackComplete,
    RollbackFailed,
    UpdateRollbackComplete,
    UpdateRollbackFailed,
    InProgress(String),
}

/// Terminal statuses reporting success.
pub const SUCCESS_STATUSES: &[&str] = &["CREATE_COMPLETE", "UPDATE_COMPLETE"];

/// Terminal statuses reporting a failed operation.
pub const FAILURE_STATUSES: &[&str] = &[
    "ROLLBACK_COMPLETE",
    "ROLLBACK_FAILED",
    "UPDATE_ROLLBACK_COMPLETE",
    "UPDATE_ROLLBACK_FAILED",
];

impl StackStatus {
    pub fn parse(status: &str) -> StackStatus {
        match status {
            "CREATE_COMPLETE" => StackStatus::CreateComplete,
            "UPDATE_COMPLETE" => StackStatus::UpdateComplete,
            "ROLLBACK_COMPLETE" => StackStatus::RollbackComplete,
            "ROLLBACK_FAILED" => StackStatus::RollbackFailed,
            "UPDATE_ROLLBACK_COMPLETE" => StackStatus::UpdateRollbackComplete,
            "UPDATE_ROLLBACK_FAILED" => StackStatus::UpdateRollbackFailed,
            other => StackStatus::InProgress(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StackStatus::CreateComplete => "CREATE_COMPLETE",
            StackStatus::UpdateComplete => "UPDATE_COMPLETE",
            StackStatus::RollbackComplete => "ROLLBACK_COMPLETE",
            StackStatus::RollbackFailed => "ROLLBACK_FAILED",
            StackStatus::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            StackStatus::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            StackStatus::InProgress(status) => status,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StackStatus::InProgress(_))
    }

    /// `Some(true)` for the success family, `Some(false)` for the rollback family and `None`
    /// while the operation is running.
    pub fn outcome(&self) -> Option<bool> {
        match self {
            StackStatus::CreateComplete | StackStatus::UpdateComplete => Some(true),
            StackStatus::RollbackComplete
            | StackStatus::RollbackFailed
            | StackStatus::UpdateRollbackComplete
            | StackStatus::UpdateRollbackFailed => Some(false),
            StackStatus::InProgress(_) => None,
        }
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Waits for a stack create or update to finish.
///
/// States: in progress until the queried status is terminal, then success or failed. A failed
/// stack is an expected outcome and is reported as `false`, not as an error.
#[derive(Clone)]
pub struct StackStatusPoller {
    poller: Poller,
}

impl StackStatusPoller {
    pub fn new(poller: Poller) -> Self {
        Self { poller }
    }

    /// Queries the stack status until it is terminal.
    ///
    /// Returns `true` when the stack reached `CREATE_COMPLETE` or `UPDATE_COMPLETE` and `false`
    /// when it rolled back.
    pub async fn poll<F, Fut>(&self, stack_id: &str, mut status_query: F) -> DynarepResult<bool>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DynarepResult<String>>,
    {
        self.poller
            .poll_until(stack_id, || {
                let status = status_query();
                async move {
                    let status = StackStatus::parse(&status.await?);
                    Ok(match status.outcome() {
                        Some(succeeded) => PollState::Done {
                            status: status.to_string(),
                            value: succeeded,
                        },
                        None => PollState::Pending {
                            status: status.to_string(),
                        },
                    })
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::poll::PollConfig;
    use crate::poll::test_observer::RecordingObserver;
    use crate::test_utils::status::FixedStatusQuery;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_millis(5_000);

    fn stack_poller(max_attempts: Option<u32>) -> StackStatusPoller {
        StackStatusPoller::new(Poller::new(PollConfig {
            interval: INTERVAL,
            max_attempts,
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_complete_after_two_sleeps() {
        let script = FixedStatusQuery::new(&[
            "CREATE_IN_PROGRESS",
            "CREATE_IN_PROGRESS",
            "CREATE_COMPLETE",
        ]);
        let observer = Arc::new(RecordingObserver::default());
        let poller = StackStatusPoller::new(
            Poller::new(PollConfig {
                interval: INTERVAL,
                max_attempts: None,
            })
            .with_observer(observer.clone()),
        );

        let started = Instant::now();
        let succeeded = poller
            .poll("orders-dev", || script.next())
            .await
            .unwrap();

        assert!(succeeded);
        let elapsed = started.elapsed();
        assert!(elapsed >= INTERVAL * 2 && elapsed < INTERVAL * 3);
        assert_eq!(observer.polls.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_rollback_status_reports_failure() {
        for terminal in FAILURE_STATUSES {
            let script = FixedStatusQuery::new(&["UPDATE_IN_PROGRESS", *terminal]);

            let succeeded = stack_poller(None)
                .poll("orders-dev", || script.next())
                .await
                .unwrap();

            assert!(!succeeded, "{terminal} must report failure");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_terminal_status_wins() {
        let script = FixedStatusQuery::new(&["UPDATE_COMPLETE", "UPDATE_ROLLBACK_COMPLETE"]);

        let started = Instant::now();
        let succeeded = stack_poller(None)
            .poll("orders-dev", || script.next())
            .await
            .unwrap();

        assert!(succeeded);
        assert!(started.elapsed() < INTERVAL);
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_errors_abort_the_wait() {
        let script = FixedStatusQuery::new(&["CREATE_IN_PROGRESS"]).then_fail(
            crate::dynarep_error!(ErrorKind::PermissionDenied, "AWS request denied"),
        );

        let err = stack_poller(None)
            .poll("orders-dev", || script.next())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_stack_times_out() {
        let script = FixedStatusQuery::new(&["UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"]);

        let err = stack_poller(Some(4))
            .poll("orders-dev", || script.next())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(script.calls(), 4);
    }

    #[test]
    fn test_status_families() {
        for status in SUCCESS_STATUSES {
            assert_eq!(StackStatus::parse(status).outcome(), Some(true));
        }
        for status in FAILURE_STATUSES {
            assert_eq!(StackStatus::parse(status).outcome(), Some(false));
        }

        let running = StackStatus::parse("UPDATE_ROLLBACK_IN_PROGRESS");
        assert!(!running.is_terminal());
        assert_eq!(running.to_string(), "UPDATE_ROLLBACK_IN_PROGRESS");
    }
}
