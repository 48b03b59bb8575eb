use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{DynarepError, DynarepResult, ErrorKind};

/// Status query answering from a fixed script.
///
/// Each call returns the next scripted status. Once the script is exhausted the last status
/// repeats, which keeps a stuck operation stuck.
#[derive(Debug, Clone)]
pub struct FixedStatusQuery {
    inner: Arc<Mutex<Script>>,
}

#[derive(Debug)]
struct Script {
    statuses: VecDeque<Result<String, DynarepError>>,
    last: String,
    calls: u32,
}

impl FixedStatusQuery {
    pub fn new(statuses: &[&str]) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Script {
                statuses: statuses
                    .iter()
                    .map(|status| Ok(status.to_string()))
                    .collect(),
                last: String::new(),
                calls: 0,
            })),
        }
    }

    /// Appends a failing answer after the scripted statuses.
    pub fn then_fail(self, err: DynarepError) -> Self {
        if let Ok(mut script) = self.inner.lock() {
            script.statuses.push_back(Err(err));
        }
        self
    }

    /// Answers the next query.
    pub async fn next(&self) -> DynarepResult<String> {
        let mut script = self
            .inner
            .lock()
            .map_err(|_| dynarep_error!(ErrorKind::InvalidState, "Status script poisoned"))?;
        script.calls += 1;

        match script.statuses.pop_front() {
            Some(Ok(status)) => {
                script.last = status.clone();
                Ok(status)
            }
            Some(Err(err)) => Err(err),
            None => Ok(script.last.clone()),
        }
    }

    /// Number of queries answered so far.
    pub fn calls(&self) -> u32 {
        self.inner.lock().map(|script| script.calls).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_status_repeats() {
        let query = FixedStatusQuery::new(&["CREATE_IN_PROGRESS", "UPDATE_IN_PROGRESS"]);

        assert_eq!(query.next().await.unwrap(), "CREATE_IN_PROGRESS");
        assert_eq!(query.next().await.unwrap(), "UPDATE_IN_PROGRESS");
        assert_eq!(query.next().await.unwrap(), "UPDATE_IN_PROGRESS");
        assert_eq!(query.calls(), 3);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let query = FixedStatusQuery::new(&["CREATE_IN_PROGRESS"])
            .then_fail(dynarep_error!(ErrorKind::ProviderThrottled, "Rate exceeded"));

        query.next().await.unwrap();
        assert_eq!(query.next().await.unwrap_err().kind(), ErrorKind::ProviderThrottled);
    }
}
