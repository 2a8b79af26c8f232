use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single remote call.
///
/// A timeout is kept apart from other failures so callers can tell
/// "the device did not answer in time" from "there is no data yet".
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{operation} timed out after {}s", .after.as_secs_f64())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl RemoteError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::Timeout { .. })
    }
}

/// Races `fut` against a fixed deadline. The losing future is dropped.
pub async fn with_deadline<T, F>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, RemoteError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(RemoteError::Failed),
        Err(_) => Err(RemoteError::Timeout { operation, after }),
    }
}
