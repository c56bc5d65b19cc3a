use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{Stage, SyncError};

/// Cancellation signal and optional deadline shared by every step of one operation.
///
/// Each enumeration or pipeline run gets its own scope; steps are raced against it so a
/// stalled transfer cannot block forever.
#[derive(Debug, Clone)]
pub struct OperationScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationScope {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::with_token(CancellationToken::new(), timeout)
    }

    /// Scope that also ends when `token` (e.g. a shutdown signal) is cancelled
    pub fn with_token(token: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    #[cfg(test)]
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fail fast if the scope already ended before starting `stage`
    pub fn check(&self, stage: Stage) -> Result<(), SyncError> {
        if self.token.is_cancelled() {
            return Err(SyncError::Cancelled { stage });
        }
        if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
            return Err(SyncError::DeadlineExceeded { stage });
        }
        Ok(())
    }

    /// Run `fut` unless the scope is cancelled or its deadline passes first
    pub async fn run<T, F>(&self, stage: Stage, fut: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, SyncError>>,
    {
        self.check(stage)?;

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SyncError::Cancelled { stage }),
            _ = sleep_until(self.deadline) => Err(SyncError::DeadlineExceeded { stage }),
            result = fut => result,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
