//! Deadlines for downstream calls.
//!
//! # Responsibilities
//! - Bound every repository and mail call
//! - Keep timeouts distinguishable from the callee's own errors

use std::future::Future;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DownstreamError<E> {
    #[error("downstream call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Failed(E),
}

impl<E> DownstreamError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DownstreamError::Timeout(_))
    }
}

/// Run `call` with a deadline.
pub async fn with_deadline<T, E, F>(deadline: Duration, call: F) -> Result<T, DownstreamError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result.map_err(DownstreamError::Failed),
        Err(_) => Err(DownstreamError::Timeout(deadline)),
    }
}
