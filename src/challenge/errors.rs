//! Errors surfaced by challenge reads.

use crate::catalogue::UpstreamError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;

/// Failure of a challenge read.
///
/// Cloneable so one coalesced failure can be handed to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChallengeError {
    #[error("could not load data from the catalogue")]
    Upstream(#[source] Arc<UpstreamError>),
    #[error("challenge read did not finish within {0:?}")]
    Timeout(Duration),
    #[error("catalogue fetch was aborted: {0}")]
    Aborted(String),
}

impl From<UpstreamError> for ChallengeError {
    fn from(err: UpstreamError) -> Self {
        ChallengeError::Upstream(Arc::new(err))
    }
}

impl From<JoinError> for ChallengeError {
    fn from(err: JoinError) -> Self {
        ChallengeError::Aborted(err.to_string())
    }
}
