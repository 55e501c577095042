use std::sync::Arc;

use thiserror::Error;

use crate::namespace::Namespace;

/// Result of a cache lookup.
pub type CacheResult<T> = Result<T, CacheError>;

/// An error returned by [`NamespaceCache::get`](crate::NamespaceCache::get).
///
/// Only [`InvalidArgument`](Self::InvalidArgument) and [`NoRuntime`](Self::NoRuntime) are returned
/// synchronously, the other variants
/// are delivered through the returned future and are shared by every caller that awaited the
/// same computation.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The arguments of the call were rejected before any work was scheduled.
    #[error("{0}")]
    InvalidArgument(&'static str),
    /// The computation returned an error.
    ///
    /// Every waiter of the computation receives a clone of the same `Arc`.
    #[error("{0}")]
    ComputationFailure(Arc<anyhow::Error>),
    /// A computation had to be spawned, but the call was made outside of a tokio runtime.
    #[error("no tokio runtime to spawn the computation on")]
    NoRuntime,
    /// The computation was dropped before it settled, either because it panicked or because the
    /// runtime shut down.
    #[error("computation for namespace `{0}` was interrupted")]
    Interrupted(Namespace),
}

impl CacheError {
    /// Returns the underlying computation error, if this is a [`ComputationFailure`](Self::ComputationFailure).
    pub fn computation_error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            Self::ComputationFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for CacheError {
    fn from(err: anyhow::Error) -> Self {
        Self::ComputationFailure(Arc::new(err))
    }
}
