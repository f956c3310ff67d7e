//! Error types for the shared pool

use std::sync::Arc;
use thiserror::Error;

use crate::job::JobKind;
use crate::logging::LogError;

/// Boxed error produced by user-supplied factories, health checks and resolvers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Resource factory failed: {0}")]
    Factory(Arc<dyn std::error::Error + Send + Sync + 'static>),

    #[error("The {0} is disabled in the pool configuration")]
    JobDisabled(JobKind),

    #[error("No {0} configured for this pool")]
    NotConfigured(&'static str),

    #[error("Logging failed: {0}")]
    Logging(#[from] LogError),

    #[error("Pool management policy failed: {0}")]
    Management(String),

    #[error("Background job did not shut down cleanly: {0}")]
    Join(String),
}

impl PoolError {
    pub(crate) fn factory(err: BoxError) -> Self {
        PoolError::Factory(Arc::from(err))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
