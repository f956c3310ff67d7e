//! Seams to the code that actually creates and checks resources

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::errors::BoxError;

/// Creates new pool members
///
/// Implemented for any `Fn() -> impl Future<Output = Result<Arc<T>, BoxError>>`,
/// so a closure is usually all that is needed:
///
/// ```
/// use esox_sharedpool::{BoxError, ResourceFactory};
/// use std::sync::Arc;
///
/// struct Connection { host: String }
///
/// fn factory() -> impl ResourceFactory<Connection> {
///     || async { Ok::<_, BoxError>(Arc::new(Connection { host: "db".into() })) }
/// }
/// ```
///
/// Timeouts (connect, read, ...) are the factory's business; the pool awaits
/// the returned future for as long as it takes.
#[async_trait]
pub trait ResourceFactory<T>: Send + Sync + 'static {
    async fn create(&self) -> Result<Arc<T>, BoxError>;
}

#[async_trait]
impl<T, F, Fut> ResourceFactory<T> for F
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<T>, BoxError>> + Send + 'static,
{
    async fn create(&self) -> Result<Arc<T>, BoxError> {
        (self)().await
    }
}

/// Liveness check for pool members
///
/// `Ok(false)` and `Err(_)` both mean "unhealthy". Plain predicates
/// `Fn(&T) -> bool` implement this trait directly.
#[async_trait]
pub trait HealthCheck<T>: Send + Sync + 'static {
    async fn check(&self, resource: &T) -> Result<bool, BoxError>;
}

#[async_trait]
impl<T, F> HealthCheck<T> for F
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    async fn check(&self, resource: &T) -> Result<bool, BoxError> {
        Ok((self)(resource))
    }
}
