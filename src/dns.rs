//! DNS-aware pool management
//!
//! Database hosts are often addressed by a name whose records change on
//! failover. Connections opened before the change keep talking to the old
//! address, so this policy re-resolves the name periodically and clears the
//! pool whenever the address set differs from the previous resolution.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::net::IpAddr;

use crate::errors::BoxError;
use crate::logging::PoolEvent;
use crate::management::{PoolControl, PoolManagement};

/// Hostname resolution used by [`DnsAwarePoolManagement`]
#[async_trait]
pub trait Resolve: Send + Sync + 'static {
    async fn resolve(&self, hostname: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system via `tokio::net::lookup_host`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolve for SystemResolver {
    async fn resolve(&self, hostname: &str) -> io::Result<Vec<IpAddr>> {
        let addresses = tokio::net::lookup_host((hostname, 0)).await?;
        Ok(addresses.map(|address| address.ip()).collect())
    }
}

/// Pool management policy clearing the pool when a hostname's addresses change
///
/// A new resolver is built for every check so no resolver-side cache can hide
/// a change. The first successful resolution after the job starts always
/// counts as a change: the pool may hold resources created before anybody
/// was watching the name.
///
/// # Examples
///
/// ```
/// use esox_sharedpool::{DnsAwarePoolManagement, PoolConfiguration};
///
/// let config = PoolConfiguration::<String>::new()
///     .with_pool_management(DnsAwarePoolManagement::new("db.internal"), false);
///
/// assert!(config.pool_management.is_some());
/// ```
pub struct DnsAwarePoolManagement<R = SystemResolver> {
    hostname: String,
    make_resolver: Box<dyn Fn() -> R + Send + Sync>,
    last_addresses: Mutex<Vec<IpAddr>>,
}

impl DnsAwarePoolManagement<SystemResolver> {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self::with_resolver(hostname, SystemResolver::default)
    }
}

impl<R: Resolve> DnsAwarePoolManagement<R> {
    /// Use `make_resolver` to build the resolver for each check
    pub fn with_resolver<F>(hostname: impl Into<String>, make_resolver: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
    {
        Self {
            hostname: hostname.into(),
            make_resolver: Box::new(make_resolver),
            last_addresses: Mutex::new(Vec::new()),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Addresses seen by the latest check that detected a change
    pub fn last_addresses(&self) -> Vec<IpAddr> {
        self.last_addresses.lock().clone()
    }
}

impl<R> fmt::Debug for DnsAwarePoolManagement<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsAwarePoolManagement")
            .field("hostname", &self.hostname)
            .field("last_addresses", &*self.last_addresses.lock())
            .finish()
    }
}

#[async_trait]
impl<R: Resolve> PoolManagement for DnsAwarePoolManagement<R> {
    fn label(&self) -> &str {
        &self.hostname
    }

    fn on_start(&self) {
        self.last_addresses.lock().clear();
    }

    async fn on_tick(&self, pool: &PoolControl<'_>) -> Result<(), BoxError> {
        let resolver = (self.make_resolver)();
        let mut addresses = match resolver.resolve(&self.hostname).await {
            Ok(addresses) => addresses,
            Err(err) => {
                pool.log(&PoolEvent::DnsCheckError {
                    hostname: &self.hostname,
                    error: &err,
                })?;
                return Ok(());
            }
        };
        addresses.sort_unstable();
        addresses.dedup();

        let previous = {
            let last = self.last_addresses.lock();
            (*last != addresses).then(|| last.len())
        };
        if let Some(previous) = previous {
            pool.log(&PoolEvent::DnsChangeDetected {
                hostname: &self.hostname,
                previous,
                current: addresses.len(),
            })?;
            pool.clear_pool();
            *self.last_addresses.lock() = addresses;
        }
        Ok(())
    }
}
