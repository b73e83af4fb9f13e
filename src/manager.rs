//! Scoped lease wrapper for a single consumer.

use crate::error::PoolError;
use crate::pool::ProxyPool;
use crate::proxy::Proxy;

use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Holds at most one lease on a shared [`ProxyPool`] and tracks failures for it.
///
/// The held proxy is returned to the pool on the next [`ProxyManager::get`],
/// on [`ProxyManager::release`], or when the manager is dropped, whichever
/// comes first. It is returned exactly once.
pub struct ProxyManager {
    pool: Arc<ProxyPool>,
    max_wait_time: Duration,
    current: Option<Proxy>,
    failures: u32,
}

impl ProxyManager {
    /// Create a manager using the pool's configured wait budget.
    pub fn new(pool: Arc<ProxyPool>) -> Self {
        let max_wait_time = pool.config.max_wait_time;
        Self::with_max_wait_time(pool, max_wait_time)
    }

    pub fn with_max_wait_time(pool: Arc<ProxyPool>, max_wait_time: Duration) -> Self {
        Self {
            pool,
            max_wait_time,
            current: None,
            failures: 0,
        }
    }

    /// Record a failure against the held proxy. Does nothing without a lease.
    pub fn add_failure(&mut self) {
        if self.current.is_some() {
            self.failures = self.failures.saturating_add(1);
        }
    }

    /// Return the held proxy, if any, and lease the next one.
    ///
    /// Returns `Ok(None)` when the pool's strategy yields no proxy.
    pub fn get(&mut self) -> Result<Option<Proxy>, PoolError> {
        self.release();
        let lease = self.pool.get_proxy(self.max_wait_time)?;
        Ok(self.hold(lease.map(|lease| lease.proxy)))
    }

    /// Async counterpart of [`ProxyManager::get`].
    pub async fn get_async(&mut self) -> Result<Option<Proxy>, PoolError> {
        self.release();
        let lease = self.pool.get_proxy_async(self.max_wait_time).await?;
        Ok(self.hold(lease.map(|lease| lease.proxy)))
    }

    fn hold(&mut self, proxy: Option<Proxy>) -> Option<Proxy> {
        self.current = proxy.clone();
        self.failures = 0;
        proxy
    }

    /// Return the held proxy with its accumulated failures. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(proxy) = self.current.take() {
            let failures = std::mem::take(&mut self.failures);
            debug!(
                "Releasing proxy {} with {} failures",
                proxy.endpoint(),
                failures
            );
            self.pool.return_proxy(&proxy, failures);
        }
    }

    /// The currently held proxy.
    pub fn current(&self) -> Option<&Proxy> {
        self.current.as_ref()
    }

    /// Failures recorded against the currently held proxy.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }
}

impl Drop for ProxyManager {
    fn drop(&mut self) {
        self.release();
    }
}
