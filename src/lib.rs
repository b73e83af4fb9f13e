//! # lease-proxy-pool
//!
//! A thread-safe pool of proxy endpoints handing out exclusive leases.
//!
//! Consumers lease a proxy, report failures against it, and return it. The
//! pool folds failures into a per-proxy retry count and retires proxies that
//! reach the configured maximum. [`ProxyManager`] wraps one consumer's lease
//! and guarantees it is returned exactly once.

pub mod config;
pub mod error;
pub mod manager;
pub mod pool;
pub mod proxy;
pub mod utils;

pub use config::{ProxyPoolConfig, ProxyPoolConfigBuilder, RotationStrategy};
pub use error::{PoolError, ProxyError};
pub use manager::ProxyManager;
pub use pool::{Lease, PoolStats, ProxyPool};
pub use proxy::{Proxy, ProxyScheme};
pub use utils::parse_proxy_list;
