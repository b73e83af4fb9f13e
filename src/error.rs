//! Error types for the lease-proxy-pool crate.

use std::time::Duration;
use thiserror::Error;

/// Error returned when a proxy endpoint cannot be built or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// The address is neither a dotted-quad IPv4 address nor a hostname.
    #[error("Invalid proxy address: {0:?}")]
    InvalidAddress(String),
    /// The port is not a base-10 integer in `0..=65535`.
    #[error("Invalid proxy port: {0:?}")]
    InvalidPort(String),
    /// The scheme is not `http` or `https`.
    #[error("Unsupported proxy scheme: {0:?}")]
    UnsupportedScheme(String),
    /// The string does not match `scheme://[user:pass@]host:port`.
    #[error("Malformed proxy string: {0:?}")]
    Malformed(String),
}

/// Error returned by the pool when a lease cannot be granted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool holds no live (available or in-use) proxies.
    #[error("Proxy pool depleted: no live proxies left")]
    Depleted,
    /// No proxy became available within the wait budget.
    #[error("Timed out after {waited:?} waiting for an available proxy")]
    Timeout { waited: Duration },
}
