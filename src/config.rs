//! Configuration for the proxy pool.

use std::time::Duration;

/// Strategy for selecting the next proxy to lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    /// Pick any available proxy at random; the same proxy may come up again right away.
    #[default]
    Random,
    /// Pick at random, but hand out every available proxy once before repeating.
    RandomUnique,
    /// Strict round-robin over the available queue.
    Cycle,
    /// Pick at random without leasing: no in-use tracking, no failure accounting.
    Choice,
    /// Never hand out a proxy.
    Dummy,
}

impl RotationStrategy {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().replace('-', "_").as_str() {
            "random_unique" | "randomunique" => Self::RandomUnique,
            "cycle" | "round_robin" | "roundrobin" => Self::Cycle,
            "choice" => Self::Choice,
            "dummy" | "none" => Self::Dummy,
            _ => Self::Random,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::RandomUnique => "random_unique",
            Self::Cycle => "cycle",
            Self::Choice => "choice",
            Self::Dummy => "dummy",
        }
    }

    /// Whether leases under this strategy go through the in-use bookkeeping.
    pub fn is_tracked(&self) -> bool {
        !matches!(self, Self::Choice | Self::Dummy)
    }
}

impl std::fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the proxy pool.
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Cumulative failures after which a proxy is retired.
    pub max_retries: u32,
    /// Initial rotation strategy.
    pub rotation_strategy: RotationStrategy,
    /// Upper bound on how long a waiting lease request sleeps between attempts.
    pub poll_interval: Duration,
    /// Default wait budget for managers created over the pool.
    pub max_wait_time: Duration,
}

impl ProxyPoolConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProxyPoolConfigBuilder {
        ProxyPoolConfigBuilder::new()
    }
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        ProxyPoolConfigBuilder::new().build()
    }
}

/// Builder for `ProxyPoolConfig`.
pub struct ProxyPoolConfigBuilder {
    max_retries: Option<u32>,
    rotation_strategy: Option<RotationStrategy>,
    poll_interval: Option<Duration>,
    max_wait_time: Option<Duration>,
}

impl ProxyPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_retries: None,
            rotation_strategy: None,
            poll_interval: None,
            max_wait_time: None,
        }
    }

    /// Set the number of cumulative failures after which a proxy is retired.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set the initial rotation strategy.
    pub fn rotation_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.rotation_strategy = Some(strategy);
        self
    }

    /// Set the interval between lease attempts while waiting.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set the default wait budget for managers.
    pub fn max_wait_time(mut self, wait: Duration) -> Self {
        self.max_wait_time = Some(wait);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            max_retries: self.max_retries.unwrap_or(2),
            rotation_strategy: self.rotation_strategy.unwrap_or_default(),
            poll_interval: self.poll_interval.unwrap_or(Duration::from_secs(3)),
            max_wait_time: self.max_wait_time.unwrap_or(Duration::from_secs(30)),
        }
    }
}

impl Default for ProxyPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
