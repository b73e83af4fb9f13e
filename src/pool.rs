//! Core proxy pool implementation.
//!
//! Every proxy added to the pool lives in exactly one of three collections:
//! `available`, `in_use` or `dead`. All moves between them happen under a
//! single mutex, and every count is derived from the collections themselves.

use crate::config::{ProxyPoolConfig, RotationStrategy};
use crate::error::PoolError;
use crate::proxy::Proxy;

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex, RwLock};
use rand::Rng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// A proxy handed out by the pool, with the failures it has accumulated so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub proxy: Proxy,
    pub retries: u32,
}

/// Snapshot of the pool counters, taken under one lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub available: usize,
    pub in_use: usize,
    pub dead: usize,
    pub live: usize,
    pub total: usize,
}

#[derive(Debug)]
struct Entry {
    /// Slot id; duplicate endpoints get distinct ids.
    id: u64,
    proxy: Proxy,
    retries: u32,
}

#[derive(Debug, Default)]
struct PoolState {
    available: VecDeque<Entry>,
    in_use: HashMap<Proxy, VecDeque<Entry>>,
    dead: Vec<Entry>,
    /// Slots already handed out in the current `RandomUnique` cycle.
    served: HashSet<u64>,
    next_id: u64,
}

impl PoolState {
    fn in_use_count(&self) -> usize {
        self.in_use.values().map(VecDeque::len).sum()
    }

    fn live_count(&self) -> usize {
        self.available.len() + self.in_use_count()
    }

    fn stats(&self) -> PoolStats {
        let available = self.available.len();
        let in_use = self.in_use_count();
        let dead = self.dead.len();
        PoolStats {
            available,
            in_use,
            dead,
            live: available + in_use,
            total: available + in_use + dead,
        }
    }

    fn insert(&mut self, proxy: Proxy) {
        let id = self.next_id;
        self.next_id += 1;
        self.available.push_back(Entry {
            id,
            proxy,
            retries: 0,
        });
    }

    /// Index into `available` of the entry the strategy picks next.
    fn select(&mut self, strategy: RotationStrategy) -> Option<usize> {
        let len = self.available.len();
        if len == 0 {
            return None;
        }

        let mut rng = rand::rng();
        match strategy {
            RotationStrategy::Cycle => Some(0),
            RotationStrategy::Random => Some(rng.random_range(0..len)),
            RotationStrategy::RandomUnique => {
                let mut fresh: Vec<usize> = self
                    .available
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| !self.served.contains(&entry.id))
                    .map(|(index, _)| index)
                    .collect();
                if fresh.is_empty() {
                    debug!("Every available proxy served once, starting a new cycle");
                    self.served.clear();
                    fresh = (0..len).collect();
                }
                let index = fresh[rng.random_range(0..fresh.len())];
                self.served.insert(self.available[index].id);
                Some(index)
            }
            RotationStrategy::Choice | RotationStrategy::Dummy => None,
        }
    }

    /// Try to move one entry from `available` to `in_use`.
    fn try_lease(&mut self, strategy: RotationStrategy) -> Result<Option<Lease>, PoolError> {
        if self.live_count() == 0 {
            return Err(PoolError::Depleted);
        }

        let Some(entry) = self
            .select(strategy)
            .and_then(|index| self.available.remove(index))
        else {
            return Ok(None);
        };

        let lease = Lease {
            proxy: entry.proxy.clone(),
            retries: entry.retries,
        };
        self.in_use
            .entry(entry.proxy.clone())
            .or_default()
            .push_back(entry);
        Ok(Some(lease))
    }

    /// Move a leased entry back. Returns `None` if the proxy is not leased,
    /// otherwise whether the entry was retired.
    fn give_back(&mut self, proxy: &Proxy, additional_retries: u32, max_retries: u32) -> Option<bool> {
        let (entry, drained) = {
            let slots = self.in_use.get_mut(proxy)?;
            (slots.pop_front()?, slots.is_empty())
        };
        if drained {
            self.in_use.remove(proxy);
        }

        let mut entry = entry;
        entry.retries = entry.retries.saturating_add(additional_retries);
        if entry.retries >= max_retries {
            self.served.remove(&entry.id);
            self.dead.push(entry);
            Some(true)
        } else {
            self.available.push_back(entry);
            Some(false)
        }
    }
}

/// A thread-safe pool handing out exclusive proxy leases.
pub struct ProxyPool {
    state: Mutex<PoolState>,
    /// Wakes blocking waiters when the pool changes.
    changed: Condvar,
    /// Wakes async waiters when the pool changes.
    notify: Notify,
    strategy: RwLock<RotationStrategy>,
    /// Configuration for the pool.
    pub config: ProxyPoolConfig,
}

impl ProxyPool {
    /// Create a pool over `proxies` with the default configuration.
    pub fn new(proxies: impl IntoIterator<Item = Proxy>) -> Self {
        Self::with_config(proxies, ProxyPoolConfig::default())
    }

    /// Create a pool over `proxies` with the given configuration.
    pub fn with_config(proxies: impl IntoIterator<Item = Proxy>, config: ProxyPoolConfig) -> Self {
        let mut state = PoolState::default();
        for proxy in proxies {
            state.insert(proxy);
        }

        info!(
            "Proxy pool initialized with {} proxies (strategy: {}, max retries: {})",
            state.available.len(),
            config.rotation_strategy,
            config.max_retries
        );

        Self {
            state: Mutex::new(state),
            changed: Condvar::new(),
            notify: Notify::new(),
            strategy: RwLock::new(config.rotation_strategy),
            config,
        }
    }

    /// Create a pool from proxy URI strings, skipping the ones that fail to parse.
    pub fn from_strings<I, S>(lines: I, config: ProxyPoolConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let proxies = lines.into_iter().filter_map(|line| {
            let line = line.as_ref();
            match line.parse::<Proxy>() {
                Ok(proxy) => Some(proxy),
                Err(e) => {
                    warn!("Skipping proxy {:?}: {}", line, e);
                    None
                }
            }
        });
        Self::with_config(proxies, config)
    }

    /// Add a proxy to the available set with a zero retry count.
    ///
    /// Equal endpoints are not merged: each call adds an independently tracked slot.
    pub fn add_proxy(&self, proxy: Proxy) {
        debug!("Adding proxy {}", proxy.endpoint());
        self.state.lock().insert(proxy);
        self.wake_waiters();
    }

    /// Add several proxies under one lock acquisition.
    pub fn add_proxies(&self, proxies: impl IntoIterator<Item = Proxy>) {
        {
            let mut state = self.state.lock();
            for proxy in proxies {
                state.insert(proxy);
            }
        }
        self.wake_waiters();
    }

    /// Parse and add a proxy URI string. Returns `false` if it does not parse.
    pub fn add_proxy_str(&self, s: &str) -> bool {
        match s.parse::<Proxy>() {
            Ok(proxy) => {
                self.add_proxy(proxy);
                true
            }
            Err(e) => {
                warn!("Skipping proxy {:?}: {}", s, e);
                false
            }
        }
    }

    pub fn rotation_strategy(&self) -> RotationStrategy {
        *self.strategy.read()
    }

    pub fn set_rotation_strategy(&self, strategy: RotationStrategy) {
        let previous = std::mem::replace(&mut *self.strategy.write(), strategy);
        if previous != strategy {
            info!("Rotation strategy changed: {} -> {}", previous, strategy);
        }
    }

    /// Lease a proxy, blocking the current thread for up to `max_wait_time`.
    ///
    /// Returns `Ok(None)` under [`RotationStrategy::Dummy`]. Under
    /// [`RotationStrategy::Choice`] the returned proxy is not leased and does
    /// not need to be returned.
    pub fn get_proxy(&self, max_wait_time: Duration) -> Result<Option<Lease>, PoolError> {
        let strategy = self.rotation_strategy();
        if !strategy.is_tracked() {
            return self.untracked(strategy);
        }

        let start = Instant::now();
        let mut state = self.state.lock();
        loop {
            if let Some(lease) = self.attempt_locked(&mut state, strategy)? {
                return Ok(Some(lease));
            }

            let waited = start.elapsed();
            if waited >= max_wait_time {
                warn!("No proxy became available within {:?}", max_wait_time);
                return Err(PoolError::Timeout { waited });
            }
            let pause = self.config.poll_interval.min(max_wait_time - waited);
            self.changed.wait_for(&mut state, pause);
        }
    }

    /// Async counterpart of [`ProxyPool::get_proxy`] for tokio workers.
    pub async fn get_proxy_async(&self, max_wait_time: Duration) -> Result<Option<Lease>, PoolError> {
        let strategy = self.rotation_strategy();
        if !strategy.is_tracked() {
            return self.untracked(strategy);
        }

        let start = Instant::now();
        loop {
            let notified = self.notify.notified();
            if let Some(lease) = self.attempt(strategy)? {
                return Ok(Some(lease));
            }

            let waited = start.elapsed();
            if waited >= max_wait_time {
                warn!("No proxy became available within {:?}", max_wait_time);
                return Err(PoolError::Timeout { waited });
            }
            let pause = self.config.poll_interval.min(max_wait_time - waited);
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    fn attempt(&self, strategy: RotationStrategy) -> Result<Option<Lease>, PoolError> {
        let mut state = self.state.lock();
        self.attempt_locked(&mut state, strategy)
    }

    fn attempt_locked(
        &self,
        state: &mut PoolState,
        strategy: RotationStrategy,
    ) -> Result<Option<Lease>, PoolError> {
        match state.try_lease(strategy) {
            Ok(Some(lease)) => {
                debug!(
                    "Leased proxy {} (retries: {})",
                    lease.proxy.endpoint(),
                    lease.retries
                );
                Ok(Some(lease))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!("No live proxies left in pool ({} dead)", state.dead.len());
                Err(e)
            }
        }
    }

    fn untracked(&self, strategy: RotationStrategy) -> Result<Option<Lease>, PoolError> {
        if strategy == RotationStrategy::Dummy {
            return Ok(None);
        }

        // Sample live entries only; dead ones are never handed out again.
        let state = self.state.lock();
        let live: Vec<&Entry> = state
            .available
            .iter()
            .chain(state.in_use.values().flatten())
            .collect();
        if live.is_empty() {
            return Err(PoolError::Depleted);
        }
        let entry = live[rand::rng().random_range(0..live.len())];
        Ok(Some(Lease {
            proxy: entry.proxy.clone(),
            retries: entry.retries,
        }))
    }

    /// End a lease, folding `additional_retries` into the proxy's retry count.
    ///
    /// The proxy goes back to `available`, or to `dead` once its retry count
    /// reaches `max_retries`. Leases taken before a switch to `Choice` or
    /// `Dummy` are still returned. Returns `false` if the proxy was not
    /// leased, except under `Choice` and `Dummy` where that is a no-op success.
    pub fn return_proxy(&self, proxy: &Proxy, additional_retries: u32) -> bool {
        let outcome = self
            .state
            .lock()
            .give_back(proxy, additional_retries, self.config.max_retries);

        match outcome {
            None if !self.rotation_strategy().is_tracked() => true,
            None => {
                warn!("Proxy {} returned but is not leased", proxy.endpoint());
                false
            }
            Some(retired) => {
                if retired {
                    warn!(
                        "Proxy {} retired after reaching {} retries",
                        proxy.endpoint(),
                        self.config.max_retries
                    );
                } else {
                    debug!(
                        "Returned proxy {} (+{} retries)",
                        proxy.endpoint(),
                        additional_retries
                    );
                }
                self.wake_waiters();
                true
            }
        }
    }

    fn wake_waiters(&self) {
        self.changed.notify_all();
        self.notify.notify_waiters();
    }

    /// Get a snapshot of all counters.
    pub fn stats(&self) -> PoolStats {
        self.state.lock().stats()
    }

    pub fn available_count(&self) -> usize {
        self.stats().available
    }

    pub fn in_use_count(&self) -> usize {
        self.stats().in_use
    }

    pub fn live_count(&self) -> usize {
        self.stats().live
    }

    pub fn dead_count(&self) -> usize {
        self.stats().dead
    }

    pub fn total_count(&self) -> usize {
        self.stats().total
    }

    pub fn has_available_proxies(&self) -> bool {
        self.available_count() > 0
    }
}
