use lease_proxy_pool::{PoolError, Proxy, ProxyManager, ProxyPool, ProxyPoolConfig, RotationStrategy};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn shared_pool(count: u8, max_retries: u32, strategy: RotationStrategy) -> Arc<ProxyPool> {
    let config = ProxyPoolConfig::builder()
        .max_retries(max_retries)
        .rotation_strategy(strategy)
        .poll_interval(Duration::from_millis(5))
        .max_wait_time(Duration::from_secs(5))
        .build();
    let proxies = (1..=count).map(|i| Proxy::new(format!("10.0.0.{}", i), 8080).unwrap());
    Arc::new(ProxyPool::with_config(proxies, config))
}

#[test]
fn leases_are_exclusive_across_threads() {
    for strategy in [
        RotationStrategy::Random,
        RotationStrategy::RandomUnique,
        RotationStrategy::Cycle,
    ] {
        let pool = shared_pool(4, 1_000, strategy);
        let held = Arc::new(Mutex::new(HashSet::<Proxy>::new()));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let held = Arc::clone(&held);
                thread::spawn(move || {
                    let mut manager = ProxyManager::new(pool);
                    for _ in 0..50 {
                        if let Some(previous) = manager.current() {
                            held.lock().remove(previous);
                        }
                        let proxy = manager.get().unwrap().unwrap();
                        assert!(held.lock().insert(proxy), "proxy leased twice");
                        thread::sleep(Duration::from_micros(200));
                    }
                    if let Some(last) = manager.current() {
                        held.lock().remove(last);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.available, 4);
        assert_eq!(stats.total, 4);
    }
}

#[test]
fn counts_stay_consistent_while_proxies_retire() {
    let pool = shared_pool(6, 3, RotationStrategy::Random);

    let workers: Vec<_> = (0..6)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut manager = ProxyManager::new(Arc::clone(&pool));
                for job in 0..40 {
                    match manager.get() {
                        Ok(Some(_)) => {
                            if (worker + job) % 4 == 0 {
                                manager.add_failure();
                            }
                        }
                        Ok(None) => unreachable!("tracked strategy yields a proxy"),
                        Err(PoolError::Depleted) => break,
                        Err(e) => panic!("unexpected pool error: {}", e),
                    }
                    let stats = pool.stats();
                    assert_eq!(stats.available + stats.in_use + stats.dead, stats.total);
                    assert_eq!(stats.total, 6);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.available + stats.dead, 6);
}

#[test]
fn retired_proxies_are_never_leased_again() {
    let pool = shared_pool(3, 1, RotationStrategy::Cycle);
    let doomed = Proxy::new("10.0.0.2", 8080).unwrap();

    {
        let mut manager = ProxyManager::new(Arc::clone(&pool));
        for _ in 0..3 {
            let proxy = manager.get().unwrap().unwrap();
            if proxy == doomed {
                manager.add_failure();
            }
        }
    }
    assert_eq!(pool.dead_count(), 1);

    let mut manager = ProxyManager::new(Arc::clone(&pool));
    for _ in 0..20 {
        let proxy = manager.get().unwrap().unwrap();
        assert_ne!(proxy, doomed);
    }
}

#[test]
fn blocked_waiter_gets_returned_proxy() {
    let pool = shared_pool(1, 2, RotationStrategy::Random);
    let mut holder = ProxyManager::new(Arc::clone(&pool));
    let held = holder.get().unwrap().unwrap();

    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let mut manager = ProxyManager::new(pool);
            manager.get()
        })
    };

    thread::sleep(Duration::from_millis(30));
    drop(holder);

    let leased = waiter.join().unwrap().unwrap().unwrap();
    assert_eq!(leased, held);
    // The waiter's manager was dropped with the thread.
    assert_eq!(pool.available_count(), 1);
}

#[test]
fn async_acquire_via_block_on() {
    let pool = shared_pool(2, 2, RotationStrategy::Cycle);
    let lease = tokio_test::block_on(pool.get_proxy_async(Duration::from_secs(1)))
        .unwrap()
        .unwrap();
    assert_eq!(lease.proxy.address(), "10.0.0.1");
    assert!(pool.return_proxy(&lease.proxy, 0));
}
