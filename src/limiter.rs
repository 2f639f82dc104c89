use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

use crate::config::NotifierConfig;

/// Wake-up horizon for windows too long to represent as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Sliding-window rate limiter.
///
/// At most `capacity` grants are handed out within any trailing `window`.
/// Grants are never released explicitly; each one simply ages out once
/// `window` has elapsed.
///
/// Waiters are served strictly in arrival order: they queue on a fair
/// async mutex and only the head of the queue sleeps on the window.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: usize,
    window: Duration,
    /// Held by the waiter currently entitled to the next grant.
    turn: tokio::sync::Mutex<()>,
    /// Instants of grants still inside the window, oldest first.
    grants: Mutex<VecDeque<Instant>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterStats {
    pub capacity: usize,
    pub window: Duration,
    pub in_window: usize,
    pub available: usize,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        let capacity = capacity.max(1) as usize;
        Self {
            capacity,
            window,
            turn: tokio::sync::Mutex::new(()),
            grants: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a grant fits in the window, then record it.
    pub async fn acquire(&self) {
        let _turn = self.turn.lock().await;

        loop {
            let ready_at = {
                let mut grants = self.lock_grants();
                let now = Instant::now();
                expire(&mut grants, now, self.window);

                if grants.len() < self.capacity {
                    grants.push_back(now);
                    return;
                }

                match grants.front() {
                    Some(oldest) => oldest
                        .checked_add(self.window)
                        .unwrap_or_else(|| now + FAR_FUTURE),
                    None => now,
                }
            };

            sleep_until(ready_at).await;
        }
    }

    /// Grant immediately if possible, without joining the wait queue.
    ///
    /// Fails while another caller is waiting so queued callers are not overtaken.
    pub fn try_acquire(&self) -> bool {
        let Ok(_turn) = self.turn.try_lock() else {
            return false;
        };

        let mut grants = self.lock_grants();
        let now = Instant::now();
        expire(&mut grants, now, self.window);

        if grants.len() < self.capacity {
            grants.push_back(now);
            true
        } else {
            false
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        let mut grants = self.lock_grants();
        expire(&mut grants, Instant::now(), self.window);
        RateLimiterStats {
            capacity: self.capacity,
            window: self.window,
            in_window: grants.len(),
            available: self.capacity.saturating_sub(grants.len()),
        }
    }

    fn lock_grants(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.grants.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn expire(grants: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = grants.front() {
        if now.duration_since(*oldest) >= window {
            grants.pop_front();
        } else {
            break;
        }
    }
}

/// Several limiters acquired one after another.
///
/// An operation guarded by the chain only proceeds once every limiter has
/// granted, so a short burst cap and a longer sustained cap both apply.
/// The chain is shared by reference between every direct-webhook delivery,
/// so its quota bounds the aggregate traffic rather than any one destination.
#[derive(Debug, Clone)]
pub struct LimiterChain {
    limiters: Vec<Arc<RateLimiter>>,
}

impl LimiterChain {
    pub fn new(limiters: Vec<Arc<RateLimiter>>) -> Self {
        Self { limiters }
    }

    /// Discord's webhook quota: 50 requests per second, 30 per minute.
    pub fn discord_default() -> Self {
        Self::from_config(&NotifierConfig::default())
    }

    pub fn from_config(config: &NotifierConfig) -> Self {
        Self::new(vec![
            Arc::new(RateLimiter::new(
                config.burst_capacity,
                Duration::from_secs(config.burst_window_secs),
            )),
            Arc::new(RateLimiter::new(
                config.sustained_capacity,
                Duration::from_secs(config.sustained_window_secs),
            )),
        ])
    }

    pub async fn acquire(&self) {
        for limiter in &self.limiters {
            limiter.acquire().await;
        }
    }

    pub fn limiters(&self) -> &[Arc<RateLimiter>] {
        &self.limiters
    }

    pub fn stats(&self) -> Vec<RateLimiterStats> {
        self.limiters.iter().map(|l| l.stats()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn third_simultaneous_acquire_waits_for_window() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut elapsed = Vec::new();
        for handle in handles {
            elapsed.push(handle.await.unwrap());
        }
        elapsed.sort();

        assert_eq!(elapsed[0], Duration::ZERO);
        assert_eq!(elapsed[1], Duration::ZERO);
        assert!(elapsed[2] >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn no_window_holds_more_than_capacity() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        let mut granted = Vec::new();
        for _ in 0..7 {
            limiter.acquire().await;
            granted.push(Instant::now());
        }

        for pair in granted.windows(3) {
            assert!(pair[2].duration_since(pair[0]) >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_served_in_arrival_order() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_millis(100)));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let limiter = limiter.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                order.lock().unwrap().push(i);
            }));
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn try_acquire_respects_capacity() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire());
        assert_eq!(limiter.stats().in_window, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_window_waits_instead_of_panicking() {
        let limiter = RateLimiter::new(1, Duration::from_secs(u64::MAX));
        limiter.acquire().await;

        let second = tokio::time::timeout(Duration::from_secs(5), limiter.acquire()).await;
        assert!(second.is_err(), "second grant must still be waiting");
        assert_eq!(limiter.stats().available, 0);

        let config = NotifierConfig {
            sustained_capacity: 1,
            sustained_window_secs: u64::MAX,
            ..NotifierConfig::default()
        };
        let chain = LimiterChain::from_config(&config);
        chain.acquire().await;
        assert!(tokio::time::timeout(Duration::from_secs(5), chain.acquire()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn chain_enforces_both_caps() {
        let chain = LimiterChain::new(vec![
            Arc::new(RateLimiter::new(3, Duration::from_secs(1))),
            Arc::new(RateLimiter::new(4, Duration::from_secs(10))),
        ]);
        let start = Instant::now();
        let mut elapsed = Vec::new();
        for _ in 0..5 {
            chain.acquire().await;
            elapsed.push(start.elapsed());
        }

        assert_eq!(elapsed[2], Duration::ZERO);
        // fourth is held back by the burst cap, fifth by the sustained cap
        assert!(elapsed[3] >= Duration::from_secs(1) && elapsed[3] < Duration::from_secs(2));
        assert!(elapsed[4] >= Duration::from_secs(10));
    }

    #[test]
    fn default_chain_is_burst_then_sustained() {
        let chain = LimiterChain::discord_default();
        let stats = chain.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!((stats[0].capacity, stats[0].window), (50, Duration::from_secs(1)));
        assert_eq!((stats[1].capacity, stats[1].window), (30, Duration::from_secs(60)));
    }
}
