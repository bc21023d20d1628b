use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::ThrottleConfig;

/// Checks between two sweeps of idle keys.
const SWEEP_EVERY: u64 = 256;

/// Sliding window in-memory rate limiter (process local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    calls: Arc<AtomicU64>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), calls: Arc::new(AtomicU64::new(0)), enabled }
    }

    /// Number of keys currently holding a window.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    /// Drop keys whose most recent hit is older than `window`.
    pub fn sweep(&self, window: Duration) {
        let now = Instant::now();
        self.store.retain(|_, hits| hits.back().is_some_and(|t| now.duration_since(*t) < window));
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled {
            return true;
        }
        let now = Instant::now();
        let allowed = {
            let mut entry = self.store.entry(key.to_string()).or_default();
            while let Some(front) = entry.front() {
                if now.duration_since(*front) >= window {
                    entry.pop_front();
                } else {
                    break;
                }
            }
            if entry.len() < limit {
                entry.push_back(now);
                true
            } else {
                false
            }
        };
        // the entry guard must be released before retain locks every shard
        if self.calls.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep(window);
        }
        allowed
    }
}

/// Throttle for the credential endpoints, keyed by client address.
#[derive(Clone)]
pub struct AuthThrottle {
    limiter: InMemoryRateLimiter,
    limit: usize,
    window: Duration,
}

impl AuthThrottle {
    pub fn new(cfg: &ThrottleConfig) -> Self {
        Self { limiter: InMemoryRateLimiter::new(cfg.enabled), limit: cfg.limit, window: cfg.window }
    }

    pub fn disabled() -> Self {
        Self { limiter: InMemoryRateLimiter::new(false), limit: 0, window: Duration::ZERO }
    }

    pub fn allow_login(&self, ip: &str) -> bool {
        self.limiter.check(&format!("login:{ip}"), self.limit, self.window)
    }

    pub fn allow_register(&self, ip: &str) -> bool {
        self.limiter.check(&format!("register:{ip}"), self.limit, self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_window_basic() {
        let rl = InMemoryRateLimiter::new(true);
        let window = Duration::from_millis(50);
        for _ in 0..3 {
            assert!(rl.check("k", 3, window));
        }
        assert!(!rl.check("k", 3, window));
        std::thread::sleep(Duration::from_millis(60));
        assert!(rl.check("k", 3, window));
    }

    #[test]
    fn idle_keys_are_swept() {
        let rl = InMemoryRateLimiter::new(true);
        let window = Duration::from_millis(20);
        assert!(rl.check("old", 1, window));
        assert!(!rl.check("blocked", 0, window));
        std::thread::sleep(Duration::from_millis(30));
        assert!(rl.check("fresh", 1, window));
        rl.sweep(window);
        assert_eq!(rl.tracked_keys(), 1);
        assert!(!rl.check("fresh", 1, window));
    }

    #[test]
    fn periodic_sweep_bounds_distinct_clients() {
        let rl = InMemoryRateLimiter::new(true);
        for i in 0..SWEEP_EVERY {
            assert!(rl.check(&format!("ip{i}"), 1, Duration::ZERO));
        }
        // a zero window expires everything, so the sweep on the last check empties the map
        assert_eq!(rl.tracked_keys(), 0);
    }

    #[test]
    fn login_and_register_are_counted_separately() {
        let t = AuthThrottle::new(&ThrottleConfig { enabled: true, limit: 1, window: Duration::from_secs(60) });
        assert!(t.allow_login("10.0.0.1"));
        assert!(!t.allow_login("10.0.0.1"));
        assert!(t.allow_register("10.0.0.1"));
        assert!(t.allow_login("10.0.0.2"));
    }

    #[test]
    fn disabled_throttle_always_allows() {
        let t = AuthThrottle::disabled();
        for _ in 0..100 {
            assert!(t.allow_login("ip"));
        }
    }
}
