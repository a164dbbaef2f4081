//! Sliding-window rate limiter: one shared map keyed by string, swept by a
//! background task every 5 minutes. `Stop` closes a done-channel; calling
//! [`RateLimiter::check`] after stop is always safe, it just stops evicting.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

/// Sweep interval for evicting buckets with no recent activity.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Width of the sliding window.
pub const WINDOW: Duration = Duration::from_secs(60);
/// `Retry-After` sent with a 429, fixed to the window width.
pub const RETRY_AFTER_SECS: u64 = 60;

/// General API bucket default.
pub const DEFAULT_API_LIMIT: u32 = 120;
/// Auth endpoint bucket default, stricter than the general API bucket.
pub const DEFAULT_AUTH_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOutcome {
    Allowed,
    Denied { retry_after_secs: u64 },
}

/// Builds the limiter key: `user:{id}` when claims are present, else
/// `ip:{addr}`.
pub fn rate_limit_key(user_id: Option<Uuid>, ip: IpAddr) -> String {
    match user_id {
        Some(id) => format!("user:{id}"),
        None => format!("ip:{ip}"),
    }
}

/// A single sliding-window bucket keyed by string.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, VecDeque<Instant>>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            limit,
            window,
        }
    }

    /// Records a hit for `key` and reports whether it's within the window's
    /// limit. Expired entries are evicted inline, so `check` never grows a
    /// bucket unbounded even between sweeps.
    pub fn check(&self, key: &str) -> RateLimitOutcome {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(key.to_string()).or_default();
        while let Some(&oldest) = bucket.front() {
            if now.duration_since(oldest) > self.window {
                bucket.pop_front();
            } else {
                break;
            }
        }

        if bucket.len() as u32 >= self.limit {
            return RateLimitOutcome::Denied {
                retry_after_secs: RETRY_AFTER_SECS,
            };
        }

        bucket.push_back(now);
        RateLimitOutcome::Allowed
    }

    /// Drops buckets whose every recorded hit has aged out of the window.
    /// Run from a background task; safe to call concurrently with `check`.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.buckets
            .lock()
            .retain(|_, bucket| bucket.back().is_some_and(|&last| now.duration_since(last) <= self.window));
    }
}

/// Bundles the general-API and auth-endpoint limiters the spec calls out as
/// separate buckets.
pub struct RateLimiters {
    pub api: RateLimiter,
    pub auth: RateLimiter,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self {
            api: RateLimiter::new(DEFAULT_API_LIMIT, WINDOW),
            auth: RateLimiter::new(DEFAULT_AUTH_LIMIT, WINDOW),
        }
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the background sweeper. Send `true` on `shutdown` to stop it;
/// the returned handle resolves once the loop observes the signal.
pub fn spawn_sweeper(
    limiters: Arc<RateLimiters>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    limiters.api.sweep();
                    limiters.auth.sweep();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_n_calls_succeed_within_the_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert_eq!(limiter.check("k"), RateLimitOutcome::Allowed);
        assert_eq!(limiter.check("k"), RateLimitOutcome::Allowed);
        assert_eq!(limiter.check("k"), RateLimitOutcome::Allowed);
        assert!(matches!(limiter.check("k"), RateLimitOutcome::Denied { .. }));
    }

    #[test]
    fn distinct_keys_have_independent_buckets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert_eq!(limiter.check("a"), RateLimitOutcome::Allowed);
        assert_eq!(limiter.check("b"), RateLimitOutcome::Allowed);
    }

    #[test]
    fn denied_reports_the_fixed_retry_after() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));
        match limiter.check("k") {
            RateLimitOutcome::Denied { retry_after_secs } => assert_eq!(retry_after_secs, 60),
            RateLimitOutcome::Allowed => panic!("expected denial with zero-limit bucket"),
        }
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        assert_eq!(limiter.check("k"), RateLimitOutcome::Allowed);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.check("k"), RateLimitOutcome::Allowed);
    }

    #[test]
    fn key_prefers_user_id_over_ip() {
        let user_id = Uuid::new_v4();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(rate_limit_key(Some(user_id), ip), format!("user:{user_id}"));
        assert_eq!(rate_limit_key(None, ip), "ip:127.0.0.1");
    }

    #[test]
    fn sweep_drops_only_stale_buckets() {
        let limiter = RateLimiter::new(10, Duration::from_millis(10));
        limiter.check("stale");
        std::thread::sleep(Duration::from_millis(20));
        limiter.check("fresh");
        limiter.sweep();
        let buckets = limiter.buckets.lock();
        assert!(!buckets.contains_key("stale"));
        assert!(buckets.contains_key("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_after_shutdown_signal() {
        let limiters = Arc::new(RateLimiters::new());
        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = spawn_sweeper(limiters, rx);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop in time")
            .unwrap();
    }
}
