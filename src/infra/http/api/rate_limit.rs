use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Number of checks between sweeps of idle buckets.
const SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    client: String,
    route: String,
}

/// Outcome of one rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
}

/// Sliding-window limiter keyed by client address and matched route.
///
/// Buckets whose newest request has left the window are dropped, either when
/// they are next touched or by a periodic sweep, so idle clients do not
/// accumulate.
#[derive(Debug, Clone)]
pub struct ApiRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<BucketKey, VecDeque<Instant>>>,
    checks: Arc<AtomicU64>,
}

impl ApiRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
            checks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a request from `client` on `route` when capacity remains.
    pub fn check(&self, client: &str, route: &str) -> RateDecision {
        let now = Instant::now();
        let key = BucketKey {
            client: client.to_string(),
            route: route.to_string(),
        };

        let decision = {
            let mut bucket = self.buckets.entry(key).or_default();
            while bucket
                .front()
                .is_some_and(|first| now.duration_since(*first) >= self.window)
            {
                bucket.pop_front();
            }

            let used = u32::try_from(bucket.len()).unwrap_or(u32::MAX);
            if used >= self.max_requests {
                RateDecision {
                    allowed: false,
                    remaining: 0,
                }
            } else {
                bucket.push_back(now);
                RateDecision {
                    allowed: true,
                    remaining: self.max_requests - used - 1,
                }
            }
        };

        self.record_check(now);
        decision
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    #[cfg(test)]
    fn tracked_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Drops every bucket with no request inside the window.
    fn sweep_at(&self, now: Instant) {
        let window = self.window;
        self.buckets.retain(|_, bucket| {
            bucket
                .back()
                .is_some_and(|last| now.duration_since(*last) < window)
        });
    }

    // Must run after the bucket guard is released: `retain` locks every shard.
    fn record_check(&self, now: Instant) {
        let checks = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if checks % SWEEP_INTERVAL == 0 {
            self.sweep_at(now);
        }
    }
}
