use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Sliding-window limiter keyed by client address.
#[derive(Debug, Clone)]
pub struct IpRateLimiter {
    hits: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    window: Duration,
    max_requests: usize,
}

impl IpRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            hits: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_requests: max_requests.max(1),
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut hits = self.hits.lock();
        let queue = hits.entry(key.to_string()).or_default();

        while queue
            .front()
            .is_some_and(|front| now.duration_since(*front) >= self.window)
        {
            queue.pop_front();
        }

        if queue.len() >= self.max_requests {
            let oldest = queue.front().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.duration_since(oldest));
            return RateDecision::Limited { retry_after };
        }

        queue.push_back(now);
        RateDecision::Allowed {
            remaining: self.max_requests - queue.len(),
        }
    }

    /// Drops clients with no hits inside the current window.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut hits = self.hits.lock();
        let before = hits.len();
        hits.retain(|_, queue| {
            queue
                .back()
                .is_some_and(|last| now.duration_since(*last) < self.window)
        });
        before - hits.len()
    }
}
