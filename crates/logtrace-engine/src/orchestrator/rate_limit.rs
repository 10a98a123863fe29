use crate::config::RateLimitConfig;
use std::collections::{HashMap, VecDeque};

/// Sliding-window limiter keyed by logical session.
///
/// Only admitted requests count against the window. A request made exactly
/// one window after the oldest admitted one is allowed again.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window_ms: u64,
    admitted: HashMap<String, VecDeque<u64>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_ms: u64) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window_ms,
            admitted: HashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window_secs * 1000)
    }

    /// Admits and counts the request, or returns how long until a slot
    /// frees up.
    pub fn try_acquire(&mut self, key: &str, now_ms: u64) -> Result<(), u64> {
        let window_ms = self.window_ms;
        let max_requests = self.max_requests;
        let admitted = self.admitted.entry(key.to_string()).or_default();
        while admitted
            .front()
            .is_some_and(|t| now_ms.saturating_sub(*t) >= window_ms)
        {
            admitted.pop_front();
        }

        if admitted.len() >= max_requests {
            let oldest = admitted.front().copied().unwrap_or(now_ms);
            return Err(oldest.saturating_add(window_ms).saturating_sub(now_ms));
        }
        admitted.push_back(now_ms);
        Ok(())
    }

    /// Requests still allowed for `key` at `now_ms`.
    pub fn remaining(&self, key: &str, now_ms: u64) -> usize {
        let used = self.admitted.get(key).map_or(0, |admitted| {
            admitted
                .iter()
                .filter(|t| now_ms.saturating_sub(**t) < self.window_ms)
                .count()
        });
        self.max_requests.saturating_sub(used)
    }
}
