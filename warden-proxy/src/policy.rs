//! Tool policy: static blocklist plus per-tool sliding-window rate limits.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Loaded at startup; not reloaded mid-run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProxyPolicy {
    /// Maximum calls per tool within the window.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    /// Sliding window length in seconds.
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,
    /// Tool names the proxy refuses to call.
    #[serde(default)]
    pub blocked_tools: BTreeSet<String>,
}

fn default_rate_limit() -> u32 {
    60
}

fn default_rate_window_secs() -> u64 {
    60
}

impl Default for ProxyPolicy {
    fn default() -> Self {
        Self {
            rate_limit: default_rate_limit(),
            rate_window_secs: default_rate_window_secs(),
            blocked_tools: BTreeSet::new(),
        }
    }
}

impl ProxyPolicy {
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn is_blocked(&self, tool: &str) -> bool {
        self.blocked_tools.contains(tool)
    }
}

// ---------------------------------------------------------------------------
// Rate limiter
// ---------------------------------------------------------------------------

/// Per-tool ring of recent call instants, purely in-memory and advisory.
/// Resets on restart. Prune-then-check-then-append: a rejected call does
/// not consume a window slot.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    calls: HashMap<String, Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            calls: HashMap::new(),
        }
    }

    pub fn for_policy(policy: &ProxyPolicy) -> Self {
        Self::new(policy.rate_limit, policy.rate_window())
    }

    /// Whether a call to `tool` is allowed right now. Allowed calls are
    /// recorded.
    pub fn check(&mut self, tool: &str) -> bool {
        let now = Instant::now();
        let ring = self.calls.entry(tool.to_string()).or_default();
        let window = self.window;
        ring.retain(|t| now.duration_since(*t) < window);
        if ring.len() as u32 >= self.limit {
            return false;
        }
        ring.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_blocks_nothing() {
        let policy = ProxyPolicy::default();
        assert!(!policy.is_blocked("anything"));
        assert_eq!(policy.rate_limit, 60);
    }

    #[test]
    fn policy_parses_with_partial_fields() {
        let policy: ProxyPolicy =
            serde_json::from_str(r#"{"blocked_tools":["dangerous-tool"]}"#).unwrap();
        assert!(policy.is_blocked("dangerous-tool"));
        assert_eq!(policy.rate_limit, 60);
    }

    #[test]
    fn limiter_allows_up_to_limit_then_rejects() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("limited-tool"));
        assert!(limiter.check("limited-tool"));
        assert!(!limiter.check("limited-tool"));
    }

    #[test]
    fn limiter_is_keyed_per_tool() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert!(!limiter.check("a"));
    }

    #[test]
    fn limiter_prunes_expired_entries() {
        let mut limiter = RateLimiter::new(1, Duration::from_millis(10));
        assert!(limiter.check("tool"));
        std::thread::sleep(Duration::from_millis(25));
        assert!(limiter.check("tool"));
    }

    #[test]
    fn rejected_call_does_not_consume_a_slot() {
        let mut limiter = RateLimiter::new(1, Duration::from_millis(50));
        assert!(limiter.check("tool"));
        assert!(!limiter.check("tool"));
        std::thread::sleep(Duration::from_millis(60));
        // Only the allowed call occupied the window.
        assert!(limiter.check("tool"));
    }
}
