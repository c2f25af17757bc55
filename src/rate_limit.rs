use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::{Duration, interval};

use crate::client::ClientKey;
use crate::metrics::TRACKED_CLIENTS;

/// How many uploads a client may make inside a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub max: usize,
    pub window_ms: i64,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            max: 5,
            window_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: usize },
    Limited { retry_after_ms: i64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Storage behind the limiter. Implementations must make `try_record`
/// atomic per key; different keys may proceed in parallel.
pub trait UploadLog: Send + Sync {
    fn try_record(&self, key: &ClientKey, now_ms: i64, policy: &RatePolicy) -> RateDecision;

    /// Drop keys with nothing left inside the window. Returns how many were removed.
    fn sweep(&self, now_ms: i64, policy: &RatePolicy) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sliding-window admission over one client's timestamps.
///
/// Prunes everything at least one window old, then either records `now_ms`
/// or reports when the oldest surviving upload leaves the window. The log
/// stays sorted: a clock reading behind the newest entry is clamped to it.
pub fn admit(timestamps: &mut Vec<i64>, now_ms: i64, policy: &RatePolicy) -> RateDecision {
    let now_ms = timestamps.last().map_or(now_ms, |&last| now_ms.max(last));
    timestamps.retain(|&ts| now_ms - ts < policy.window_ms);

    if timestamps.len() >= policy.max {
        let retry_after_ms = timestamps
            .first()
            .map_or(policy.window_ms, |&oldest| oldest.saturating_add(policy.window_ms) - now_ms);
        return RateDecision::Limited {
            retry_after_ms: retry_after_ms.max(0),
        };
    }

    timestamps.push(now_ms);
    RateDecision::Allowed {
        remaining: policy.max - timestamps.len(),
    }
}

// Process-local log: ClientKey -> upload timestamps (ms since epoch)
#[derive(Default)]
pub struct InMemoryUploadLog {
    entries: DashMap<String, Vec<i64>>,
}

impl InMemoryUploadLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timestamps(&self, key: &ClientKey) -> Vec<i64> {
        self.entries
            .get(key.as_str())
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

impl UploadLog for InMemoryUploadLog {
    fn try_record(&self, key: &ClientKey, now_ms: i64, policy: &RatePolicy) -> RateDecision {
        // the entry guard holds the shard lock for the whole read-modify-write
        let mut entry = self.entries.entry(key.as_str().to_string()).or_default();
        admit(entry.value_mut(), now_ms, policy)
    }

    fn sweep(&self, now_ms: i64, policy: &RatePolicy) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, timestamps| {
            timestamps
                .last()
                .is_some_and(|&newest| now_ms - newest < policy.window_ms)
        });
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct RateLimiter {
    log: Arc<dyn UploadLog>,
    policy: RatePolicy,
}

impl RateLimiter {
    pub fn new(log: Arc<dyn UploadLog>, policy: RatePolicy) -> Self {
        Self { log, policy }
    }

    pub fn in_memory(policy: RatePolicy) -> Self {
        Self::new(Arc::new(InMemoryUploadLog::new()), policy)
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    // Check against the wall clock
    pub fn check(&self, key: &ClientKey) -> RateDecision {
        self.check_at(key, now_ms())
    }

    pub fn check_at(&self, key: &ClientKey, now_ms: i64) -> RateDecision {
        let decision = self.log.try_record(key, now_ms, &self.policy);
        TRACKED_CLIENTS.set(self.log.len() as f64);
        decision
    }

    pub fn sweep_at(&self, now_ms: i64) -> usize {
        let removed = self.log.sweep(now_ms, &self.policy);
        TRACKED_CLIENTS.set(self.log.len() as f64);
        removed
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// Sweeper - periodically forgets clients whose uploads all aged out
pub async fn sweeper(limiter: Arc<RateLimiter>, sweep_interval: Duration) {
    let mut interval = interval(sweep_interval);

    tracing::info!(interval = ?sweep_interval, "upload log sweeper started");

    loop {
        interval.tick().await;

        let removed = limiter.sweep_at(now_ms());
        if removed > 0 {
            tracing::debug!(removed, "swept idle clients from upload log");
        }
    }
}
