//! Rate limiting for the unauthenticated and mutating endpoints.
//!
//! Each key (`action:clientIp`) owns an ordered list of attempt timestamps.
//! Only attempts inside the action's window count toward its limit, so the
//! window slides with time. State is per process: with several instances the
//! effective limit is multiplied by the instance count.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Attempts older than this are dropped by the sweep regardless of action.
pub const SWEEP_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Maximum attempts allowed inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_attempts: usize,
    pub window: Duration,
}

impl RateLimit {
    pub const fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }
}

/// Rate-limited actions and their limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitAction {
    /// 5 per 15 minutes.
    Login,
    /// 3 per hour.
    Register,
    /// 3 per hour.
    Invite,
    /// 10 per 15 minutes. Public invite-code lookups.
    InviteCheck,
    /// 30 per minute. Data-mutation endpoints.
    Mutation,
}

impl RateLimitAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RateLimitAction::Login => "login",
            RateLimitAction::Register => "register",
            RateLimitAction::Invite => "invite",
            RateLimitAction::InviteCheck => "invite-check",
            RateLimitAction::Mutation => "mutation",
        }
    }

    pub fn limit(self) -> RateLimit {
        match self {
            RateLimitAction::Login => RateLimit::new(5, Duration::from_secs(15 * 60)),
            RateLimitAction::Register => RateLimit::new(3, Duration::from_secs(60 * 60)),
            RateLimitAction::Invite => RateLimit::new(3, Duration::from_secs(60 * 60)),
            RateLimitAction::InviteCheck => RateLimit::new(10, Duration::from_secs(15 * 60)),
            RateLimitAction::Mutation => RateLimit::new(30, Duration::from_secs(60)),
        }
    }

    /// Rate-limit key for this action and client address.
    pub fn key(self, client_ip: &str) -> String {
        format!("{}:{client_ip}", self.as_str())
    }
}

impl fmt::Display for RateLimitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// Rejected; the oldest counted attempt leaves the window after
    /// `retry_after_ms`.
    Limited { retry_after_ms: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

/// Rate limiter seam. The in-memory implementation suits one process; a
/// shared-cache implementation can replace it behind the same trait.
pub trait RateLimiter: Send + Sync {
    /// Record an attempt for `key` unless it is over `limit`.
    fn check(&self, key: &str, limit: RateLimit) -> RateLimitDecision;
}

/// Per-process sliding-window rate limiter.
///
/// `DashMap` entries are locked per shard, so the prune/count/append sequence
/// for one key runs without interleaving from concurrent requests.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    attempts: DashMap<String, VecDeque<DateTime<Utc>>>,
}

fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `key` against `limit` as of `now`.
    pub fn check_at(&self, key: &str, limit: RateLimit, now: DateTime<Utc>) -> RateLimitDecision {
        let cutoff = window_start(now, limit.window);
        let mut entry = self.attempts.entry(key.to_string()).or_default();
        let attempts = entry.value_mut();

        while attempts.front().is_some_and(|t| *t <= cutoff) {
            attempts.pop_front();
        }

        if attempts.len() >= limit.max_attempts {
            let retry_after_ms = attempts
                .front()
                .map(|oldest| (*oldest - cutoff).num_milliseconds().max(1))
                .unwrap_or(1);
            return RateLimitDecision::Limited {
                retry_after_ms: u64::try_from(retry_after_ms).unwrap_or(1),
            };
        }

        attempts.push_back(now);
        RateLimitDecision::Allowed
    }

    /// Drop attempts older than [`SWEEP_MAX_AGE`] and forget empty keys.
    pub fn sweep_at(&self, now: DateTime<Utc>) {
        let cutoff = window_start(now, SWEEP_MAX_AGE);
        self.attempts.retain(|_, attempts| {
            attempts.retain(|t| *t > cutoff);
            !attempts.is_empty()
        });
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.attempts.len()
    }

    /// Run [`Self::sweep_at`] every [`SWEEP_INTERVAL`] until `shutdown` fires.
    pub fn spawn_sweeper(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("rate limit sweeper stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        self.sweep_at(Utc::now());
                        debug!(keys = self.tracked_keys(), "rate limit sweep");
                    }
                }
            }
        })
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check(&self, key: &str, limit: RateLimit) -> RateLimitDecision {
        self.check_at(key, limit, Utc::now())
    }
}
