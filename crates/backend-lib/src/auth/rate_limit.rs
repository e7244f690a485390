// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Throttling of failed login attempts per client address.

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of failed attempts before lockout
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration (5 minutes)
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Stale entries are swept once per this many recorded failures
const PRUNE_EVERY: u64 = 256;

#[derive(Debug, Clone)]
struct AttemptEntry {
    failed_attempts: u32,
    last_failure: Instant,
    lockout_expiry: Option<Instant>,
}

/// Rate limiter for login attempts
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    attempts: Arc<DashMap<IpAddr, AttemptEntry>>,
    max_attempts: u32,
    lockout_duration: Duration,
    recorded: Arc<AtomicU64>,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_DURATION)
    }
}

impl AuthRateLimiter {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts,
            lockout_duration,
            recorded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a failed login
    pub fn record_failed_attempt(&self, ip: IpAddr) {
        self.record_failed_attempt_at(ip, Instant::now());
    }

    fn record_failed_attempt_at(&self, ip: IpAddr, now: Instant) {
        {
            let mut entry = self.attempts.entry(ip).or_insert_with(|| AttemptEntry {
                failed_attempts: 0,
                last_failure: now,
                lockout_expiry: None,
            });

            let lockout = entry.lockout_expiry;
            match lockout {
                // A served lockout starts a fresh window
                Some(expiry) if now >= expiry => {
                    entry.failed_attempts = 0;
                    entry.lockout_expiry = None;
                },
                // Failures older than one lockout period are forgotten
                None if self.is_stale(entry.value(), now) => entry.failed_attempts = 0,
                _ => {},
            }

            entry.failed_attempts += 1;
            entry.last_failure = now;

            if entry.failed_attempts >= self.max_attempts && entry.lockout_expiry.is_none() {
                entry.lockout_expiry = Some(now + self.lockout_duration);
                tracing::warn!(%ip, attempts = entry.failed_attempts, "client locked out of login");
            }
        }

        // the entry guard must be released before sweeping the map
        if self.recorded.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.cleanup_at(now);
        }
    }

    fn is_stale(&self, entry: &AttemptEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_failure) > self.lockout_duration
    }

    /// Forget failures after a successful login
    pub fn record_success(&self, ip: IpAddr) {
        self.attempts.remove(&ip);
    }

    /// Whether this address may attempt a login now
    pub fn check_rate_limit(&self, ip: IpAddr) -> bool {
        self.check_rate_limit_at(ip, Instant::now())
    }

    fn check_rate_limit_at(&self, ip: IpAddr, now: Instant) -> bool {
        match self.attempts.get(&ip) {
            Some(entry) => !entry.lockout_expiry.is_some_and(|expiry| now < expiry),
            None => true,
        }
    }

    /// Drop served lockouts and stale failure records
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        self.attempts.retain(|_, entry| match entry.lockout_expiry {
            Some(expiry) => now < expiry,
            None => !self.is_stale(entry, now),
        });
    }

    /// Number of addresses currently tracked
    pub fn tracked(&self) -> usize {
        self.attempts.len()
    }
}
