//! Bearer-token authentication: issuance, validation, revocation, and
//! per-IP lockout of repeated login failures

use chrono::Utc;
use dashmap::DashMap;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Compare two secrets without early exit on the first differing byte.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[derive(Debug, Clone)]
struct TokenEntry {
    username: String,
    expires_at: i64,
}

/// In-memory token store: token → (username, expiry).
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: DashMap<String, TokenEntry>,
}

impl TokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `username`, valid for `ttl_secs`.
    pub fn issue(&self, username: &str, ttl_secs: u64) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        self.tokens.insert(
            token.clone(),
            TokenEntry {
                username: username.to_string(),
                expires_at: Utc::now().timestamp() + ttl_secs as i64,
            },
        );
        token
    }

    /// Resolve a token to its username; expired tokens are dropped on read.
    pub fn validate(&self, token: &str) -> Option<String> {
        let entry = self.tokens.get(token)?;
        if entry.expires_at <= Utc::now().timestamp() {
            drop(entry);
            self.tokens.remove(token);
            return None;
        }
        Some(entry.username.clone())
    }

    /// Revoke one token. Returns true if it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }

    /// Revoke every token issued to `username`. Returns how many were
    /// dropped.
    pub fn revoke_all(&self, username: &str) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, entry| entry.username != username);
        before - self.tokens.len()
    }
}

struct RateLimitEntry {
    failures: u32,
    first_failure: Instant,
    locked_until: Option<Instant>,
}

/// Locks an IP after 5 login failures within a rolling window.
pub struct AuthRateLimiter {
    window: Duration,
    lockout: Duration,
    inner: Mutex<HashMap<String, RateLimitEntry>>,
}

impl AuthRateLimiter {
    /// Limiter with the production windows: 5 failures within a minute
    /// lock the IP for a minute.
    pub fn new() -> Self {
        Self::with_durations(Duration::from_secs(60), Duration::from_secs(60))
    }

    fn with_durations(window: Duration, lockout: Duration) -> Self {
        Self {
            window,
            lockout,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Record one failed attempt; returns true if the IP is now locked.
    pub fn record_failure(&self, ip: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.entry(ip.to_string()).or_insert(RateLimitEntry {
            failures: 0,
            first_failure: now,
            locked_until: None,
        });
        // A lapsed lockout starts a fresh window instead of re-locking.
        if entry.locked_until.is_some_and(|until| until <= now) {
            entry.locked_until = None;
            entry.failures = 0;
            entry.first_failure = now;
        }
        if entry.first_failure + self.window < now {
            entry.failures = 0;
            entry.first_failure = now;
        }
        entry.failures += 1;
        if entry.failures >= 5 {
            entry.locked_until = Some(now + self.lockout);
        }
        entry.locked_until.is_some_and(|until| until > now)
    }

    /// True while the IP's lockout window is open.
    pub fn is_rate_limited(&self, ip: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.get(ip) {
            if let Some(locked_until) = entry.locked_until {
                return locked_until > Instant::now();
            }
        }
        false
    }

    /// Drop entries whose failure window and any lockout have lapsed.
    /// Called on every login attempt so the map stays bounded by recent
    /// activity.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        inner.retain(|_, entry| {
            entry.locked_until.is_some_and(|until| until > now)
                || entry.first_failure + self.window >= now
        });
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
