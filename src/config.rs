//! Runtime configuration.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::Points;

/// Smallest amount accepted by a single charge.
pub const MIN_CHARGE: Points = Points::new(1_000);

/// Largest balance a user may hold.
pub const MAX_BALANCE: Points = Points::new(10_000_000);

pub const STORE_LATENCY_ENV: &str = "POINT_LEDGER_STORE_LATENCY_MS";
pub const LOCK_TIMEOUT_ENV: &str = "POINT_LEDGER_LOCK_TIMEOUT_MS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Artificial delay applied to every in-memory store call.
    pub store_latency: Duration,
    /// Upper bound on waiting for a user's lock. `None` waits forever.
    pub lock_timeout: Option<Duration>,
}

impl LedgerConfig {
    pub fn with_store_latency(mut self, latency: Duration) -> Self {
        self.store_latency = latency;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Build a config from `POINT_LEDGER_*` environment variables, falling
    /// back to defaults for unset or malformed values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str| -> Option<Duration> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(ms) => Some(Duration::from_millis(ms)),
                Err(e) => {
                    warn!(key, value = %raw, reason = %e, "ignoring malformed setting");
                    None
                }
            }
        };

        Self {
            store_latency: millis(STORE_LATENCY_ENV).unwrap_or_default(),
            lock_timeout: millis(LOCK_TIMEOUT_ENV),
        }
    }
}
