use std::time::Duration;

/// How often the reclaimer sweeps when no interval is configured.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Longest sweep interval honored; larger values are clamped to it.
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Record lifetime of the session stores when no TTL is configured.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Record lifetime of the auth store when no TTL is configured.
pub const DEFAULT_AUTH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Expiry settings shared by every store builder.
///
/// Zero durations mean "use the default".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryConfig {
    pub ttl: Duration,
    pub sweep_interval: Duration,
    pub sliding: bool,
}

impl ExpiryConfig {
    pub(crate) fn with_default_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            sliding: false,
        }
    }

    pub(crate) fn normalized(self, default_ttl: Duration) -> Self {
        Self {
            ttl: if self.ttl.is_zero() { default_ttl } else { self.ttl },
            sweep_interval: if self.sweep_interval.is_zero() {
                DEFAULT_SWEEP_INTERVAL
            } else {
                self.sweep_interval.min(MAX_SWEEP_INTERVAL)
            },
            sliding: self.sliding,
        }
    }

    /// The TTL for one operation: a positive override wins over the default.
    pub fn effective_ttl(&self, ttl_override: Option<Duration>) -> Duration {
        ttl_override
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or(self.ttl)
    }
}
