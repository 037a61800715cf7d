//! Replication lag of one replica-set member.

/// Lag of one non-primary member relative to the primary.
///
/// The value is the primary's last-applied time minus this member's
/// last-applied time. It may be negative when clocks or oplog ordering
/// skew, and is never clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LagSample {
    /// Member address as reported by the replica set (`host:port`).
    pub host: String,

    /// Signed lag in milliseconds.
    pub lag_ms: i64,
}

impl LagSample {
    /// Create a lag sample from a signed millisecond difference.
    pub fn new(host: impl Into<String>, lag_ms: i64) -> Self {
        Self {
            host: host.into(),
            lag_ms,
        }
    }

    /// Lag in (possibly negative) fractional seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.lag_ms as f64 / 1000.0
    }
}
