//! Audit footer: timestamp, registration id, evidence count.
//!
//! The footer is computed locally on every path and never passes through
//! the generation capability.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Source of time and randomness for the audit footer.
///
/// Injected so tests and reproducible runs can pin both.
pub trait AuditClock: Send + Sync + fmt::Debug {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// A random 16-bit nonce.
    fn nonce(&self) -> u16;
}

/// Wall clock plus a v4 UUID nonce.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl AuditClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn nonce(&self) -> u16 {
        let bytes = Uuid::new_v4().into_bytes();
        u16::from_be_bytes([bytes[0], bytes[1]])
    }
}

/// A clock that always returns the same instant and nonce.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    /// Instant returned by `now`.
    pub at: DateTime<Utc>,
    /// Value returned by `nonce`.
    pub nonce: u16,
}

impl AuditClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }

    fn nonce(&self) -> u16 {
        self.nonce
    }
}

/// Report registration identifier, `YYMMDD-XXXX-Enn`.
///
/// `XXXX` is the nonce in uppercase hex and `nn` the evidence count padded
/// to at least two digits. Uniqueness is nominal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationId(String);

impl RegistrationId {
    /// Derive an id from date, nonce, and evidence count.
    pub fn new(at: DateTime<Utc>, nonce: u16, evidence_count: usize) -> Self {
        Self(format!(
            "{}-{:04X}-E{:02}",
            at.format("%y%m%d"),
            nonce,
            evidence_count
        ))
    }

    /// The id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RegistrationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Footer attached to every report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFooter {
    /// RFC 3339 UTC timestamp, second precision.
    pub timestamp_iso: String,
    /// Registration id.
    pub registration_id: RegistrationId,
    /// Number of chunks retrieval retained.
    pub evidence_count: usize,
}

impl AuditFooter {
    /// Stamp a footer for `evidence_count` retained chunks.
    pub fn stamp(clock: &dyn AuditClock, evidence_count: usize) -> Self {
        let at = clock.now();
        Self {
            timestamp_iso: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            registration_id: RegistrationId::new(at, clock.nonce(), evidence_count),
            evidence_count,
        }
    }
}
