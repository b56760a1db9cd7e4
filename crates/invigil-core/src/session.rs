//! Proctor session state: status machine, session record, and the client
//! context captured at start.
//!
//! A session is created `Active`, transitions exactly once to `Completed`
//! (normal end) or `Terminated` (timeout, max-violations, forced), and is
//! immutable afterwards except for violation review fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::browser::ClientSignals;
use crate::config::AntiCheatConfig;
use crate::violation::SecurityViolation;

/// Metadata key under which a termination reason is stored. Clients of a
/// terminated session read the reason from here.
pub const TERMINATION_REASON_KEY: &str = "termination_reason";

// =============================================================================
// Status
// =============================================================================

/// Lifecycle state of a proctor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Attempt in progress; violations may be appended.
    Active,
    /// Ended normally by the owner.
    Completed,
    /// Forced shut: timeout, max violations, or explicit termination.
    Terminated,
}

impl SessionStatus {
    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Terminated)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

// =============================================================================
// Client context
// =============================================================================

/// Client environment captured once at session start.
///
/// The raw fingerprint never enters session state; only its SHA-256 is
/// kept, enough for equality checks against later reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientContext {
    /// Hex SHA-256 of the client fingerprint.
    pub fingerprint_hash: String,
    /// Client IP as seen by the transport layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Raw user-agent string.
    pub user_agent: String,
    /// Reported screen resolution.
    pub screen_resolution: String,
    /// Reported IANA timezone.
    pub timezone: String,
}

impl ClientContext {
    /// Capture the context from start-time signals.
    #[must_use]
    pub fn from_signals(signals: &ClientSignals) -> Self {
        Self {
            fingerprint_hash: hash_fingerprint(&signals.fingerprint),
            ip_address: signals.ip_address.clone(),
            user_agent: signals.user_agent.clone(),
            screen_resolution: signals.screen_resolution.clone(),
            timezone: signals.timezone.clone(),
        }
    }
}

/// Hex SHA-256 of a raw client fingerprint.
#[must_use]
pub fn hash_fingerprint(fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random 128-bit hex identifier for sessions and violations.
#[must_use]
pub fn generate_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

// =============================================================================
// Session record
// =============================================================================

/// One proctored assessment attempt in progress (or finished).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProctorSession {
    /// Session identifier (random 128-bit hex).
    pub id: String,
    /// Attempt this session monitors.
    pub attempt_id: String,
    /// Owner of the attempt.
    pub user_id: String,
    /// Assessment the attempt belongs to.
    pub assessment_id: String,
    /// Session start time.
    pub started_at: DateTime<Utc>,
    /// Set iff the session has left the active state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Violations in insertion order; append-only while active.
    pub violations: Vec<SecurityViolation>,
    /// Client environment captured at start.
    pub client: ClientContext,
    /// Effective anti-cheat policy, resolved once at start.
    pub config: AntiCheatConfig,
    /// Free-form metadata (termination reason, transport hints).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ProctorSession {
    /// Create a fresh active session.
    #[must_use]
    pub fn new(
        attempt_id: impl Into<String>,
        user_id: impl Into<String>,
        assessment_id: impl Into<String>,
        client: ClientContext,
        config: AntiCheatConfig,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id(),
            attempt_id: attempt_id.into(),
            user_id: user_id.into(),
            assessment_id: assessment_id.into(),
            started_at,
            ended_at: None,
            status: SessionStatus::Active,
            violations: Vec::new(),
            client,
            config,
            metadata: BTreeMap::new(),
        }
    }

    /// Deadline after which the expiry sweeper terminates this session.
    /// Saturates for absurdly large timeouts instead of overflowing.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.config.session_timeout)
            .ok()
            .and_then(|timeout| self.started_at.checked_add_signed(timeout))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Termination reason recorded in metadata, if any.
    #[must_use]
    pub fn termination_reason(&self) -> Option<&str> {
        self.metadata
            .get(TERMINATION_REASON_KEY)
            .and_then(|v| v.as_str())
    }

    /// Violations currently flagged for review.
    #[must_use]
    pub fn flagged_violations(&self) -> Vec<&SecurityViolation> {
        self.violations.iter().filter(|v| v.flagged).collect()
    }
}
