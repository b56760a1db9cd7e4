//! Violation and severity model: the value types every other proctoring
//! component consumes.
//!
//! `ViolationKind` is a closed enum: adding a kind forces every consumption
//! site (default severity, lockdown mapping, completion analysis) through
//! an exhaustive match instead of silently falling through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Severity
// =============================================================================

/// Severity of a recorded violation, ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Rank for ordering. Higher rank = more severe.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// =============================================================================
// Violation kind
// =============================================================================

/// Kind of anomalous client event observed during a proctored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Browser tab lost focus to another tab.
    TabSwitch,
    /// Assessment window lost focus entirely.
    WindowBlur,
    /// Clipboard copy or paste inside the assessment.
    CopyPaste,
    /// Context menu opened.
    RightClick,
    /// Developer tools opened or probed.
    DevTools,
    /// Fullscreen mode exited while required.
    FullscreenExit,
    /// Answer timing pattern flagged by the analyzer.
    SuspiciousTiming,
    /// A second concurrent session was attempted for the same user.
    MultipleSessions,
    /// Client IP address changed mid-session.
    IpChange,
    /// Browser fingerprint changed mid-session.
    BrowserChange,
}

impl ViolationKind {
    /// Default severity assigned when the reporting client does not
    /// escalate. Reports may raise severity above this floor, never
    /// lower it below.
    #[must_use]
    pub const fn default_severity(self) -> Severity {
        match self {
            Self::TabSwitch | Self::WindowBlur | Self::RightClick => Severity::Low,
            Self::CopyPaste | Self::FullscreenExit => Severity::Medium,
            Self::DevTools | Self::SuspiciousTiming | Self::IpChange => Severity::High,
            Self::MultipleSessions | Self::BrowserChange => Severity::Critical,
        }
    }

    /// Stable wire name, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TabSwitch => "tab_switch",
            Self::WindowBlur => "window_blur",
            Self::CopyPaste => "copy_paste",
            Self::RightClick => "right_click",
            Self::DevTools => "dev_tools",
            Self::FullscreenExit => "fullscreen_exit",
            Self::SuspiciousTiming => "suspicious_timing",
            Self::MultipleSessions => "multiple_sessions",
            Self::IpChange => "ip_change",
            Self::BrowserChange => "browser_change",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Security violation
// =============================================================================

/// Maximum accepted length for client-supplied violation details.
pub const MAX_DETAILS_LEN: usize = 1024;

/// One recorded anomalous event within a proctored session.
///
/// `flagged` is computed once at insertion time by the auto-flag rule and
/// changes only through explicit human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityViolation {
    /// Violation identifier (random 128-bit hex).
    pub id: String,
    /// Kind of event.
    pub kind: ViolationKind,
    /// Effective severity (default for the kind, or an escalated override).
    pub severity: Severity,
    /// When the violation was recorded.
    pub timestamp: DateTime<Utc>,
    /// Free-form context supplied by the reporting client.
    pub details: String,
    /// Auto-flagged for reviewer attention at insertion time.
    pub flagged: bool,
    /// A human reviewer has looked at this violation.
    pub reviewed: bool,
    /// Reviewer identity, set on review.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    /// Review timestamp, set on review.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Optional reviewer note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_note: Option<String>,
}

impl SecurityViolation {
    /// Apply a human review decision. The only mutation allowed after
    /// insertion: review fields are stamped, and `flagged` may be cleared
    /// when the reviewer dismisses the finding.
    pub fn apply_review(&mut self, review: &ReviewDecision, now: DateTime<Utc>) {
        self.reviewed = true;
        self.reviewed_by = Some(review.reviewer_id.clone());
        self.reviewed_at = Some(now);
        self.review_note = review.note.clone();
        if review.dismiss {
            self.flagged = false;
        }
    }
}

/// A reviewer's verdict on a single violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecision {
    /// Identity of the reviewer (from the enclosing auth layer).
    pub reviewer_id: String,
    /// Optional free-form note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Clear the `flagged` bit (the finding was a false positive).
    #[serde(default)]
    pub dismiss: bool,
}

// =============================================================================
// Violation report (client input)
// =============================================================================

/// Client-side input for recording a violation. The recorder assigns the
/// id, timestamp, effective severity, and flag state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationReport {
    /// Kind of observed event.
    pub kind: ViolationKind,
    /// Optional severity escalation; values below the kind's default are
    /// clamped up to the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Free-form context (capped at [`MAX_DETAILS_LEN`]).
    #[serde(default)]
    pub details: String,
}

impl ViolationReport {
    /// Report with the kind's default severity and empty details.
    #[must_use]
    pub fn new(kind: ViolationKind) -> Self {
        Self {
            kind,
            severity: None,
            details: String::new(),
        }
    }

    /// Attach details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Escalate severity above the kind's default.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Effective severity: the requested override clamped to the kind's
    /// default floor.
    #[must_use]
    pub fn effective_severity(&self) -> Severity {
        let floor = self.kind.default_severity();
        match self.severity {
            Some(requested) => requested.max(floor),
            None => floor,
        }
    }
}
