//! Reviewer-facing read side: suspicious-session listing.
//!
//! Filters the session store down to sessions holding at least one
//! flagged violation, then orders by reviewer priority: highest flagged
//! severity first, flagged count as tiebreak. A session with one
//! `critical` flag outranks a session with a dozen `high` flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manager::ProctorManager;
use crate::session::ProctorSession;
use crate::violation::{Severity, SecurityViolation};

/// Filter for [`ProctorManager::list_suspicious`]. Unset fields match
/// everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspiciousFilter {
    /// Restrict to one assessment.
    pub assessment_id: Option<String>,
    /// Restrict to one user.
    pub user_id: Option<String>,
    /// Sessions started at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Sessions started at or before this instant.
    pub to: Option<DateTime<Utc>>,
}

impl SuspiciousFilter {
    fn matches(&self, session: &ProctorSession) -> bool {
        if let Some(assessment_id) = &self.assessment_id {
            if session.assessment_id != *assessment_id {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if session.user_id != *user_id {
                return false;
            }
        }
        if let Some(from) = self.from {
            if session.started_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if session.started_at > to {
                return false;
            }
        }
        true
    }
}

/// One entry of the suspicious-session listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousSession {
    /// Owned snapshot of the session.
    pub session: ProctorSession,
    /// The flagged violations, in insertion order.
    pub flagged: Vec<SecurityViolation>,
    /// Highest severity among the flagged violations.
    pub highest_severity: Severity,
}

impl ProctorManager {
    /// List sessions containing at least one flagged violation, filtered
    /// first, then sorted by `(highest flagged severity desc, flagged
    /// count desc)`.
    pub async fn list_suspicious(&self, filter: &SuspiciousFilter) -> Vec<SuspiciousSession> {
        let mut entries: Vec<SuspiciousSession> = self
            .sessions_snapshot()
            .await
            .into_iter()
            .filter(|session| filter.matches(session))
            .filter_map(|session| {
                let flagged: Vec<SecurityViolation> = session
                    .violations
                    .iter()
                    .filter(|v| v.flagged)
                    .cloned()
                    .collect();
                let highest_severity = flagged.iter().map(|v| v.severity).max()?;
                Some(SuspiciousSession {
                    session,
                    flagged,
                    highest_severity,
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            b.highest_severity
                .cmp(&a.highest_severity)
                .then_with(|| b.flagged.len().cmp(&a.flagged.len()))
        });
        entries
    }
}
