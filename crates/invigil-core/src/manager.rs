//! Proctor session store and lifecycle manager.
//!
//! Owns the shared session registry and enforces the lifecycle rules:
//! one active session per user, append-only violations, auto-escalation,
//! and clock-driven expiry.
//!
//! # Locking discipline
//!
//! The registry (`session_id → session`, plus a `user_id → session_id`
//! secondary index) sits behind an async `RwLock`; each session body sits
//! behind its own async `Mutex`. Every read-modify-write on one session
//! (append violation, max-violations check, status transition) runs under
//! that session's mutex, so concurrent violations cannot race past the
//! max-violations check. Lock order is always registry before session;
//! no path acquires the registry while holding a session mutex. The
//! registry only grows: terminal sessions stay resident for the
//! suspicious-activity read side, and the user index simply points at the
//! user's latest session.
//!
//! # Expiry
//!
//! There are no per-session timers. A background sweep
//! ([`ProctorManager::run_expiry_sweeper`]) periodically scans for active
//! sessions whose deadline has elapsed and terminates them, re-checking
//! status under the session lock at fire time so a session that completed
//! in the meantime is left alone.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::attempt::AttemptDirectory;
use crate::browser::ClientSignals;
use crate::config::ProctorConfig;
use crate::error::{Error, Result, SessionError};
use crate::escalation::{completion_finding, reaches_violation_limit, should_auto_flag};
use crate::events::{EventBus, ProctorEvent};
use crate::session::{
    ClientContext, ProctorSession, SessionStatus, TERMINATION_REASON_KEY, generate_id,
};
use crate::violation::{
    MAX_DETAILS_LEN, ReviewDecision, SecurityViolation, Severity, ViolationKind, ViolationReport,
};

/// Termination reason recorded when the violation limit is reached.
pub const REASON_MAX_VIOLATIONS: &str = "Maximum violations exceeded";
/// Termination reason recorded by the expiry sweeper.
pub const REASON_TIMEOUT: &str = "Session timeout";

type SharedSession = Arc<Mutex<ProctorSession>>;

#[derive(Default)]
struct Registry {
    sessions: HashMap<String, SharedSession>,
    /// Latest session per user. Entries are overwritten on the next
    /// start, never removed; the pointed-at session's status decides
    /// whether it still blocks a new one.
    by_user: HashMap<String, String>,
}

/// Summary of one expiry sweep cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Active sessions examined.
    pub scanned: usize,
    /// Sessions terminated this cycle.
    pub terminated: Vec<String>,
    /// Termination attempts that failed (collaborator errors); the
    /// sessions stay active and the next sweep retries.
    pub errors: Vec<String>,
}

/// Session store and lifecycle manager.
pub struct ProctorManager {
    config: ProctorConfig,
    directory: Arc<dyn AttemptDirectory>,
    events: EventBus,
    registry: RwLock<Registry>,
}

impl ProctorManager {
    /// Create a manager over the given attempt directory.
    #[must_use]
    pub fn new(config: ProctorConfig, directory: Arc<dyn AttemptDirectory>) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            config,
            directory,
            events,
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ProctorEvent> {
        self.events.subscribe()
    }

    /// Platform-wide anti-cheat defaults.
    #[must_use]
    pub fn defaults(&self) -> &crate::config::AntiCheatConfig {
        &self.config.defaults
    }

    pub(crate) fn attempt_directory(&self) -> &Arc<dyn AttemptDirectory> {
        &self.directory
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// Start a proctoring session for an attempt.
    ///
    /// Fails `NotFound` when the attempt does not resolve, `Forbidden`
    /// when the attempt is not owned by the caller, and `Conflict` when
    /// the caller already holds an active session (the conflicting start
    /// is also recorded as a `multiple_sessions` violation against the
    /// existing session).
    pub async fn start_session(
        &self,
        attempt_id: &str,
        signals: &ClientSignals,
        caller_id: &str,
    ) -> Result<ProctorSession> {
        let attempt = self.directory.find_attempt(attempt_id).await?;
        if attempt.user_id != caller_id {
            return Err(SessionError::NotOwner {
                caller_id: caller_id.to_string(),
                resource: format!("attempt {attempt_id}"),
            }
            .into());
        }

        let effective = attempt.anti_cheat.apply(&self.config.defaults);
        effective.validate()?;

        let now = Utc::now();

        enum StartOutcome {
            Conflict(SharedSession, String),
            Created(ProctorSession),
        }

        let outcome = {
            let mut registry = self.registry.write().await;

            // One active session per user. The index may point at a
            // terminal session from an earlier attempt; that one does
            // not block.
            let existing = registry
                .by_user
                .get(caller_id)
                .and_then(|id| registry.sessions.get(id))
                .map(Arc::clone);
            let mut conflict = None;
            if let Some(shared) = existing {
                let guard = shared.lock().await;
                if guard.status == SessionStatus::Active {
                    conflict = Some((Arc::clone(&shared), guard.id.clone()));
                }
            }

            match conflict {
                Some((shared, session_id)) => StartOutcome::Conflict(shared, session_id),
                None => {
                    let mut session = ProctorSession::new(
                        attempt_id,
                        &attempt.user_id,
                        &attempt.assessment_id,
                        ClientContext::from_signals(signals),
                        effective,
                        now,
                    );
                    if let Some(ip) = &signals.ip_address {
                        session.metadata.insert(
                            "client_ip".to_string(),
                            serde_json::Value::String(ip.clone()),
                        );
                    }

                    let shared = Arc::new(Mutex::new(session.clone()));
                    registry.sessions.insert(session.id.clone(), shared);
                    registry
                        .by_user
                        .insert(caller_id.to_string(), session.id.clone());
                    StartOutcome::Created(session)
                }
            }
        };

        let snapshot = match outcome {
            StartOutcome::Conflict(shared, session_id) => {
                self.record_multiple_sessions(shared, attempt_id).await;
                return Err(SessionError::AlreadyActive { session_id }.into());
            }
            StartOutcome::Created(session) => session,
        };

        info!(
            session_id = %snapshot.id,
            attempt_id = %snapshot.attempt_id,
            user_id = %snapshot.user_id,
            assessment_id = %snapshot.assessment_id,
            "Proctor session started"
        );
        self.events.publish(ProctorEvent::SessionStarted {
            session: Box::new(snapshot.clone()),
        });
        Ok(snapshot)
    }

    /// End a session normally (`active → completed`), then run
    /// completion analysis over the full violation history.
    pub async fn end_session(&self, session_id: &str, caller_id: &str) -> Result<ProctorSession> {
        let shared = self.shared_session(session_id).await?;
        let now = Utc::now();

        let (snapshot, final_violation) = {
            let mut session = shared.lock().await;
            Self::check_owner(&session, caller_id)?;
            Self::check_active(&session)?;

            session.status = SessionStatus::Completed;
            session.ended_at = Some(now);

            // Whole-session pattern scan; a finding is appended as one
            // last violation before the record freezes.
            let final_violation = completion_finding(
                &session.violations,
                self.config.completion_tab_switch_threshold,
            )
            .map(|finding| {
                let violation = SecurityViolation {
                    id: generate_id(),
                    kind: finding.kind,
                    severity: finding.severity,
                    timestamp: now,
                    details: finding.details,
                    flagged: true,
                    reviewed: false,
                    reviewed_by: None,
                    reviewed_at: None,
                    review_note: None,
                };
                session.violations.push(violation.clone());
                violation
            });

            (session.clone(), final_violation)
        };

        info!(
            session_id = %snapshot.id,
            user_id = %snapshot.user_id,
            violations = snapshot.violations.len(),
            "Proctor session completed"
        );
        if let Some(violation) = final_violation {
            self.events.publish(ProctorEvent::ViolationRecorded {
                session_id: snapshot.id.clone(),
                violation: Box::new(violation),
            });
        }
        self.events.publish(ProctorEvent::SessionEnded {
            session: Box::new(snapshot.clone()),
        });
        Ok(snapshot)
    }

    /// Record a violation against an active session.
    ///
    /// The flag state is computed once here; when the violation count
    /// reaches the configured limit the session is terminated in the
    /// same critical section.
    pub async fn record_violation(
        &self,
        session_id: &str,
        report: &ViolationReport,
        caller_id: &str,
    ) -> Result<SecurityViolation> {
        if report.details.len() > MAX_DETAILS_LEN {
            return Err(Error::Validation(format!(
                "violation details exceed {MAX_DETAILS_LEN} bytes"
            )));
        }

        let shared = self.shared_session(session_id).await?;
        let now = Utc::now();

        let (violation, terminated) = {
            let mut session = shared.lock().await;
            Self::check_owner(&session, caller_id)?;
            Self::check_active(&session)?;

            let severity = report.effective_severity();
            let violation = SecurityViolation {
                id: generate_id(),
                kind: report.kind,
                severity,
                timestamp: now,
                details: report.details.clone(),
                flagged: should_auto_flag(severity, now, &session.violations, &session.config),
                reviewed: false,
                reviewed_by: None,
                reviewed_at: None,
                review_note: None,
            };
            session.violations.push(violation.clone());

            debug!(
                session_id = %session.id,
                kind = %violation.kind,
                severity = %violation.severity,
                flagged = violation.flagged,
                total = session.violations.len(),
                "Violation recorded"
            );

            // A failed termination (collaborator error) is logged inside
            // terminate_locked; the session stays active and the next
            // violation or sweep re-attempts. The record itself stands.
            let terminated = if reaches_violation_limit(session.violations.len(), &session.config)
            {
                self.terminate_locked(&mut session, REASON_MAX_VIOLATIONS)
                    .await
                    .ok()
                    .flatten()
                    .map(|snapshot| (snapshot, REASON_MAX_VIOLATIONS.to_string()))
            } else {
                None
            };

            (violation, terminated)
        };

        self.events.publish(ProctorEvent::ViolationRecorded {
            session_id: session_id.to_string(),
            violation: Box::new(violation.clone()),
        });
        if let Some((snapshot, reason)) = terminated {
            self.events.publish(ProctorEvent::SessionTerminated {
                session: Box::new(snapshot),
                reason,
            });
        }
        Ok(violation)
    }

    // =========================================================================
    // Expiry sweep
    // =========================================================================

    /// Terminate every active session whose deadline has elapsed at
    /// `now`. Status is re-checked under each session's lock, so a
    /// session that completed between scan and fire is left alone.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> SweepReport {
        let candidates: Vec<SharedSession> = {
            let registry = self.registry.read().await;
            registry.sessions.values().map(Arc::clone).collect()
        };

        let mut report = SweepReport::default();
        for shared in candidates {
            let terminated = {
                let mut session = shared.lock().await;
                if session.status != SessionStatus::Active {
                    continue;
                }
                report.scanned += 1;
                if now < session.expires_at() {
                    continue;
                }

                match self.terminate_locked(&mut session, REASON_TIMEOUT).await {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        report
                            .errors
                            .push(format!("session {}: {err}", session.id));
                        warn!(
                            session_id = %session.id,
                            error = %err,
                            "Expiry termination failed; will retry next sweep"
                        );
                        None
                    }
                }
            };

            if let Some(snapshot) = terminated {
                report.terminated.push(snapshot.id.clone());
                self.events.publish(ProctorEvent::SessionTerminated {
                    session: Box::new(snapshot),
                    reason: REASON_TIMEOUT.to_string(),
                });
            }
        }

        if !report.terminated.is_empty() {
            info!(
                scanned = report.scanned,
                terminated = report.terminated.len(),
                "Expiry sweep terminated stale sessions"
            );
        }
        report
    }

    /// Run the expiry sweep loop until `shutdown` is signalled.
    ///
    /// Intended to be spawned as a background `tokio::spawn` task next
    /// to the transport layer.
    pub async fn run_expiry_sweeper(self: Arc<Self>, shutdown: Arc<AtomicBool>) {
        let interval = self.config.sweep_interval;
        info!(interval_secs = interval.as_secs(), "Expiry sweeper started");

        loop {
            tokio::time::sleep(interval).await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Expiry sweeper shutting down");
                break;
            }

            let report = self.sweep_expired(Utc::now()).await;
            for err in &report.errors {
                warn!(error = %err, "Expiry sweeper error");
            }
        }
    }

    // =========================================================================
    // Read side & review
    // =========================================================================

    /// Owned snapshot of one session.
    pub async fn session(&self, session_id: &str) -> Result<ProctorSession> {
        let shared = self.shared_session(session_id).await?;
        let session = shared.lock().await;
        Ok(session.clone())
    }

    /// Owned snapshots of every session the registry holds.
    pub async fn sessions_snapshot(&self) -> Vec<ProctorSession> {
        let candidates: Vec<SharedSession> = {
            let registry = self.registry.read().await;
            registry.sessions.values().map(Arc::clone).collect()
        };
        let mut snapshots = Vec::with_capacity(candidates.len());
        for shared in candidates {
            snapshots.push(shared.lock().await.clone());
        }
        snapshots
    }

    /// Number of currently active sessions.
    pub async fn active_session_count(&self) -> usize {
        self.sessions_snapshot()
            .await
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .count()
    }

    /// Fetch one violation.
    pub async fn violation(
        &self,
        session_id: &str,
        violation_id: &str,
    ) -> Result<SecurityViolation> {
        let shared = self.shared_session(session_id).await?;
        let session = shared.lock().await;
        session
            .violations
            .iter()
            .find(|v| v.id == violation_id)
            .cloned()
            .ok_or_else(|| SessionError::ViolationNotFound(violation_id.to_string()).into())
    }

    /// Apply a human review decision to one violation. Works on terminal
    /// sessions, since reviewers act after the fact, and touches only the
    /// review fields.
    pub async fn review_violation(
        &self,
        session_id: &str,
        violation_id: &str,
        review: &ReviewDecision,
    ) -> Result<SecurityViolation> {
        let shared = self.shared_session(session_id).await?;
        let now = Utc::now();
        let mut session = shared.lock().await;
        let violation = session
            .violations
            .iter_mut()
            .find(|v| v.id == violation_id)
            .ok_or_else(|| Error::from(SessionError::ViolationNotFound(violation_id.to_string())))?;

        violation.apply_review(review, now);
        info!(
            session_id,
            violation_id,
            reviewer = %review.reviewer_id,
            dismissed = review.dismiss,
            "Violation reviewed"
        );
        Ok(violation.clone())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn shared_session(&self, session_id: &str) -> Result<SharedSession> {
        let registry = self.registry.read().await;
        registry
            .sessions
            .get(session_id)
            .map(Arc::clone)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()).into())
    }

    fn check_owner(session: &ProctorSession, caller_id: &str) -> Result<()> {
        if session.user_id != caller_id {
            return Err(SessionError::NotOwner {
                caller_id: caller_id.to_string(),
                resource: format!("session {}", session.id),
            }
            .into());
        }
        Ok(())
    }

    fn check_active(session: &ProctorSession) -> Result<()> {
        if session.status != SessionStatus::Active {
            return Err(SessionError::NotActive {
                session_id: session.id.clone(),
                status: session.status,
            }
            .into());
        }
        Ok(())
    }

    /// Terminate a session already held under its lock. The attempt
    /// store is flagged first: if that fails the session is left active
    /// so a later check can re-attempt cleanup, and the error is
    /// returned for the caller to log. On success returns a snapshot for
    /// event publication.
    async fn terminate_locked(
        &self,
        session: &mut ProctorSession,
        reason: &str,
    ) -> Result<Option<ProctorSession>> {
        if session.status != SessionStatus::Active {
            return Ok(None);
        }

        self.directory
            .flag_for_review(&session.attempt_id)
            .await
            .map_err(|err| {
                warn!(
                    session_id = %session.id,
                    attempt_id = %session.attempt_id,
                    error = %err,
                    "Failed to flag attempt for review; leaving session active"
                );
                Error::Collaborator(format!(
                    "flag_for_review({}) failed: {err}",
                    session.attempt_id
                ))
            })?;

        session.status = SessionStatus::Terminated;
        session.ended_at = Some(Utc::now());
        session.metadata.insert(
            TERMINATION_REASON_KEY.to_string(),
            serde_json::Value::String(reason.to_string()),
        );

        info!(
            session_id = %session.id,
            user_id = %session.user_id,
            reason,
            "Proctor session terminated"
        );
        Ok(Some(session.clone()))
    }

    /// Best-effort `multiple_sessions` violation against the session
    /// that blocked a conflicting start.
    async fn record_multiple_sessions(&self, shared: SharedSession, attempt_id: &str) {
        let now = Utc::now();

        let (violation, session_id, terminated) = {
            let mut session = shared.lock().await;
            if session.status != SessionStatus::Active {
                return;
            }
            let violation = SecurityViolation {
                id: generate_id(),
                kind: ViolationKind::MultipleSessions,
                severity: Severity::Critical,
                timestamp: now,
                details: format!("Concurrent session start attempted for attempt {attempt_id}"),
                flagged: true,
                reviewed: false,
                reviewed_by: None,
                reviewed_at: None,
                review_note: None,
            };
            session.violations.push(violation.clone());

            let terminated = if reaches_violation_limit(session.violations.len(), &session.config)
            {
                self.terminate_locked(&mut session, REASON_MAX_VIOLATIONS)
                    .await
                    .ok()
                    .flatten()
            } else {
                None
            };
            (violation, session.id.clone(), terminated)
        };
        self.events.publish(ProctorEvent::ViolationRecorded {
            session_id,
            violation: Box::new(violation),
        });
        if let Some(snapshot) = terminated {
            self.events.publish(ProctorEvent::SessionTerminated {
                session: Box::new(snapshot),
                reason: REASON_MAX_VIOLATIONS.to_string(),
            });
        }
    }
}

impl std::fmt::Debug for ProctorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProctorManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
