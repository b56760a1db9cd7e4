//! Attempt directory collaborator seam.
//!
//! The assessment/attempt store lives outside this crate (it owns the
//! relational schema and CRUD). The proctoring core consumes it through
//! [`AttemptDirectory`]: resolve an attempt at session start, and flag it
//! for review on termination. An in-memory implementation is provided for
//! single-node deployments and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AntiCheatOverrides;
use crate::error::{Error, Result, SessionError};

/// What the attempt store exposes about one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Attempt identifier.
    pub attempt_id: String,
    /// Owner of the attempt.
    pub user_id: String,
    /// Assessment the attempt belongs to.
    pub assessment_id: String,
    /// Assessment-level anti-cheat overrides, merged onto platform
    /// defaults at session start.
    #[serde(default)]
    pub anti_cheat: AntiCheatOverrides,
}

/// Read/flag access to the external attempt store.
#[async_trait]
pub trait AttemptDirectory: Send + Sync {
    /// Resolve an attempt. Fails with `AttemptNotFound` when missing.
    async fn find_attempt(&self, attempt_id: &str) -> Result<AttemptRecord>;

    /// Ask the store to mark the attempt as needing human review.
    async fn flag_for_review(&self, attempt_id: &str) -> Result<()>;
}

/// In-memory attempt directory for single-node deployments and tests.
#[derive(Debug, Default)]
pub struct InMemoryAttemptDirectory {
    attempts: Mutex<HashMap<String, AttemptRecord>>,
    flagged: Mutex<Vec<String>>,
}

impl InMemoryAttemptDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attempt.
    pub fn insert(&self, record: AttemptRecord) {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.attempt_id.clone(), record);
    }

    /// Attempt ids flagged for review, in flag order.
    #[must_use]
    pub fn flagged(&self) -> Vec<String> {
        self.flagged.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl AttemptDirectory for InMemoryAttemptDirectory {
    async fn find_attempt(&self, attempt_id: &str) -> Result<AttemptRecord> {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(attempt_id)
            .cloned()
            .ok_or_else(|| Error::from(SessionError::AttemptNotFound(attempt_id.to_string())))
    }

    async fn flag_for_review(&self, attempt_id: &str) -> Result<()> {
        let known = self
            .attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(attempt_id);
        if !known {
            return Err(SessionError::AttemptNotFound(attempt_id.to_string()).into());
        }
        self.flagged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(attempt_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(attempt_id: &str, user_id: &str) -> AttemptRecord {
        AttemptRecord {
            attempt_id: attempt_id.to_string(),
            user_id: user_id.to_string(),
            assessment_id: "assessment-1".to_string(),
            anti_cheat: AntiCheatOverrides::default(),
        }
    }

    #[tokio::test]
    async fn find_resolves_registered_attempt() {
        let directory = InMemoryAttemptDirectory::new();
        directory.insert(record("a1", "u1"));

        let found = directory.find_attempt("a1").await.unwrap();
        assert_eq!(found.user_id, "u1");
    }

    #[tokio::test]
    async fn find_unknown_attempt_is_not_found() {
        let directory = InMemoryAttemptDirectory::new();
        let err = directory.find_attempt("missing").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn flagging_records_in_order() {
        let directory = InMemoryAttemptDirectory::new();
        directory.insert(record("a1", "u1"));
        directory.insert(record("a2", "u2"));

        directory.flag_for_review("a2").await.unwrap();
        directory.flag_for_review("a1").await.unwrap();
        assert_eq!(directory.flagged(), vec!["a2", "a1"]);
    }

    #[tokio::test]
    async fn flagging_unknown_attempt_fails() {
        let directory = InMemoryAttemptDirectory::new();
        assert!(directory.flag_for_review("missing").await.is_err());
    }
}
