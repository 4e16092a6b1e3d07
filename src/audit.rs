//! Append-only audit log of failed verification attempts.
//!
//! Every rejected verification, and every verification where no candidate
//! could be scored at all, produces exactly one entry. Entries are
//! immutable once appended and never deleted by this core; retention and
//! rotation belong to operational tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::store::Storage;

/// Why a verification attempt failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Best similarity across the candidate set was below the threshold.
    BelowThreshold,
    /// No candidate could be scored: every record failed its integrity
    /// check. Distinct from an honest near-miss so operators can tell
    /// tampering apart from a below-threshold match.
    IntegrityViolation,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BelowThreshold => write!(f, "below_threshold"),
            Self::IntegrityViolation => write!(f, "integrity_violation"),
        }
    }
}

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Sequence number, assigned by the store at append time.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    /// Target username of a 1:1 attempt; absent for 1:N attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_username: Option<String>,
    /// Username of the best-scoring identity, if any record was scorable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_best_username: Option<String>,
    pub similarity_score: f32,
    pub reason: FailureReason,
    pub source_address: String,
}

/// Audit log backed by the shared store.
///
/// Appends are atomic: the store assigns the sequence number inside the
/// write transaction, so concurrent appends never lose entries.
#[derive(Clone)]
pub struct AuditLog {
    storage: Storage,
}

impl AuditLog {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Append a new entry. Returns its sequence number.
    pub fn append(
        &self,
        claimed_username: Option<String>,
        observed_best_username: Option<String>,
        similarity_score: f32,
        reason: FailureReason,
        source_address: &str,
    ) -> CoreResult<u64> {
        let entry = AuditEntry {
            seq: 0, // assigned by the store
            timestamp: Utc::now(),
            claimed_username,
            observed_best_username,
            similarity_score,
            reason,
            source_address: source_address.to_string(),
        };

        let seq = self.storage.append_audit_entry(&entry)?;

        tracing::debug!(
            seq,
            reason = %reason,
            similarity = similarity_score,
            "Audit entry appended"
        );

        Ok(seq)
    }

    /// Get an audit entry by sequence number.
    pub fn entry(&self, seq: u64) -> CoreResult<Option<AuditEntry>> {
        self.storage.get_audit_entry(seq)
    }

    /// Get the most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> CoreResult<Vec<AuditEntry>> {
        self.storage.list_recent_audit(limit)
    }

    /// Latest assigned sequence number, if any entry exists.
    pub fn latest_seq(&self) -> CoreResult<Option<u64>> {
        self.storage.latest_audit_seq()
    }
}
