//! Verification engine: decides whether a query vector matches an
//! enrolled identity.
//!
//! Each call is independent; the engine holds no mutable state. Scoring
//! is a deliberate linear scan over every candidate record, ordered by
//! identity creation order then record insertion order, which makes
//! tie-breaking deterministic: on a strict tie the earliest-encountered
//! candidate wins.

use serde::Serialize;

use crate::audit::{AuditLog, FailureReason};
use crate::crypto::AeadCodec;
use crate::error::{CoreError, CoreResult};
use crate::store::{Identity, Storage};

/// Result of one verification call.
///
/// The configured threshold is echoed back so callers can show "how
/// close" even on failure.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_username: Option<String>,
    pub similarity: f32,
    pub threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    /// Candidate records skipped because they failed decryption. A
    /// corrupted record never denies service to other identities, but
    /// the caller can observe that it happened.
    pub skipped_records: u32,
}

/// Matching engine over the encrypted template store.
///
/// Construct once at process start with its collaborators and pass
/// references into request handlers; there is no global instance.
pub struct VerificationEngine {
    codec: AeadCodec,
    storage: Storage,
    audit: AuditLog,
    threshold: f32,
}

impl VerificationEngine {
    pub fn new(codec: AeadCodec, storage: Storage, audit: AuditLog, threshold: f32) -> Self {
        Self {
            codec,
            storage,
            audit,
            threshold,
        }
    }

    /// Configured decision threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Enroll a new identity from plaintext embedding vectors.
    ///
    /// Every vector is encrypted before anything reaches the store, with
    /// `pose_index` set to the vector's ordinal. Creation is atomic:
    /// a failure leaves no partial identity visible.
    pub fn enroll(&self, username: &str, vectors: &[Vec<f32>]) -> CoreResult<u64> {
        if vectors.is_empty() {
            return Err(CoreError::InvalidInput(
                "enrollment requires at least one vector".to_string(),
            ));
        }

        let mut records = Vec::with_capacity(vectors.len());
        for (idx, vector) in vectors.iter().enumerate() {
            records.push(self.codec.encrypt(vector, idx as u32)?);
        }

        let id = self.storage.create_identity(username, records)?;
        tracing::info!(username, id, templates = vectors.len(), "Enrolled identity");
        Ok(id)
    }

    /// Verify a query vector against one claimed identity (1:1) or the
    /// whole population (1:N).
    ///
    /// An unknown claimed username is a terminal [`CoreError::NotFound`]
    /// and an empty store is [`CoreError::NoEnrolledIdentities`]; neither
    /// is audited, since no comparison occurred. Every rejected outcome
    /// appends exactly one audit entry.
    pub fn verify(
        &self,
        query: &[f32],
        claimed_username: Option<&str>,
        source_address: &str,
    ) -> CoreResult<VerificationOutcome> {
        if query.len() != self.codec.dim() {
            return Err(CoreError::DimensionMismatch {
                expected: self.codec.dim(),
                actual: query.len(),
            });
        }

        let candidates = self.select_candidates(claimed_username)?;

        let mut best: Option<(&str, f32)> = None;
        let mut scored: u32 = 0;
        let mut skipped: u32 = 0;

        for identity in &candidates {
            for record in &identity.records {
                let stored = match self.codec.decrypt(record) {
                    Ok(vector) => vector,
                    Err(err) => {
                        tracing::warn!(
                            username = %identity.username,
                            pose_index = record.pose_index,
                            error = %err,
                            "Skipping unreadable template record"
                        );
                        skipped += 1;
                        continue;
                    }
                };

                scored += 1;
                let similarity = mapped_cosine(query, &stored);
                // Strict comparison keeps the earliest candidate on ties
                if best.is_none_or(|(_, best_score)| similarity > best_score) {
                    best = Some((identity.username.as_str(), similarity));
                }
            }
        }

        let outcome = match best {
            None => {
                // Candidates existed but none was scorable: tampering or
                // corruption, reported distinctly from a near-miss.
                let outcome = VerificationOutcome {
                    verified: false,
                    matched_username: None,
                    similarity: 0.0,
                    threshold: self.threshold,
                    reason: Some(FailureReason::IntegrityViolation),
                    skipped_records: skipped,
                };
                self.audit.append(
                    claimed_username.map(String::from),
                    None,
                    0.0,
                    FailureReason::IntegrityViolation,
                    source_address,
                )?;
                outcome
            }
            Some((username, similarity)) if similarity >= self.threshold => {
                tracing::debug!(
                    username,
                    similarity,
                    scored,
                    "Verification accepted"
                );
                VerificationOutcome {
                    verified: true,
                    matched_username: Some(username.to_string()),
                    similarity,
                    threshold: self.threshold,
                    reason: None,
                    skipped_records: skipped,
                }
            }
            Some((username, similarity)) => {
                tracing::debug!(
                    best_username = username,
                    similarity,
                    threshold = self.threshold,
                    "Verification rejected"
                );
                self.audit.append(
                    claimed_username.map(String::from),
                    Some(username.to_string()),
                    similarity,
                    FailureReason::BelowThreshold,
                    source_address,
                )?;
                VerificationOutcome {
                    verified: false,
                    matched_username: None,
                    similarity,
                    threshold: self.threshold,
                    reason: Some(FailureReason::BelowThreshold),
                    skipped_records: skipped,
                }
            }
        };

        Ok(outcome)
    }

    /// List enrolled identities in creation order.
    pub fn list_identities(&self) -> CoreResult<Vec<Identity>> {
        let mut identities = self.storage.list_identities()?;
        identities.sort_by_key(|identity| identity.id);
        Ok(identities)
    }

    /// Remove an identity. Returns true if it existed.
    pub fn remove_identity(&self, username: &str) -> CoreResult<bool> {
        self.storage.delete_identity(username)
    }

    fn select_candidates(&self, claimed_username: Option<&str>) -> CoreResult<Vec<Identity>> {
        match claimed_username {
            Some(username) => {
                let identity = self
                    .storage
                    .get_identity(username)?
                    .ok_or_else(|| CoreError::NotFound(username.to_string()))?;
                Ok(vec![identity])
            }
            None => {
                let mut identities = self.storage.list_identities()?;
                if identities.is_empty() {
                    return Err(CoreError::NoEnrolledIdentities);
                }
                identities.sort_by_key(|identity| identity.id);
                Ok(identities)
            }
        }
    }
}

/// Cosine similarity mapped from [-1, 1] into [0, 1].
///
/// Assumes both vectors are pre-normalized by the embedding producer, so
/// the dot product is the cosine. The clamp only guards float drift at
/// the interval ends.
fn mapped_cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    ((dot + 1.0) / 2.0).clamp(0.0, 1.0)
}
