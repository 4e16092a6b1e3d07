//! Template store: durable mapping from identity to encrypted records.
//!
//! Uses redb for embedded key-value storage with ACID transactions. No
//! operation here performs cryptography; encryption happens at the
//! boundary before records reach this layer, so the store can be backed
//! by any engine without re-auditing crypto logic.

pub mod redb;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedRecord;

pub use self::redb::Storage;

/// One enrolled subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Surrogate key assigned once from a persisted counter. Ascending in
    /// creation order, which the engine relies on for tie-breaking.
    pub id: u64,
    /// Unique across all identities, case-sensitive, immutable.
    pub username: String,
    /// Encrypted templates in insertion order. Never empty past creation.
    pub records: Vec<EncryptedRecord>,
    pub created_at: DateTime<Utc>,
    /// Advances on record-set mutation only.
    pub updated_at: DateTime<Utc>,
}
