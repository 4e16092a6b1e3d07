//! ReDB storage implementation for the template store.
//!
//! Provides persistent storage for:
//! - enrolled identities and their encrypted templates
//! - the append-only audit log of failed verification attempts
//!
//! Identity values are JSON serialized. The identity id counter lives in
//! a meta table and is advanced inside the same write transaction that
//! creates the identity, so creation is atomic and ids follow creation
//! order.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::audit::AuditEntry;
use crate::error::{CoreError, CoreResult};
use crate::store::Identity;

// Table definitions
const IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("identities");
const AUDIT_LOG: TableDefinition<u64, &[u8]> = TableDefinition::new("audit_log");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const IDENTITY_ID_COUNTER: &str = "identity_id_counter";

/// Storage wrapper for ReDB.
///
/// Thread-safe via internal Arc. Clone is cheap. Write transactions are
/// serialized by redb, which makes create/delete on the same username
/// mutually exclusive and every audit append atomic.
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl Storage {
    /// Open or create a database at the given path.
    ///
    /// Creates parent directories if they don't exist.
    pub fn open(path: &Path) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path).map_err(|e| CoreError::Storage(e.to_string()))?;
        Self::init_tables(&db)?;

        tracing::info!(path = %path.display(), "Opened storage database");

        Ok(Self { db: Arc::new(db) })
    }

    /// Open an in-memory database for testing.
    #[cfg(test)]
    pub fn open_memory() -> CoreResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        Self::init_tables(&db)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn init_tables(db: &Database) -> CoreResult<()> {
        let write_txn = db.begin_write()?;
        {
            // Just opening the tables creates them if they don't exist
            let _ = write_txn.open_table(IDENTITIES)?;
            let _ = write_txn.open_table(AUDIT_LOG)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Identities
    // =========================================================================

    /// Create a new identity with its encrypted records.
    ///
    /// Returns the assigned id. The uniqueness check, counter increment,
    /// and insert run in one write transaction: either the identity and
    /// all its records become visible together, or nothing does.
    pub fn create_identity(
        &self,
        username: &str,
        records: Vec<crate::crypto::EncryptedRecord>,
    ) -> CoreResult<u64> {
        if username.trim().is_empty() {
            return Err(CoreError::InvalidInput("username must not be empty".to_string()));
        }
        if records.is_empty() {
            return Err(CoreError::InvalidInput(
                "enrollment requires at least one record".to_string(),
            ));
        }

        let write_txn = self.db.begin_write()?;
        let id = {
            let mut identities = write_txn.open_table(IDENTITIES)?;
            if identities.get(username)?.is_some() {
                // Dropping the uncommitted transaction aborts it
                return Err(CoreError::AlreadyExists(username.to_string()));
            }

            let mut meta = write_txn.open_table(META)?;
            let id = meta
                .get(IDENTITY_ID_COUNTER)?
                .map_or(0, |v| v.value())
                + 1;
            meta.insert(IDENTITY_ID_COUNTER, id)?;

            let now = chrono::Utc::now();
            let identity = Identity {
                id,
                username: username.to_string(),
                records,
                created_at: now,
                updated_at: now,
            };
            let value = serde_json::to_vec(&identity)?;
            identities.insert(username, value.as_slice())?;
            id
        };
        write_txn.commit()?;

        tracing::debug!(username, id, "Created identity");
        Ok(id)
    }

    /// Get an identity by username.
    pub fn get_identity(&self, username: &str) -> CoreResult<Option<Identity>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(IDENTITIES)?;

        match table.get(username)? {
            Some(value) => {
                let identity: Identity = serde_json::from_slice(value.value())?;
                Ok(Some(identity))
            }
            None => Ok(None),
        }
    }

    /// List all identities.
    ///
    /// Iteration order is username key order; callers needing creation
    /// order must sort by `id`.
    pub fn list_identities(&self) -> CoreResult<Vec<Identity>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(IDENTITIES)?;

        let identities: Result<Vec<Identity>, CoreError> = table
            .iter()?
            .map(|entry| {
                let (_, value) = entry?;
                let identity: Identity = serde_json::from_slice(value.value())?;
                Ok(identity)
            })
            .collect();

        identities
    }

    /// Delete an identity. Immediate and total; no soft-delete.
    ///
    /// Returns true if the identity existed.
    pub fn delete_identity(&self, username: &str) -> CoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(IDENTITIES)?;
            table.remove(username)?.is_some()
        };
        write_txn.commit()?;

        if deleted {
            tracing::debug!(username, "Deleted identity");
        }
        Ok(deleted)
    }

    // =========================================================================
    // Audit Log
    // =========================================================================

    /// Append an entry to the audit log.
    ///
    /// The sequence number is assigned inside the write transaction, so
    /// concurrent appends never lose or interleave entries. Returns the
    /// assigned sequence number.
    pub fn append_audit_entry(&self, entry: &AuditEntry) -> CoreResult<u64> {
        let write_txn = self.db.begin_write()?;
        let seq = {
            let mut table = write_txn.open_table(AUDIT_LOG)?;

            let seq = table
                .iter()?
                .last()
                .transpose()?
                .map_or(1, |(k, _)| k.value() + 1);

            let stored = AuditEntry {
                seq,
                ..entry.clone()
            };
            let value = serde_json::to_vec(&stored)?;
            table.insert(seq, value.as_slice())?;
            seq
        };
        write_txn.commit()?;

        tracing::trace!(seq, "Appended audit entry");
        Ok(seq)
    }

    /// Get a single audit entry by sequence number.
    pub fn get_audit_entry(&self, seq: u64) -> CoreResult<Option<AuditEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_LOG)?;

        match table.get(seq)? {
            Some(value) => {
                let entry: AuditEntry = serde_json::from_slice(value.value())?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Get the latest audit sequence number.
    pub fn latest_audit_seq(&self) -> CoreResult<Option<u64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_LOG)?;

        let latest = table.iter()?.last().transpose()?.map(|(k, _)| k.value());

        Ok(latest)
    }

    /// Get the most recent audit entries, newest first.
    pub fn list_recent_audit(&self, limit: usize) -> CoreResult<Vec<AuditEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_LOG)?;

        let entries: Result<Vec<AuditEntry>, CoreError> = table
            .iter()?
            .rev()
            .take(limit)
            .map(|entry| {
                let (_, value) = entry?;
                let parsed: AuditEntry = serde_json::from_slice(value.value())?;
                Ok(parsed)
            })
            .collect();

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EncryptedRecord;

    fn dummy_record(pose_index: u32) -> EncryptedRecord {
        EncryptedRecord {
            nonce: vec![0u8; 12],
            ciphertext: vec![0u8; 48],
            integrity_mac: vec![0u8; 32],
            pose_index,
        }
    }

    #[test]
    fn test_identity_crud() -> CoreResult<()> {
        let storage = Storage::open_memory()?;

        let id = storage.create_identity("alice", vec![dummy_record(0)])?;
        assert_eq!(id, 1);

        let identity = storage.get_identity("alice")?.unwrap();
        assert_eq!(identity.id, 1);
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.records.len(), 1);

        assert!(storage.delete_identity("alice")?);
        assert!(storage.get_identity("alice")?.is_none());
        assert!(!storage.delete_identity("alice")?);

        Ok(())
    }

    #[test]
    fn test_duplicate_username_rejected() -> CoreResult<()> {
        let storage = Storage::open_memory()?;

        storage.create_identity("alice", vec![dummy_record(0)])?;
        let err = storage
            .create_identity("alice", vec![dummy_record(1)])
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists(_)));

        // Original records untouched
        let identity = storage.get_identity("alice")?.unwrap();
        assert_eq!(identity.records[0].pose_index, 0);

        Ok(())
    }

    #[test]
    fn test_empty_record_set_rejected() {
        let storage = Storage::open_memory().unwrap();
        let err = storage.create_identity("alice", vec![]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert!(storage.get_identity("alice").unwrap().is_none());
    }

    #[test]
    fn test_ids_follow_creation_order() -> CoreResult<()> {
        let storage = Storage::open_memory()?;

        assert_eq!(storage.create_identity("zed", vec![dummy_record(0)])?, 1);
        assert_eq!(storage.create_identity("alice", vec![dummy_record(0)])?, 2);
        assert_eq!(storage.create_identity("mia", vec![dummy_record(0)])?, 3);

        // Key order is lexicographic; id order is creation order
        let mut identities = storage.list_identities()?;
        assert_eq!(identities[0].username, "alice");
        identities.sort_by_key(|i| i.id);
        assert_eq!(identities[0].username, "zed");

        Ok(())
    }

    #[test]
    fn test_id_counter_survives_deletion() -> CoreResult<()> {
        let storage = Storage::open_memory()?;

        storage.create_identity("alice", vec![dummy_record(0)])?;
        storage.delete_identity("alice")?;
        // Surrogate keys are never reused
        assert_eq!(storage.create_identity("bob", vec![dummy_record(0)])?, 2);

        Ok(())
    }
}
