// Crate-level lint configuration
// Allow noisy pedantic/cargo lints that aren't worth fixing individually
#![allow(clippy::multiple_crate_versions)] // Transitive deps, can't easily fix
#![allow(clippy::missing_errors_doc)] // Would require extensive doc changes
#![allow(clippy::must_use_candidate)] // Too many false positives for internal APIs
#![allow(clippy::module_name_repetitions)] // Acceptable for clarity (e.g., CoreError in error mod)
#![allow(clippy::doc_markdown)] // Too strict about backticks in docs

//! FaceSecure Core
//!
//! Encrypted biometric-template store and verification engine. Protects
//! face-embedding vectors at rest with AES-256-GCM plus an independent
//! HMAC-SHA256 integrity layer, and answers "does this query vector match
//! an enrolled identity above a similarity threshold?" with auditable
//! failure logging.
//!
//! ## Architecture
//!
//! - [`crypto::AeadCodec`]: authenticated encryption of a single embedding
//!   vector. Two independent 32-byte keys: one for the AEAD, one for an
//!   outer HMAC over `nonce || ciphertext` verified before any decryption.
//!
//! - [`store::Storage`]: redb-backed mapping from username to an enrolled
//!   [`store::Identity`] and its encrypted records. Performs no
//!   cryptography, so it can be swapped without re-auditing crypto logic.
//!
//! - [`engine::VerificationEngine`]: decrypts candidate templates, scores
//!   them by cosine similarity, applies the threshold policy, and appends
//!   an audit entry on every non-success outcome.
//!
//! - [`audit::AuditLog`]: append-only record of failed verification
//!   attempts, consumed by operational tooling.
//!
//! ## Security Model
//!
//! - **Defense in depth**: a record must pass the constant-time HMAC check
//!   before the AEAD cipher is ever invoked; both layers fail closed as
//!   [`error::CoreError::IntegrityViolation`].
//! - **No silent downgrade**: missing or malformed key material is a fatal
//!   [`error::CoreError::KeyConfiguration`] at startup, never a fallback.
//! - **Fault isolation**: one corrupted record is skipped with a warning
//!   and never denies verification to the rest of the population.
//!
//! Callers supply pre-normalized float32 embedding vectors; face
//! detection and embedding inference live outside this crate.

pub mod audit;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use audit::{AuditEntry, AuditLog, FailureReason};
pub use config::Settings;
pub use crypto::{AeadCodec, EncryptedRecord, KeyPair};
pub use engine::{VerificationEngine, VerificationOutcome};
pub use error::{CoreError, CoreResult};
pub use store::{Identity, Storage};
