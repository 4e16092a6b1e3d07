//! Error types for the verification core.
//!
//! All failures surface as typed [`CoreError`] variants, never as generic
//! panics. Integrity failures are fail-closed: the two integrity layers
//! (outer HMAC, AEAD tag) are reported identically to callers so a
//! response never reveals which layer rejected a record.

use thiserror::Error;

/// Core error type with a stable code per variant for upstream
/// structured responses.
#[derive(Error, Debug)]
pub enum CoreError {
    // Crypto/integrity errors
    #[error("Integrity violation: record failed authentication")]
    IntegrityViolation,

    #[error("Dimension mismatch: expected {expected} floats, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Key configuration error: {0}")]
    KeyConfiguration(String),

    // Enrollment/lookup errors
    #[error("Identity already exists: {0}")]
    AlreadyExists(String),

    #[error("Identity not found: {0}")]
    NotFound(String),

    #[error("No enrolled identities")]
    NoEnrolledIdentities,

    // Input validation errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl CoreError {
    /// Stable error code for structured responses at the API layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IntegrityViolation => "INTEGRITY_VIOLATION",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::KeyConfiguration(_) => "KEY_CONFIGURATION_ERROR",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::NoEnrolledIdentities => "NO_ENROLLED_IDENTITIES",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Deserialization(_) => "DESERIALIZATION_ERROR",
        }
    }
}

// Conversion from common error types

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Self::Deserialization(err.to_string())
        } else {
            Self::Serialization(err.to_string())
        }
    }
}

impl From<redb::Error> for CoreError {
    fn from(err: redb::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::DatabaseError> for CoreError {
    fn from(err: redb::DatabaseError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::TableError> for CoreError {
    fn from(err: redb::TableError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::TransactionError> for CoreError {
    fn from(err: redb::TransactionError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::CommitError> for CoreError {
    fn from(err: redb::CommitError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::StorageError> for CoreError {
    fn from(err: redb::StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
