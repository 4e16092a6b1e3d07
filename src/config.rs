//! Service configuration derived from environment variables.
//!
//! Configuration is loaded once at startup and validated before anything
//! touches the store. Key material that is missing or malformed is a
//! fatal [`CoreError::KeyConfiguration`]; the process must not start
//! with a degraded crypto configuration.
//!
//! ## Environment Variables
//!
//! - `FS_AES_KEY_B64`: base64 AES-256-GCM key, exactly 32 bytes (required)
//! - `FS_HMAC_KEY_B64`: base64 HMAC-SHA256 key, exactly 32 bytes (required)
//! - `FS_THRESHOLD`: similarity decision threshold (default: 0.70)
//! - `FS_DB_PATH`: path to the ReDB database file
//!   (default: `./.data/facesecure.redb`)
//! - `FS_EMBEDDING_DIM`: embedding vector dimension (default: 512)
//! - `RUST_LOG`: log level filter

use std::env;
use std::path::PathBuf;

use crate::crypto::{KeyPair, generate_key_pair};
use crate::error::{CoreError, CoreResult};

const DEFAULT_THRESHOLD: f32 = 0.70;
const DEFAULT_EMBEDDING_DIM: usize = 512;
const DEFAULT_DB_PATH: &str = "./.data/facesecure.redb";

/// Helper to get trimmed env var or empty string.
fn env_trim(name: &str) -> String {
    env::var(name).unwrap_or_default().trim().to_string()
}

/// Unset means the default; a set-but-unparsable value must not be
/// silently replaced, so it becomes NaN and fails `validate()`.
fn parse_threshold(raw: &str) -> f32 {
    if raw.is_empty() {
        DEFAULT_THRESHOLD
    } else {
        raw.parse::<f32>().unwrap_or(f32::NAN)
    }
}

/// Unset means the default; garbage becomes 0 and fails `validate()`.
fn parse_embedding_dim(raw: &str) -> usize {
    if raw.is_empty() {
        DEFAULT_EMBEDDING_DIM
    } else {
        raw.parse::<usize>().unwrap_or(0)
    }
}

/// `PathBuf` parsing is infallible, so the empty/unset case needs an
/// explicit branch for the default to apply.
fn parse_db_path(raw: String) -> PathBuf {
    if raw.is_empty() {
        PathBuf::from(DEFAULT_DB_PATH)
    } else {
        PathBuf::from(raw)
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    aes_key_b64: String,
    hmac_key_b64: String,
    threshold: f32,
    db_path: PathBuf,
    embedding_dim: usize,
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// Call [`Settings::validate`] before using the result; loading never
    /// fails but a missing key or unparsable value must stop the process
    /// there.
    pub fn from_env() -> Self {
        Self {
            aes_key_b64: env_trim("FS_AES_KEY_B64"),
            hmac_key_b64: env_trim("FS_HMAC_KEY_B64"),
            threshold: parse_threshold(&env_trim("FS_THRESHOLD")),
            db_path: parse_db_path(env_trim("FS_DB_PATH")),
            embedding_dim: parse_embedding_dim(&env_trim("FS_EMBEDDING_DIM")),
        }
    }

    /// Create settings with fresh random keys for tests.
    pub fn for_tests(db_path: PathBuf) -> Self {
        let (aes_key_b64, hmac_key_b64) = generate_key_pair();
        Self {
            aes_key_b64,
            hmac_key_b64,
            threshold: DEFAULT_THRESHOLD,
            db_path,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }

    /// Validate the configuration.
    ///
    /// Checks key material shape and parameter ranges. Must pass before
    /// the service starts; a failure here is startup-fatal.
    pub fn validate(&self) -> CoreResult<()> {
        // Decode proves presence, base64 validity, and 32-byte length
        let _ = self.key_pair()?;

        // NaN fails both comparisons, so an unparsable FS_THRESHOLD lands here
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(CoreError::InvalidInput(format!(
                "FS_THRESHOLD must be a number in (0, 1], got {}",
                self.threshold
            )));
        }
        if self.embedding_dim == 0 {
            return Err(CoreError::InvalidInput(
                "FS_EMBEDDING_DIM must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Decode the two 32-byte secrets.
    pub fn key_pair(&self) -> CoreResult<KeyPair> {
        KeyPair::from_base64(&self.aes_key_b64, &self.hmac_key_b64)
    }

    // Getters

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }
}
