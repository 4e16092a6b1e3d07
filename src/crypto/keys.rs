//! Key material handling.
//!
//! The codec takes two independent 32-byte secrets: one for the AEAD,
//! one for the outer integrity MAC. Both arrive base64-encoded from the
//! provisioning environment and are wiped from memory on drop.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::{RngCore, rngs::OsRng};
use zeroize::ZeroizeOnDrop;

use crate::error::{CoreError, CoreResult};

/// Required length for both secrets, in bytes.
pub const KEY_LEN: usize = 32;

/// The two independent secrets protecting stored templates.
///
/// Wiped on drop. Construct once at startup and pass by reference into
/// [`crate::crypto::AeadCodec::new`].
#[derive(ZeroizeOnDrop)]
pub struct KeyPair {
    aead_key: [u8; KEY_LEN],
    mac_key: [u8; KEY_LEN],
}

impl KeyPair {
    /// Build a key pair from raw 32-byte secrets.
    pub fn new(aead_key: [u8; KEY_LEN], mac_key: [u8; KEY_LEN]) -> Self {
        Self { aead_key, mac_key }
    }

    /// Decode a key pair from the base64 forms used by provisioning.
    ///
    /// Anything other than two well-formed 32-byte secrets is a fatal
    /// [`CoreError::KeyConfiguration`]; there is no fallback.
    pub fn from_base64(aead_key_b64: &str, mac_key_b64: &str) -> CoreResult<Self> {
        let aead_key = decode_key(aead_key_b64, "AEAD key")?;
        let mac_key = decode_key(mac_key_b64, "MAC key")?;
        Ok(Self { aead_key, mac_key })
    }

    pub fn aead_key(&self) -> &[u8; KEY_LEN] {
        &self.aead_key
    }

    pub fn mac_key(&self) -> &[u8; KEY_LEN] {
        &self.mac_key
    }
}

fn decode_key(encoded: &str, label: &str) -> CoreResult<[u8; KEY_LEN]> {
    let trimmed = encoded.trim();
    if trimmed.is_empty() {
        return Err(CoreError::KeyConfiguration(format!("{label} is not set")));
    }

    let bytes = BASE64
        .decode(trimmed)
        .map_err(|e| CoreError::KeyConfiguration(format!("{label} is not valid base64: {e}")))?;

    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        CoreError::KeyConfiguration(format!("{label} must be {KEY_LEN} bytes, got {len}"))
    })
}

/// Generate a fresh AEAD/MAC key pair for provisioning.
///
/// Pure utility with no side effects beyond drawing from the OS CSPRNG.
/// Returns `(aead_key_b64, mac_key_b64)`.
pub fn generate_key_pair() -> (String, String) {
    let mut aead_key = [0u8; KEY_LEN];
    let mut mac_key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut aead_key);
    OsRng.fill_bytes(&mut mac_key);
    (BASE64.encode(aead_key), BASE64.encode(mac_key))
}
