//! AEAD codec for embedding vectors.
//!
//! Wire layout of a protected template:
//! - `nonce`: 12 random bytes, fresh per encryption
//! - `ciphertext`: AES-256-GCM output, 16-byte tag appended
//! - `integrity_mac`: HMAC-SHA256 over `nonce || ciphertext` under the
//!   second key
//!
//! The outer MAC is verified in constant time before the cipher runs,
//! which rejects corrupted records on the fast path when scanning many
//! candidates. Vectors use a canonical little-endian f32 byte layout, so
//! a round trip is bit-identical.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::crypto::keys::KeyPair;
use crate::error::{CoreError, CoreResult};

type HmacSha256 = Hmac<Sha256>;

/// AES-GCM nonce size.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag size.
pub const TAG_LEN: usize = 16;

/// HMAC-SHA256 output size.
pub const MAC_LEN: usize = 32;

/// One protected embedding as stored.
///
/// Byte fields serialize as base64 strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedRecord {
    /// Fresh random nonce, never reused under a given key.
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    /// AEAD output, tag appended.
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    /// HMAC-SHA256 over `nonce || ciphertext` under the second key.
    #[serde(with = "b64")]
    pub integrity_mac: Vec<u8>,
    /// Ordinal of the capture slot this template came from. Informational.
    pub pose_index: u32,
}

impl EncryptedRecord {
    /// Validate field lengths at the deserialization boundary.
    ///
    /// This is a shape check only; it proves nothing about authenticity.
    pub fn validate_shape(&self) -> CoreResult<()> {
        if self.nonce.len() != NONCE_LEN {
            return Err(CoreError::Deserialization(format!(
                "record nonce must be {NONCE_LEN} bytes, got {}",
                self.nonce.len()
            )));
        }
        if self.integrity_mac.len() != MAC_LEN {
            return Err(CoreError::Deserialization(format!(
                "record MAC must be {MAC_LEN} bytes, got {}",
                self.integrity_mac.len()
            )));
        }
        if self.ciphertext.len() < TAG_LEN {
            return Err(CoreError::Deserialization(format!(
                "record ciphertext shorter than one AEAD tag ({} bytes)",
                self.ciphertext.len()
            )));
        }
        Ok(())
    }
}

/// Authenticated encryption/decryption of fixed-dimension f32 vectors.
///
/// Constructed once at startup from externally supplied key material and
/// passed by reference into request handlers.
pub struct AeadCodec {
    cipher: Aes256Gcm,
    mac_key: [u8; 32],
    dim: usize,
}

impl AeadCodec {
    /// Build a codec for vectors of `dim` floats.
    pub fn new(keys: &KeyPair, dim: usize) -> CoreResult<Self> {
        if dim == 0 {
            return Err(CoreError::InvalidInput(
                "embedding dimension must be non-zero".to_string(),
            ));
        }
        let cipher = Aes256Gcm::new_from_slice(keys.aead_key())
            .map_err(|e| CoreError::KeyConfiguration(format!("AEAD key rejected: {e}")))?;
        Ok(Self {
            cipher,
            mac_key: *keys.mac_key(),
            dim,
        })
    }

    /// Configured embedding dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Encrypt one embedding vector.
    ///
    /// A vector of the wrong dimension is rejected before the cipher is
    /// touched. The nonce comes from the OS CSPRNG on every call; there
    /// is no counter or caller-supplied path that could repeat one.
    pub fn encrypt(&self, vector: &[f32], pose_index: u32) -> CoreResult<EncryptedRecord> {
        if vector.len() != self.dim {
            return Err(CoreError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }

        let plaintext = vector_to_bytes(vector);

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| CoreError::IntegrityViolation)?;

        let integrity_mac = self.compute_mac(&nonce, &ciphertext)?;

        Ok(EncryptedRecord {
            nonce: nonce.to_vec(),
            ciphertext,
            integrity_mac,
            pose_index,
        })
    }

    /// Decrypt one record back to its embedding vector.
    ///
    /// Fail-closed ordering: shape check, constant-time outer MAC verify,
    /// AEAD decrypt, payload length check. Both integrity layers report
    /// the same [`CoreError::IntegrityViolation`]; only logs distinguish
    /// them.
    pub fn decrypt(&self, record: &EncryptedRecord) -> CoreResult<Vec<f32>> {
        record.validate_shape()?;

        // Qualified call: KeyInit is also in scope and provides new_from_slice
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.mac_key)
            .map_err(|e| CoreError::KeyConfiguration(format!("MAC key rejected: {e}")))?;
        mac.update(&record.nonce);
        mac.update(&record.ciphertext);
        // verify_slice compares in constant time
        if mac.verify_slice(&record.integrity_mac).is_err() {
            tracing::debug!(pose_index = record.pose_index, "Outer MAC mismatch");
            return Err(CoreError::IntegrityViolation);
        }

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&record.nonce), record.ciphertext.as_slice())
            .map_err(|_| {
                tracing::debug!(pose_index = record.pose_index, "AEAD tag mismatch");
                CoreError::IntegrityViolation
            })?;

        if plaintext.len() != self.dim * 4 {
            return Err(CoreError::DimensionMismatch {
                expected: self.dim,
                actual: plaintext.len() / 4,
            });
        }

        Ok(bytes_to_vector(&plaintext))
    }

    fn compute_mac(&self, nonce: &[u8], ciphertext: &[u8]) -> CoreResult<Vec<u8>> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.mac_key)
            .map_err(|e| CoreError::KeyConfiguration(format!("MAC key rejected: {e}")))?;
        mac.update(nonce);
        mac.update(ciphertext);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Canonical little-endian f32 layout.
fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Base64 (de)serialization for byte fields.
mod b64 {
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}
