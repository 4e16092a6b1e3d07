//! Cryptography for templates at rest.
//!
//! Two layers protect every stored embedding:
//! - AES-256-GCM authenticated encryption (nonce, ciphertext, tag)
//! - an outer HMAC-SHA256 over `nonce || ciphertext` under a second,
//!   independent key, verified in constant time before the cipher is
//!   ever invoked
//!
//! Keys are supplied externally at process start; this module never
//! persists or transmits long-term key material.

pub mod codec;
pub mod keys;

pub use self::codec::{AeadCodec, EncryptedRecord};
pub use self::keys::{KeyPair, generate_key_pair};
