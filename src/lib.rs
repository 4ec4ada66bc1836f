//! Field-level encryption for JSON payloads.
//!
//! This crate encrypts selected parts of a JSON payload before it leaves the
//! process and decrypts them on the way back in, leaving the rest of the
//! document untouched. Two wire formats are supported:
//!
//! * **JWE** — RFC 7516 compact serialization with RSA-OAEP key wrapping and
//!   AES-GCM or AES-CBC-HMAC content encryption, driven by a [`JweConfig`].
//! * **Legacy field format** — raw AES-128-CBC ciphertext in an
//!   `encryptedValue` field with the IV, wrapped key and fingerprints as
//!   sibling fields or out-of-band values, driven by a
//!   [`FieldLevelEncryptionConfig`].
//!
//! Paths are selected with a definite JSON-path dialect (`$.path.to.object`).
//! A typical whole-payload JWE setup:
//!
//! ```no_run
//! use client_encryption::{EncryptionCertificate, EncryptionConfig, JweConfig};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let public_key: rsa::RsaPublicKey = unimplemented!();
//! let config = EncryptionConfig::Jwe(
//!     JweConfig::builder()
//!         .with_encryption_certificate(EncryptionCertificate::from_public_key(public_key))
//!         .build()?,
//! );
//! let encrypted = config.encrypt_payload(r#"{"account":{"pan":"5555555555554444"}}"#)?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod field_level;
pub mod json_path;
pub mod jwe;
pub mod key_wrapping;
pub mod params;

pub use config::{
    EncryptionCertificate, EncryptionConfig, EncryptionScheme, FieldLevelEncryptionConfig,
    FieldLevelEncryptionConfigBuilder, JweConfig, JweConfigBuilder,
};
pub use encoding::FieldValueEncoding;
pub use error::{Error, Result};
pub use jwe::{ContentEncryptionAlgorithm, JweHeader, JweObject};
pub use params::FieldLevelEncryptionParams;

#[cfg(test)]
pub(crate) mod tests;
