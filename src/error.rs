//! Error types for payload encryption and decryption.
//!
//! All fallible operations in this crate return [`Result`]. Failures are
//! deterministic: given the same input, the same error is produced, so there
//! is no transient-failure class and nothing is ever retried internally.
//!
//! The payload entry points ([`crate::field_level`] and [`crate::jwe`]) wrap
//! any failure from a single path-pair operation into
//! [`Error::PayloadEncryptionFailed`] / [`Error::PayloadDecryptionFailed`]
//! with the original cause chained, except the kinds callers need to branch
//! on directly ([`Error::MissingParams`], [`Error::MalformedJwe`]), which
//! surface unwrapped.

use thiserror::Error;

/// Result type for encryption operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encrypting or decrypting payload fields.
#[derive(Debug, Error)]
pub enum Error {
    /// A JSON path string is malformed, or the root path was given where a
    /// parent or element key is required.
    #[error("invalid JSON path: {0}")]
    InvalidPath(String),

    /// The parent of an output path does not exist in the payload.
    #[error("parent path not found in payload: '{0}'")]
    PathNotFound(String),

    /// A JSON object was expected at the given path but something else was
    /// found.
    #[error("JSON object expected at path: '{0}'")]
    TypeMismatch(String),

    /// RSA-OAEP encryption of the content encryption key failed.
    #[error("failed to wrap secret key")]
    KeyWrapFailed(#[source] rsa::Error),

    /// RSA-OAEP decryption of the wrapped content encryption key failed.
    #[error("failed to unwrap secret key")]
    KeyUnwrapFailed(#[source] rsa::Error),

    /// The AES-GCM authentication tag did not verify. Plaintext is never
    /// released when this occurs.
    #[error("authentication tag verification failed")]
    AuthenticationFailed,

    /// The CBC-HMAC authentication tag did not match the recomputed value.
    #[error("HMAC verification failed")]
    HmacVerificationFailed,

    /// PKCS#7 padding of a CBC ciphertext is malformed.
    #[error("invalid PKCS#7 padding")]
    Padding,

    /// An `enc` value or digest algorithm outside the supported set.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A JWE compact serialization with the wrong number of parts.
    #[error("malformed JWE: expected 5 dot-separated parts, found {0}")]
    MalformedJwe(usize),

    /// Encryption parameters travel outside the payload (HTTP headers) but
    /// none were supplied, or a required parameter field is absent.
    #[error("encryption params must be set when not stored in the payload")]
    MissingParams,

    /// Key material of the wrong shape for the requested operation.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// One or more configuration invariants were violated by a builder.
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Base64 decode error.
    #[error("base64 decode error")]
    Base64(#[from] base64::DecodeError),

    /// Hex decode error.
    #[error("hex decode error")]
    Hex(#[from] hex::FromHexError),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Payload encryption failed; the original cause is chained.
    #[error("payload encryption failed")]
    PayloadEncryptionFailed(#[source] Box<Error>),

    /// Payload decryption failed; the original cause is chained.
    #[error("payload decryption failed")]
    PayloadDecryptionFailed(#[source] Box<Error>),
}

impl Error {
    /// Wraps a path-pair failure as a payload-level encryption failure,
    /// letting recognized engine kinds pass through unwrapped.
    pub(crate) fn into_payload_encryption(self) -> Self {
        match self {
            e @ (Self::MissingParams | Self::MalformedJwe(_)) => e,
            e => Self::PayloadEncryptionFailed(Box::new(e)),
        }
    }

    /// Wraps a path-pair failure as a payload-level decryption failure,
    /// letting recognized engine kinds pass through unwrapped.
    pub(crate) fn into_payload_decryption(self) -> Self {
        match self {
            e @ (Self::MissingParams | Self::MalformedJwe(_)) => e,
            e => Self::PayloadDecryptionFailed(Box::new(e)),
        }
    }
}
