//! Byte-level codecs shared across the crate.
//!
//! Covers the value encodings used by the legacy field format (hex and
//! standard base64), the base64url encoding used by JWE compact serialization
//! (RFC 7515 Appendix C: no padding, `+` → `-`, `/` → `_`), SHA-256
//! digests for fingerprints, and constant-time byte comparison for
//! authentication tags.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::Result;

/// The ways field and header values can be encoded in the legacy format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldValueEncoding {
    /// Standard base64 with padding.
    #[default]
    Base64,
    /// Lowercase hex.
    Hex,
}

/// Encodes bytes using the given field value encoding.
pub fn encode_bytes(bytes: &[u8], encoding: FieldValueEncoding) -> String {
    match encoding {
        FieldValueEncoding::Base64 => STANDARD.encode(bytes),
        FieldValueEncoding::Hex => hex::encode(bytes),
    }
}

/// Decodes a value encoded with the given field value encoding.
pub fn decode_value(value: &str, encoding: FieldValueEncoding) -> Result<Vec<u8>> {
    match encoding {
        FieldValueEncoding::Base64 => Ok(STANDARD.decode(value)?),
        FieldValueEncoding::Hex => Ok(hex::decode(value)?),
    }
}

/// Encodes bytes as base64url without padding.
pub fn url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes a base64url string, with or without padding stripped.
pub fn url_decode(encoded: &str) -> Result<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))?)
}

/// Computes the SHA-256 digest of the input.
pub fn sha256_digest(input: &[u8]) -> Vec<u8> {
    Sha256::digest(input).to_vec()
}

/// Compares two byte slices in constant time.
///
/// Slices of different lengths compare unequal; equal-length slices are
/// compared without short-circuiting.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hex_round_trip() {
        let bytes = [0x00, 0x0f, 0xa5, 0xff];
        let encoded = encode_bytes(&bytes, FieldValueEncoding::Hex);
        assert_eq!(encoded, "000fa5ff");
        assert_eq!(decode_value(&encoded, FieldValueEncoding::Hex).unwrap(), bytes);
    }

    #[test]
    fn base64_round_trip() {
        let bytes = b"some data to encode";
        let encoded = encode_bytes(bytes, FieldValueEncoding::Base64);
        assert_eq!(encoded, "c29tZSBkYXRhIHRvIGVuY29kZQ==");
        assert_eq!(
            decode_value(&encoded, FieldValueEncoding::Base64).unwrap(),
            bytes
        );
    }

    #[test]
    fn url_encoding_is_unpadded_and_url_safe() {
        // RFC 7515 Appendix C example input
        let bytes = [3u8, 236, 255, 224, 193];
        assert_eq!(url_encode(&bytes), "A-z_4ME");
        assert_eq!(url_decode("A-z_4ME").unwrap(), bytes);
    }

    #[test]
    fn url_decode_accepts_padded_input() {
        assert_eq!(url_decode("AQAB").unwrap(), url_decode("AQAB==").unwrap());
    }

    #[test]
    fn sha256_known_vectors() {
        assert_eq!(
            hex::encode(sha256_digest(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hex::encode(sha256_digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn constant_time_eq_checks_length() {
        assert!(constant_time_eq(b"abcd", b"abcd"));
        assert!(!constant_time_eq(b"abcd", b"abce"));
        assert!(!constant_time_eq(b"abcd", b"abc"));
    }
}
