//! The JWE protected header.

use serde::{Deserialize, Serialize};

use crate::encoding;
use crate::error::Result;

/// JOSE header of a JWE.
///
/// Field declaration order is the serialized key order (`kid`, `cty`, `enc`,
/// `alg`) and must not change: peers compare against the exact header bytes
/// they authenticated. `enc` and `alg` stay plain strings so that a header
/// carrying an unknown algorithm still parses; the name is rejected when the
/// payload is actually decrypted. Unknown extra parameters are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweHeader {
    /// Key identifier, the fingerprint of the wrapping key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Content type of the plaintext.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,
    /// Content encryption algorithm name, e.g. `A256GCM`.
    pub enc: String,
    /// Key wrapping algorithm name, e.g. `RSA-OAEP-256`.
    pub alg: String,
}

impl JweHeader {
    /// Builds a header from its four standard parameters.
    pub fn new(alg: &str, enc: &str, kid: Option<String>, cty: Option<String>) -> Self {
        Self {
            kid,
            cty,
            enc: enc.to_string(),
            alg: alg.to_string(),
        }
    }

    /// Serializes to compact JSON in declaration key order.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a base64url-encoded header.
    pub fn parse(encoded: &str) -> Result<Self> {
        let bytes = encoding::url_decode(encoded)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
