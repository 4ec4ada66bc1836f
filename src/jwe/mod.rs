//! JWE compact serialization (RFC 7516).
//!
//! A serialized JWE is five base64url parts joined by dots:
//! `header.encryptedKey.iv.ciphertext.tag`. The content key is wrapped with
//! RSA-OAEP; content encryption dispatches on the header `enc` value across
//! the AES-GCM and AES-CBC-HMAC families. The additional authenticated data
//! for content encryption is always the ASCII bytes of the encoded header,
//! exactly as received.

use serde_json::{Map, Value};
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::JweConfig;
use crate::crypto;
use crate::encoding;
use crate::error::{Error, Result};
use crate::json_path;
use crate::key_wrapping;

mod header;

pub use header::JweHeader;

/// Key wrapping algorithm name written into every header.
pub(crate) const ALGORITHM: &str = "RSA-OAEP-256";
/// Content encryption algorithm used by the payload entry points.
const ENCRYPTION: ContentEncryptionAlgorithm = ContentEncryptionAlgorithm::A256Gcm;
/// Content type written into every header.
const CONTENT_TYPE: &str = "application/json";

/// The supported `enc` header values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncryptionAlgorithm {
    /// AES-128-GCM.
    A128Gcm,
    /// AES-192-GCM.
    A192Gcm,
    /// AES-256-GCM.
    A256Gcm,
    /// AES-128-CBC with HMAC-SHA-256.
    A128CbcHs256,
    /// AES-192-CBC with HMAC-SHA-384.
    A192CbcHs384,
    /// AES-256-CBC with HMAC-SHA-512.
    A256CbcHs512,
}

impl ContentEncryptionAlgorithm {
    /// Resolves a header `enc` value, `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "A128GCM" => Some(Self::A128Gcm),
            "A192GCM" => Some(Self::A192Gcm),
            "A256GCM" => Some(Self::A256Gcm),
            "A128CBC-HS256" => Some(Self::A128CbcHs256),
            "A192CBC-HS384" => Some(Self::A192CbcHs384),
            "A256CBC-HS512" => Some(Self::A256CbcHs512),
            _ => None,
        }
    }

    /// The header `enc` value.
    pub fn name(self) -> &'static str {
        match self {
            Self::A128Gcm => "A128GCM",
            Self::A192Gcm => "A192GCM",
            Self::A256Gcm => "A256GCM",
            Self::A128CbcHs256 => "A128CBC-HS256",
            Self::A192CbcHs384 => "A192CBC-HS384",
            Self::A256CbcHs512 => "A256CBC-HS512",
        }
    }

    /// Bit length of the content encryption key. The CBC-HMAC algorithms
    /// need a double-length key, one half for the MAC and one for the
    /// cipher.
    pub fn cek_bit_length(self) -> usize {
        match self {
            Self::A128Gcm => 128,
            Self::A192Gcm => 192,
            Self::A256Gcm | Self::A128CbcHs256 => 256,
            Self::A192CbcHs384 => 384,
            Self::A256CbcHs512 => 512,
        }
    }

    fn is_cbc_hmac(self) -> bool {
        matches!(
            self,
            Self::A128CbcHs256 | Self::A192CbcHs384 | Self::A256CbcHs512
        )
    }
}

/// A parsed JWE in compact serialization.
///
/// The header is kept both parsed and in its raw encoded form: the raw form
/// is the additional authenticated data, and re-serializing could reorder or
/// reformat it.
#[derive(Debug, Clone)]
pub struct JweObject {
    header: JweHeader,
    raw_header: String,
    encrypted_key: String,
    iv: String,
    ciphertext: String,
    auth_tag: String,
}

impl JweObject {
    /// Splits a compact serialization into its five parts and parses the
    /// header. Fails with [`Error::MalformedJwe`] on any other part count.
    pub fn parse(encrypted_payload: &str) -> Result<Self> {
        let parts: Vec<&str> = encrypted_payload.trim().split('.').collect();
        let [raw_header, encrypted_key, iv, ciphertext, auth_tag] = parts.as_slice() else {
            return Err(Error::MalformedJwe(parts.len()));
        };
        Ok(Self {
            header: JweHeader::parse(raw_header)?,
            raw_header: raw_header.to_string(),
            encrypted_key: encrypted_key.to_string(),
            iv: iv.to_string(),
            ciphertext: ciphertext.to_string(),
            auth_tag: auth_tag.to_string(),
        })
    }

    /// The parsed protected header.
    pub fn header(&self) -> &JweHeader {
        &self.header
    }

    /// Encrypts a payload under the given header into compact serialization.
    ///
    /// A fresh content key sized for the header's `enc` value is wrapped
    /// under the configured certificate with RSA-OAEP and SHA-256.
    pub fn encrypt(config: &JweConfig, payload: &str, header: &JweHeader) -> Result<String> {
        let enc = ContentEncryptionAlgorithm::from_name(&header.enc)
            .ok_or_else(|| Error::UnsupportedAlgorithm(header.enc.clone()))?;
        let certificate = config.encryption_certificate.as_ref().ok_or_else(|| {
            Error::InvalidKeyMaterial("no encryption certificate configured".to_string())
        })?;

        let cek = crypto::generate_cek(enc.cek_bit_length());
        let encrypted_key = encoding::url_encode(&key_wrapping::wrap_key(
            certificate.public_key(),
            &cek,
            "SHA-256",
        )?);
        let raw_header = encoding::url_encode(header.to_json()?.as_bytes());
        let aad = raw_header.as_bytes();

        let (iv, sealed) = if enc.is_cbc_hmac() {
            let iv = crypto::random_bytes(crypto::CBC_IV_SIZE);
            let sealed = crypto::encrypt_aes_cbc_hmac(
                &cek,
                &iv,
                aad,
                payload.as_bytes(),
                config.enable_cbc_hmac_verification,
            )?;
            (iv, sealed)
        } else {
            let iv = crypto::random_bytes(crypto::GCM_NONCE_SIZE);
            let sealed = crypto::encrypt_aes_gcm(&cek, &iv, aad, payload.as_bytes())?;
            (iv, sealed)
        };

        Ok(format!(
            "{raw_header}.{encrypted_key}.{}.{}.{}",
            encoding::url_encode(&iv),
            encoding::url_encode(&sealed.ciphertext),
            encoding::url_encode(&sealed.auth_tag),
        ))
    }

    /// Unwraps the content key and decrypts the ciphertext, dispatching on
    /// the header's `enc` value.
    pub fn decrypt(&self, config: &JweConfig) -> Result<String> {
        let private_key = config.decryption_key.as_ref().ok_or_else(|| {
            Error::InvalidKeyMaterial("no decryption key configured".to_string())
        })?;
        let enc = ContentEncryptionAlgorithm::from_name(&self.header.enc)
            .ok_or_else(|| Error::UnsupportedAlgorithm(self.header.enc.clone()))?;

        let cek = Zeroizing::new(key_wrapping::unwrap_key(
            private_key,
            &encoding::url_decode(&self.encrypted_key)?,
            "SHA-256",
        )?);
        let iv = encoding::url_decode(&self.iv)?;
        let ciphertext = encoding::url_decode(&self.ciphertext)?;
        let auth_tag = encoding::url_decode(&self.auth_tag)?;
        let aad = self.raw_header.as_bytes();

        let plaintext = if enc.is_cbc_hmac() {
            crypto::decrypt_aes_cbc_hmac(
                &cek,
                &iv,
                aad,
                &ciphertext,
                &auth_tag,
                config.enable_cbc_hmac_verification,
            )?
        } else {
            crypto::decrypt_aes_gcm(&cek, &iv, aad, &ciphertext, &auth_tag)?
        };
        Ok(String::from_utf8_lossy(&plaintext).into_owned())
    }
}

/// Encrypts the configured payload paths into JWE fields.
pub fn encrypt_payload(payload: &str, config: &JweConfig) -> Result<String> {
    let mut document: Value =
        serde_json::from_str(payload).map_err(|e| Error::from(e).into_payload_encryption())?;
    debug!(paths = config.encryption_paths.len(), "encrypting payload fields");
    for (json_path_in, json_path_out) in &config.encryption_paths {
        encrypt_payload_path(&mut document, json_path_in, json_path_out, config)
            .map_err(Error::into_payload_encryption)?;
    }
    Ok(document.to_string())
}

/// Decrypts the configured JWE payload paths.
pub fn decrypt_payload(payload: &str, config: &JweConfig) -> Result<String> {
    let mut document: Value =
        serde_json::from_str(payload).map_err(|e| Error::from(e).into_payload_decryption())?;
    debug!(paths = config.decryption_paths.len(), "decrypting payload fields");
    for (json_path_in, json_path_out) in &config.decryption_paths {
        decrypt_payload_path(&mut document, json_path_in, json_path_out, config)
            .map_err(Error::into_payload_decryption)?;
    }
    Ok(document.to_string())
}

fn encrypt_payload_path(
    document: &mut Value,
    json_path_in: &str,
    json_path_out: &str,
    config: &JweConfig,
) -> Result<()> {
    let Some(node) = json_path::select(document, json_path_in) else {
        return Ok(());
    };
    if json_path::is_null_or_empty(node) {
        return Ok(());
    }
    let cleartext = json_path::node_to_cleartext(node);

    let header = JweHeader::new(
        ALGORITHM,
        ENCRYPTION.name(),
        config.encryption_key_fingerprint.clone(),
        Some(CONTENT_TYPE.to_string()),
    );
    let encrypted_value = JweObject::encrypt(config, &cleartext, &header)?;

    if json_path_in == "$" {
        *document = Value::Object(Map::new());
    } else {
        json_path::remove_node(document, json_path_in)?;
    }
    json_path::check_or_create_out_object(document, json_path_out)?;
    let Some(Value::Object(out_object)) = json_path::select_mut(document, json_path_out) else {
        return Err(Error::TypeMismatch(json_path_out.to_string()));
    };
    out_object.insert(
        config.encrypted_value_field_name.clone(),
        Value::String(encrypted_value),
    );
    Ok(())
}

fn decrypt_payload_path(
    document: &mut Value,
    json_path_in: &str,
    json_path_out: &str,
    config: &JweConfig,
) -> Result<()> {
    let encrypted_value = {
        let Some(node) = json_path::select_mut(document, json_path_in) else {
            return Ok(());
        };
        if json_path::is_null_or_empty(node) {
            return Ok(());
        }
        if !node.is_object() {
            return Err(Error::TypeMismatch(json_path_in.to_string()));
        }
        json_path::read_and_delete_key(node, Some(config.encrypted_value_field_name.as_str()))
            .and_then(json_path::value_to_non_empty_string)
    };
    let Some(encrypted_value) = encrypted_value else {
        return Ok(());
    };

    let jwe = JweObject::parse(&encrypted_value)?;
    let cleartext = jwe.decrypt(config)?;

    if json_path_out == "$" {
        *document = json_path::parse_cleartext(&cleartext);
        return Ok(());
    }
    json_path::check_or_create_out_object(document, json_path_out)?;
    json_path::add_decrypted_data(document, json_path_out, &cleartext)?;
    json_path::remove_if_empty(document, json_path_in)?;
    Ok(())
}
