//! Encryption configuration and builders.
//!
//! Configurations are built once, validated eagerly, and then treated as
//! immutable. [`FieldLevelEncryptionConfigBuilder`] and [`JweConfigBuilder`]
//! collect every violation they find and report them all in a single
//! [`Error::InvalidConfig`] instead of stopping at the first one.

use rsa::pkcs8::EncodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::encoding::{self, FieldValueEncoding};
use crate::error::{Error, Result};
use crate::field_level;
use crate::json_path;
use crate::jwe;

/// The payload encryption scheme a configuration drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionScheme {
    /// The legacy field format: raw AES-128-CBC with sibling metadata fields.
    Legacy,
    /// JWE compact serialization (RFC 7516).
    Jwe,
}

/// An RSA public key for wrapping content keys, optionally coupled with the
/// DER bytes of the X.509 certificate it came from.
#[derive(Debug, Clone)]
pub struct EncryptionCertificate {
    public_key: RsaPublicKey,
    certificate_der: Option<Vec<u8>>,
}

impl EncryptionCertificate {
    /// Couples a public key with the DER encoding of its certificate.
    pub fn new(public_key: RsaPublicKey, certificate_der: Vec<u8>) -> Self {
        Self {
            public_key,
            certificate_der: Some(certificate_der),
        }
    }

    /// Uses a bare public key; certificate fingerprints cannot be computed.
    pub fn from_public_key(public_key: RsaPublicKey) -> Self {
        Self {
            public_key,
            certificate_der: None,
        }
    }

    /// The wrapping key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Hex-encoded SHA-256 digest of the certificate DER, when available.
    pub fn certificate_fingerprint(&self) -> Option<String> {
        self.certificate_der
            .as_deref()
            .map(|der| hex::encode(encoding::sha256_digest(der)))
    }

    /// Hex-encoded SHA-256 digest of the SubjectPublicKeyInfo DER encoding
    /// of the public key.
    pub fn key_fingerprint(&self) -> Result<String> {
        let der = self
            .public_key
            .to_public_key_der()
            .map_err(|e| Error::InvalidKeyMaterial(e.to_string()))?;
        Ok(hex::encode(encoding::sha256_digest(der.as_bytes())))
    }
}

/// Configuration for the legacy field format.
///
/// Built through [`FieldLevelEncryptionConfigBuilder`]; see
/// [`FieldLevelEncryptionConfig::builder`].
#[derive(Debug, Clone)]
pub struct FieldLevelEncryptionConfig {
    pub(crate) encryption_certificate: Option<EncryptionCertificate>,
    pub(crate) encryption_certificate_fingerprint: Option<String>,
    pub(crate) encryption_key_fingerprint: Option<String>,
    pub(crate) decryption_key: Option<RsaPrivateKey>,
    pub(crate) encryption_paths: Vec<(String, String)>,
    pub(crate) decryption_paths: Vec<(String, String)>,
    pub(crate) oaep_padding_digest_algorithm: String,
    pub(crate) iv_field_name: Option<String>,
    pub(crate) iv_header_name: Option<String>,
    pub(crate) encrypted_key_field_name: Option<String>,
    pub(crate) encrypted_key_header_name: Option<String>,
    pub(crate) encrypted_value_field_name: String,
    pub(crate) encryption_certificate_fingerprint_field_name: Option<String>,
    pub(crate) encryption_certificate_fingerprint_header_name: Option<String>,
    pub(crate) encryption_key_fingerprint_field_name: Option<String>,
    pub(crate) encryption_key_fingerprint_header_name: Option<String>,
    pub(crate) oaep_padding_digest_algorithm_field_name: Option<String>,
    pub(crate) oaep_padding_digest_algorithm_header_name: Option<String>,
    pub(crate) value_encoding: FieldValueEncoding,
}

impl FieldLevelEncryptionConfig {
    /// Starts a new builder.
    pub fn builder() -> FieldLevelEncryptionConfigBuilder {
        FieldLevelEncryptionConfigBuilder::default()
    }

    /// True when IV and encrypted key travel inside the payload itself.
    pub fn use_http_payloads(&self) -> bool {
        self.iv_field_name.is_some() && self.encrypted_key_field_name.is_some()
    }

    /// True when IV and encrypted key travel as HTTP headers, managed by the
    /// caller through explicit [`crate::FieldLevelEncryptionParams`].
    pub fn use_http_headers(&self) -> bool {
        self.iv_header_name.is_some() && self.encrypted_key_header_name.is_some()
    }
}

/// Builder for [`FieldLevelEncryptionConfig`].
#[derive(Debug, Default)]
pub struct FieldLevelEncryptionConfigBuilder {
    encryption_certificate: Option<EncryptionCertificate>,
    encryption_certificate_fingerprint: Option<String>,
    encryption_key_fingerprint: Option<String>,
    decryption_key: Option<RsaPrivateKey>,
    encryption_paths: Vec<(String, String)>,
    decryption_paths: Vec<(String, String)>,
    oaep_padding_digest_algorithm: Option<String>,
    iv_field_name: Option<String>,
    iv_header_name: Option<String>,
    encrypted_key_field_name: Option<String>,
    encrypted_key_header_name: Option<String>,
    encrypted_value_field_name: Option<String>,
    encryption_certificate_fingerprint_field_name: Option<String>,
    encryption_certificate_fingerprint_header_name: Option<String>,
    encryption_key_fingerprint_field_name: Option<String>,
    encryption_key_fingerprint_header_name: Option<String>,
    oaep_padding_digest_algorithm_field_name: Option<String>,
    oaep_padding_digest_algorithm_header_name: Option<String>,
    value_encoding: FieldValueEncoding,
}

impl FieldLevelEncryptionConfigBuilder {
    /// Sets the certificate whose public key wraps content keys.
    pub fn with_encryption_certificate(mut self, certificate: EncryptionCertificate) -> Self {
        self.encryption_certificate = Some(certificate);
        self
    }

    /// Overrides the certificate fingerprint instead of computing it.
    pub fn with_encryption_certificate_fingerprint(mut self, fingerprint: &str) -> Self {
        self.encryption_certificate_fingerprint = Some(fingerprint.to_string());
        self
    }

    /// Overrides the key fingerprint instead of computing it.
    pub fn with_encryption_key_fingerprint(mut self, fingerprint: &str) -> Self {
        self.encryption_key_fingerprint = Some(fingerprint.to_string());
        self
    }

    /// Sets the private key used to unwrap content keys.
    pub fn with_decryption_key(mut self, key: RsaPrivateKey) -> Self {
        self.decryption_key = Some(key);
        self
    }

    /// Adds a path of the payload to encrypt and the path to write the
    /// encrypted fields to.
    pub fn with_encryption_path(mut self, json_path_in: &str, json_path_out: &str) -> Self {
        self.encryption_paths
            .push((json_path_in.to_string(), json_path_out.to_string()));
        self
    }

    /// Adds a path holding encrypted fields and the path to write the
    /// decrypted data to.
    pub fn with_decryption_path(mut self, json_path_in: &str, json_path_out: &str) -> Self {
        self.decryption_paths
            .push((json_path_in.to_string(), json_path_out.to_string()));
        self
    }

    /// Sets the OAEP digest algorithm, `SHA-256` or `SHA-512`.
    pub fn with_oaep_padding_digest_algorithm(mut self, algorithm: &str) -> Self {
        self.oaep_padding_digest_algorithm = Some(algorithm.to_string());
        self
    }

    /// Field carrying the encoded IV.
    pub fn with_iv_field_name(mut self, name: &str) -> Self {
        self.iv_field_name = Some(name.to_string());
        self
    }

    /// Header carrying the encoded IV.
    pub fn with_iv_header_name(mut self, name: &str) -> Self {
        self.iv_header_name = Some(name.to_string());
        self
    }

    /// Field carrying the encoded wrapped key.
    pub fn with_encrypted_key_field_name(mut self, name: &str) -> Self {
        self.encrypted_key_field_name = Some(name.to_string());
        self
    }

    /// Header carrying the encoded wrapped key.
    pub fn with_encrypted_key_header_name(mut self, name: &str) -> Self {
        self.encrypted_key_header_name = Some(name.to_string());
        self
    }

    /// Field carrying the encoded ciphertext.
    pub fn with_encrypted_value_field_name(mut self, name: &str) -> Self {
        self.encrypted_value_field_name = Some(name.to_string());
        self
    }

    /// Field carrying the certificate fingerprint.
    pub fn with_encryption_certificate_fingerprint_field_name(mut self, name: &str) -> Self {
        self.encryption_certificate_fingerprint_field_name = Some(name.to_string());
        self
    }

    /// Header carrying the certificate fingerprint.
    pub fn with_encryption_certificate_fingerprint_header_name(mut self, name: &str) -> Self {
        self.encryption_certificate_fingerprint_header_name = Some(name.to_string());
        self
    }

    /// Field carrying the key fingerprint.
    pub fn with_encryption_key_fingerprint_field_name(mut self, name: &str) -> Self {
        self.encryption_key_fingerprint_field_name = Some(name.to_string());
        self
    }

    /// Header carrying the key fingerprint.
    pub fn with_encryption_key_fingerprint_header_name(mut self, name: &str) -> Self {
        self.encryption_key_fingerprint_header_name = Some(name.to_string());
        self
    }

    /// Field carrying the OAEP digest algorithm name.
    pub fn with_oaep_padding_digest_algorithm_field_name(mut self, name: &str) -> Self {
        self.oaep_padding_digest_algorithm_field_name = Some(name.to_string());
        self
    }

    /// Header carrying the OAEP digest algorithm name.
    pub fn with_oaep_padding_digest_algorithm_header_name(mut self, name: &str) -> Self {
        self.oaep_padding_digest_algorithm_header_name = Some(name.to_string());
        self
    }

    /// Sets the encoding used for field values, base64 by default.
    pub fn with_value_encoding(mut self, encoding: FieldValueEncoding) -> Self {
        self.value_encoding = encoding;
        self
    }

    /// Validates the builder and assembles the configuration, computing any
    /// fingerprint that was not supplied.
    pub fn build(self) -> Result<FieldLevelEncryptionConfig> {
        let mut violations = Vec::new();
        self.check_json_paths(&mut violations);
        self.check_parameter_values(&mut violations);
        self.check_parameter_consistency(&mut violations);
        if !violations.is_empty() {
            return Err(Error::InvalidConfig(violations));
        }

        let encryption_certificate_fingerprint = match non_empty(&self.encryption_certificate_fingerprint) {
            Some(fingerprint) => Some(fingerprint),
            None => self
                .encryption_certificate
                .as_ref()
                .and_then(EncryptionCertificate::certificate_fingerprint),
        };
        let encryption_key_fingerprint = match non_empty(&self.encryption_key_fingerprint) {
            Some(fingerprint) => Some(fingerprint),
            None => match &self.encryption_certificate {
                Some(certificate) => Some(certificate.key_fingerprint()?),
                None => None,
            },
        };

        Ok(FieldLevelEncryptionConfig {
            encryption_certificate: self.encryption_certificate,
            encryption_certificate_fingerprint,
            encryption_key_fingerprint,
            decryption_key: self.decryption_key,
            encryption_paths: self.encryption_paths,
            decryption_paths: self.decryption_paths,
            oaep_padding_digest_algorithm: self
                .oaep_padding_digest_algorithm
                .unwrap_or_else(|| "SHA-256".to_string()),
            iv_field_name: self.iv_field_name,
            iv_header_name: self.iv_header_name,
            encrypted_key_field_name: self.encrypted_key_field_name,
            encrypted_key_header_name: self.encrypted_key_header_name,
            encrypted_value_field_name: self
                .encrypted_value_field_name
                .unwrap_or_else(|| "encryptedValue".to_string()),
            encryption_certificate_fingerprint_field_name: self
                .encryption_certificate_fingerprint_field_name,
            encryption_certificate_fingerprint_header_name: self
                .encryption_certificate_fingerprint_header_name,
            encryption_key_fingerprint_field_name: self.encryption_key_fingerprint_field_name,
            encryption_key_fingerprint_header_name: self.encryption_key_fingerprint_header_name,
            oaep_padding_digest_algorithm_field_name: self.oaep_padding_digest_algorithm_field_name,
            oaep_padding_digest_algorithm_header_name: self
                .oaep_padding_digest_algorithm_header_name,
            value_encoding: self.value_encoding,
        })
    }

    fn check_json_paths(&self, violations: &mut Vec<String>) {
        for (json_path_in, json_path_out) in &self.encryption_paths {
            if !json_path::is_path_definite(json_path_in)
                || !json_path::is_path_definite(json_path_out)
            {
                violations.push(format!(
                    "encryption path '{json_path_in}' -> '{json_path_out}' must point to a single item"
                ));
            }
        }
        for (json_path_in, json_path_out) in &self.decryption_paths {
            if !json_path::is_path_definite(json_path_in)
                || !json_path::is_path_definite(json_path_out)
            {
                violations.push(format!(
                    "decryption path '{json_path_in}' -> '{json_path_out}' must point to a single item"
                ));
            }
        }
    }

    fn check_parameter_values(&self, violations: &mut Vec<String>) {
        match self.oaep_padding_digest_algorithm.as_deref() {
            None => violations.push("the digest algorithm for OAEP must be set".to_string()),
            Some("SHA-256") | Some("SHA-512") => {}
            Some(other) => violations.push(format!("unsupported OAEP digest algorithm: {other}")),
        }
        if self.iv_field_name.is_none() && self.iv_header_name.is_none() {
            violations.push("at least one of IV field name or IV header name must be set".to_string());
        }
        if self.encrypted_key_field_name.is_none() && self.encrypted_key_header_name.is_none() {
            violations.push(
                "at least one of encrypted key field name or encrypted key header name must be set"
                    .to_string(),
            );
        }
    }

    fn check_parameter_consistency(&self, violations: &mut Vec<String>) {
        if !self.decryption_paths.is_empty() && self.decryption_key.is_none() {
            violations.push("decryption paths are set but no decryption key is".to_string());
        }
        if !self.encryption_paths.is_empty() && self.encryption_certificate.is_none() {
            violations.push("encryption paths are set but no encryption certificate is".to_string());
        }
        if self.iv_field_name.is_some() != self.encrypted_key_field_name.is_some() {
            violations.push(
                "IV field name and encrypted key field name must be both set or both unset"
                    .to_string(),
            );
        }
        if self.iv_header_name.is_some() != self.encrypted_key_header_name.is_some() {
            violations.push(
                "IV header name and encrypted key header name must be both set or both unset"
                    .to_string(),
            );
        }
    }
}

/// Configuration for JWE compact serialization.
#[derive(Debug, Clone)]
pub struct JweConfig {
    pub(crate) encryption_certificate: Option<EncryptionCertificate>,
    pub(crate) encryption_key_fingerprint: Option<String>,
    pub(crate) decryption_key: Option<RsaPrivateKey>,
    pub(crate) encryption_paths: Vec<(String, String)>,
    pub(crate) decryption_paths: Vec<(String, String)>,
    pub(crate) encrypted_value_field_name: String,
    pub(crate) enable_cbc_hmac_verification: bool,
}

impl JweConfig {
    /// Starts a new builder.
    pub fn builder() -> JweConfigBuilder {
        JweConfigBuilder::default()
    }
}

/// Builder for [`JweConfig`].
///
/// Defaults to whole-payload encryption: path `$` -> `$` in both directions
/// and `encryptedData` as the encrypted value field.
#[derive(Debug, Default)]
pub struct JweConfigBuilder {
    encryption_certificate: Option<EncryptionCertificate>,
    encryption_key_fingerprint: Option<String>,
    decryption_key: Option<RsaPrivateKey>,
    encryption_paths: Vec<(String, String)>,
    decryption_paths: Vec<(String, String)>,
    encrypted_value_field_name: Option<String>,
    enable_cbc_hmac_verification: bool,
}

impl JweConfigBuilder {
    /// Sets the certificate whose public key wraps content keys.
    pub fn with_encryption_certificate(mut self, certificate: EncryptionCertificate) -> Self {
        self.encryption_certificate = Some(certificate);
        self
    }

    /// Overrides the `kid` fingerprint instead of computing it.
    pub fn with_encryption_key_fingerprint(mut self, fingerprint: &str) -> Self {
        self.encryption_key_fingerprint = Some(fingerprint.to_string());
        self
    }

    /// Sets the private key used to unwrap content keys.
    pub fn with_decryption_key(mut self, key: RsaPrivateKey) -> Self {
        self.decryption_key = Some(key);
        self
    }

    /// Adds a path of the payload to encrypt and the path to write the
    /// encrypted field to.
    pub fn with_encryption_path(mut self, json_path_in: &str, json_path_out: &str) -> Self {
        self.encryption_paths
            .push((json_path_in.to_string(), json_path_out.to_string()));
        self
    }

    /// Adds a path holding the encrypted field and the path to write the
    /// decrypted data to.
    pub fn with_decryption_path(mut self, json_path_in: &str, json_path_out: &str) -> Self {
        self.decryption_paths
            .push((json_path_in.to_string(), json_path_out.to_string()));
        self
    }

    /// Field carrying the serialized JWE.
    pub fn with_encrypted_value_field_name(mut self, name: &str) -> Self {
        self.encrypted_value_field_name = Some(name.to_string());
        self
    }

    /// Enables authentication tag generation and verification for the
    /// CBC-HMAC content encryption algorithms.
    ///
    /// Off by default for interoperability with peers that emit tag-less CBC
    /// payloads. **Tag-less CBC is not authenticated encryption**: without
    /// verification, tampered ciphertext can decrypt to garbage without any
    /// error. Enable this whenever the peer supports it.
    pub fn with_cbc_hmac_verification(mut self, enabled: bool) -> Self {
        self.enable_cbc_hmac_verification = enabled;
        self
    }

    /// Validates the builder and assembles the configuration.
    pub fn build(self) -> Result<JweConfig> {
        let mut violations = Vec::new();
        if self.encryption_certificate.is_none() && self.decryption_key.is_none() {
            violations.push(
                "at least one of encryption certificate or decryption key must be set".to_string(),
            );
        }
        for (json_path_in, json_path_out) in
            self.encryption_paths.iter().chain(&self.decryption_paths)
        {
            if !json_path::is_path_definite(json_path_in)
                || !json_path::is_path_definite(json_path_out)
            {
                violations.push(format!(
                    "path '{json_path_in}' -> '{json_path_out}' must point to a single item"
                ));
            }
        }
        if !violations.is_empty() {
            return Err(Error::InvalidConfig(violations));
        }

        let encryption_key_fingerprint = match non_empty(&self.encryption_key_fingerprint) {
            Some(fingerprint) => Some(fingerprint),
            None => match &self.encryption_certificate {
                Some(certificate) => Some(certificate.key_fingerprint()?),
                None => None,
            },
        };
        let mut encryption_paths = self.encryption_paths;
        if encryption_paths.is_empty() {
            encryption_paths.push(("$".to_string(), "$".to_string()));
        }
        let mut decryption_paths = self.decryption_paths;
        if decryption_paths.is_empty() {
            decryption_paths.push(("$".to_string(), "$".to_string()));
        }

        Ok(JweConfig {
            encryption_certificate: self.encryption_certificate,
            encryption_key_fingerprint,
            decryption_key: self.decryption_key,
            encryption_paths,
            decryption_paths,
            encrypted_value_field_name: self
                .encrypted_value_field_name
                .unwrap_or_else(|| "encryptedData".to_string()),
            enable_cbc_hmac_verification: self.enable_cbc_hmac_verification,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

/// A scheme-tagged configuration, for call sites that handle both formats
/// behind one entry point.
#[derive(Debug, Clone)]
pub enum EncryptionConfig {
    /// Legacy field format configuration.
    FieldLevel(FieldLevelEncryptionConfig),
    /// JWE configuration.
    Jwe(JweConfig),
}

impl EncryptionConfig {
    /// The scheme this configuration drives.
    pub fn scheme(&self) -> EncryptionScheme {
        match self {
            Self::FieldLevel(_) => EncryptionScheme::Legacy,
            Self::Jwe(_) => EncryptionScheme::Jwe,
        }
    }

    /// Encrypts the configured payload paths.
    pub fn encrypt_payload(&self, payload: &str) -> Result<String> {
        match self {
            Self::FieldLevel(config) => field_level::encrypt_payload(payload, config, None),
            Self::Jwe(config) => jwe::encrypt_payload(payload, config),
        }
    }

    /// Decrypts the configured payload paths.
    pub fn decrypt_payload(&self, payload: &str) -> Result<String> {
        match self {
            Self::FieldLevel(config) => field_level::decrypt_payload(payload, config, None),
            Self::Jwe(config) => jwe::decrypt_payload(payload, config),
        }
    }
}

impl From<FieldLevelEncryptionConfig> for EncryptionConfig {
    fn from(config: FieldLevelEncryptionConfig) -> Self {
        Self::FieldLevel(config)
    }
}

impl From<JweConfig> for EncryptionConfig {
    fn from(config: JweConfig) -> Self {
        Self::Jwe(config)
    }
}
