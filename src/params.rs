//! Per-request parameters for the legacy field format.
//!
//! A [`FieldLevelEncryptionParams`] value holds the encoded IV and wrapped
//! key exactly as they travel next to the ciphertext, plus lazily decoded
//! raw material. Callers moving these values through HTTP headers build one
//! with [`FieldLevelEncryptionParams::generate`], send the encoded values,
//! and reconstruct with [`FieldLevelEncryptionParams::new`] on the way back.

use std::cell::OnceCell;

use zeroize::Zeroizing;

use crate::config::FieldLevelEncryptionConfig;
use crate::crypto;
use crate::encoding;
use crate::error::{Error, Result};
use crate::key_wrapping;

/// Encryption parameters for one payload: IV, wrapped key and OAEP digest.
#[derive(Debug, Default)]
pub struct FieldLevelEncryptionParams {
    /// Encoded initialization vector.
    pub iv_value: Option<String>,
    /// Encoded wrapped content key.
    pub encrypted_key_value: Option<String>,
    /// OAEP digest algorithm in its dash-free wire form, e.g. `SHA256`.
    pub oaep_padding_digest_algorithm_value: Option<String>,
    secret_key_bytes: OnceCell<Zeroizing<Vec<u8>>>,
    iv_bytes: OnceCell<Vec<u8>>,
}

impl FieldLevelEncryptionParams {
    /// Reconstructs parameters from encoded values received out of band.
    pub fn new(
        iv_value: Option<String>,
        encrypted_key_value: Option<String>,
        oaep_padding_digest_algorithm_value: Option<String>,
    ) -> Self {
        Self {
            iv_value,
            encrypted_key_value,
            oaep_padding_digest_algorithm_value,
            secret_key_bytes: OnceCell::new(),
            iv_bytes: OnceCell::new(),
        }
    }

    /// Generates a fresh 128-bit AES key and 16-byte IV, wraps the key under
    /// the configured certificate and encodes both with the configured value
    /// encoding.
    pub fn generate(config: &FieldLevelEncryptionConfig) -> Result<Self> {
        let iv = crypto::random_bytes(crypto::CBC_IV_SIZE);
        let secret_key = crypto::generate_cek(128);
        let certificate = config
            .encryption_certificate
            .as_ref()
            .ok_or_else(|| Error::InvalidKeyMaterial("no encryption certificate configured".to_string()))?;
        let wrapped_key = key_wrapping::wrap_key(
            certificate.public_key(),
            &secret_key,
            &config.oaep_padding_digest_algorithm,
        )?;

        let params = Self::new(
            Some(encoding::encode_bytes(&iv, config.value_encoding)),
            Some(encoding::encode_bytes(&wrapped_key, config.value_encoding)),
            Some(config.oaep_padding_digest_algorithm.replace('-', "")),
        );
        let _ = params.iv_bytes.set(iv);
        let _ = params.secret_key_bytes.set(secret_key);
        Ok(params)
    }

    /// The raw IV, decoding [`Self::iv_value`] on first use.
    pub fn iv_bytes(&self, config: &FieldLevelEncryptionConfig) -> Result<&[u8]> {
        if let Some(iv) = self.iv_bytes.get() {
            return Ok(iv);
        }
        let encoded = self.iv_value.as_deref().ok_or(Error::MissingParams)?;
        let decoded = encoding::decode_value(encoded, config.value_encoding)?;
        Ok(self.iv_bytes.get_or_init(|| decoded).as_slice())
    }

    /// The raw content key, decoding and unwrapping
    /// [`Self::encrypted_key_value`] on first use. The OAEP digest defaults
    /// to the configured one when no value travelled with the payload.
    pub fn secret_key_bytes(&self, config: &FieldLevelEncryptionConfig) -> Result<&[u8]> {
        if let Some(key) = self.secret_key_bytes.get() {
            return Ok(key);
        }
        let encoded = self
            .encrypted_key_value
            .as_deref()
            .ok_or(Error::MissingParams)?;
        let wrapped_key = encoding::decode_value(encoded, config.value_encoding)?;
        let private_key = config
            .decryption_key
            .as_ref()
            .ok_or_else(|| Error::InvalidKeyMaterial("no decryption key configured".to_string()))?;
        let algorithm = self
            .oaep_padding_digest_algorithm_value
            .as_deref()
            .unwrap_or(&config.oaep_padding_digest_algorithm);
        let secret_key = key_wrapping::unwrap_key(private_key, &wrapped_key, algorithm)?;
        Ok(self
            .secret_key_bytes
            .get_or_init(|| Zeroizing::new(secret_key))
            .as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::tests::test_field_level_config;

    #[test]
    fn generate_produces_complete_params() {
        let config = test_field_level_config();
        let params = FieldLevelEncryptionParams::generate(&config).unwrap();
        assert!(params.iv_value.is_some());
        assert!(params.encrypted_key_value.is_some());
        assert_eq!(
            params.oaep_padding_digest_algorithm_value.as_deref(),
            Some("SHA256")
        );
        assert_eq!(params.iv_bytes(&config).unwrap().len(), 16);
        assert_eq!(params.secret_key_bytes(&config).unwrap().len(), 16);
    }

    #[test]
    fn encoded_values_round_trip_through_new() {
        let config = test_field_level_config();
        let generated = FieldLevelEncryptionParams::generate(&config).unwrap();
        let restored = FieldLevelEncryptionParams::new(
            generated.iv_value.clone(),
            generated.encrypted_key_value.clone(),
            generated.oaep_padding_digest_algorithm_value.clone(),
        );
        assert_eq!(
            restored.iv_bytes(&config).unwrap(),
            generated.iv_bytes(&config).unwrap()
        );
        assert_eq!(
            restored.secret_key_bytes(&config).unwrap(),
            generated.secret_key_bytes(&config).unwrap()
        );
    }

    #[test]
    fn missing_values_are_reported() {
        let config = test_field_level_config();
        let params = FieldLevelEncryptionParams::new(None, None, None);
        assert!(matches!(params.iv_bytes(&config), Err(Error::MissingParams)));
        assert!(matches!(
            params.secret_key_bytes(&config),
            Err(Error::MissingParams)
        ));
    }
}
