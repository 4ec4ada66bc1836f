//! Shared test fixtures and end-to-end payload round trips.

use std::sync::LazyLock;

use pretty_assertions::assert_eq;
use rsa::pkcs8::EncodePublicKey;
use rsa::RsaPrivateKey;
use serde_json::Value;

use crate::config::{
    EncryptionCertificate, FieldLevelEncryptionConfig, FieldLevelEncryptionConfigBuilder,
    JweConfig,
};
use crate::encoding::FieldValueEncoding;
use crate::field_level;
use crate::jwe;
use crate::params::FieldLevelEncryptionParams;

// RSA key generation dominates test time, so every test shares one key.
static TEST_RSA_KEY: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
    RsaPrivateKey::new(&mut rand_core::OsRng, 2048).unwrap()
});

pub(crate) fn test_rsa_key() -> &'static RsaPrivateKey {
    &TEST_RSA_KEY
}

/// The SPKI DER stands in for certificate DER; fingerprinting only needs
/// stable bytes.
pub(crate) fn test_encryption_certificate() -> EncryptionCertificate {
    let public_key = test_rsa_key().to_public_key();
    let der = public_key.to_public_key_der().unwrap().as_bytes().to_vec();
    EncryptionCertificate::new(public_key, der)
}

pub(crate) fn test_field_level_config_builder() -> FieldLevelEncryptionConfigBuilder {
    FieldLevelEncryptionConfig::builder()
        .with_encryption_certificate(test_encryption_certificate())
        .with_decryption_key(test_rsa_key().clone())
        .with_encryption_path("$.data", "$.encryptedData")
        .with_decryption_path("$.encryptedData", "$.data")
        .with_oaep_padding_digest_algorithm("SHA-256")
        .with_iv_field_name("iv")
        .with_encrypted_key_field_name("encryptedKey")
        .with_encrypted_value_field_name("encryptedValue")
}

pub(crate) fn test_field_level_config() -> FieldLevelEncryptionConfig {
    test_field_level_config_builder().build().unwrap()
}

pub(crate) fn test_jwe_config() -> JweConfig {
    JweConfig::builder()
        .with_encryption_certificate(test_encryption_certificate())
        .with_decryption_key(test_rsa_key().clone())
        .with_encryption_path("$.data", "$.encryptedData")
        .with_decryption_path("$.encryptedData", "$.data")
        .build()
        .unwrap()
}

fn parse(payload: &str) -> Value {
    serde_json::from_str(payload).unwrap()
}

#[test]
fn field_level_round_trip() {
    let config = test_field_level_config();
    let payload = r#"{"data": {"field1": "value1", "field2": "value2"}, "other": "value"}"#;

    let encrypted = field_level::encrypt_payload(payload, &config, None).unwrap();
    let encrypted_doc = parse(&encrypted);
    assert!(encrypted_doc.get("data").is_none());
    assert!(encrypted_doc["encryptedData"]["encryptedValue"].is_string());
    assert!(encrypted_doc["encryptedData"]["iv"].is_string());
    assert!(encrypted_doc["encryptedData"]["encryptedKey"].is_string());

    let decrypted = field_level::decrypt_payload(&encrypted, &config, None).unwrap();
    assert_eq!(parse(&decrypted), parse(payload));
}

#[test]
fn field_level_round_trip_with_hex_encoding() {
    let config = test_field_level_config_builder()
        .with_value_encoding(FieldValueEncoding::Hex)
        .build()
        .unwrap();
    let payload = r#"{"data": {"field": "value"}}"#;

    let encrypted = field_level::encrypt_payload(payload, &config, None).unwrap();
    let encrypted_doc = parse(&encrypted);
    let iv = encrypted_doc["encryptedData"]["iv"].as_str().unwrap();
    assert_eq!(iv.len(), 32);
    assert!(iv.chars().all(|c| c.is_ascii_hexdigit()));

    let decrypted = field_level::decrypt_payload(&encrypted, &config, None).unwrap();
    assert_eq!(parse(&decrypted), parse(payload));
}

#[test]
fn field_level_round_trip_with_sha512_oaep() {
    let config = test_field_level_config_builder()
        .with_oaep_padding_digest_algorithm("SHA-512")
        .with_oaep_padding_digest_algorithm_field_name("oaepDigest")
        .build()
        .unwrap();
    let payload = r#"{"data": {"field": "value"}}"#;

    let encrypted = field_level::encrypt_payload(payload, &config, None).unwrap();
    assert_eq!(parse(&encrypted)["encryptedData"]["oaepDigest"], "SHA512");

    let decrypted = field_level::decrypt_payload(&encrypted, &config, None).unwrap();
    assert_eq!(parse(&decrypted), parse(payload));
}

#[test]
fn field_level_round_trip_with_out_of_band_params() {
    // Header-style transport: the IV and wrapped key never touch the payload.
    let config = FieldLevelEncryptionConfig::builder()
        .with_encryption_certificate(test_encryption_certificate())
        .with_decryption_key(test_rsa_key().clone())
        .with_encryption_path("$.data", "$.encryptedData")
        .with_decryption_path("$.encryptedData", "$.data")
        .with_oaep_padding_digest_algorithm("SHA-256")
        .with_iv_header_name("x-iv")
        .with_encrypted_key_header_name("x-encrypted-key")
        .build()
        .unwrap();
    assert!(config.use_http_headers());
    let payload = r#"{"data": {"field": "value"}}"#;

    let params = FieldLevelEncryptionParams::generate(&config).unwrap();
    let encrypted = field_level::encrypt_payload(payload, &config, Some(&params)).unwrap();
    let encrypted_doc = parse(&encrypted);
    assert!(encrypted_doc["encryptedData"].get("iv").is_none());
    assert!(encrypted_doc["encryptedData"].get("encryptedKey").is_none());

    let received = FieldLevelEncryptionParams::new(
        params.iv_value.clone(),
        params.encrypted_key_value.clone(),
        params.oaep_padding_digest_algorithm_value.clone(),
    );
    let decrypted = field_level::decrypt_payload(&encrypted, &config, Some(&received)).unwrap();
    assert_eq!(parse(&decrypted), parse(payload));
}

#[test]
fn field_level_whole_payload_round_trip() {
    let mut config = test_field_level_config();
    config.encryption_paths = vec![("$".to_string(), "$".to_string())];
    config.decryption_paths = vec![("$".to_string(), "$".to_string())];
    let payload = r#"{"field1": "value1", "field2": "value2"}"#;

    let encrypted = field_level::encrypt_payload(payload, &config, None).unwrap();
    let encrypted_doc = parse(&encrypted);
    assert!(encrypted_doc.get("field1").is_none());
    assert!(encrypted_doc["encryptedValue"].is_string());

    let decrypted = field_level::decrypt_payload(&encrypted, &config, None).unwrap();
    assert_eq!(parse(&decrypted), parse(payload));
}

#[test]
fn whole_payload_array_round_trip() {
    // An array root cannot carry the metadata fields, so encryption starts
    // from a fresh object and decryption restores the array wholesale.
    let mut field_level_config = test_field_level_config();
    field_level_config.encryption_paths = vec![("$".to_string(), "$".to_string())];
    field_level_config.decryption_paths = vec![("$".to_string(), "$".to_string())];
    let jwe_config = JweConfig::builder()
        .with_encryption_certificate(test_encryption_certificate())
        .with_decryption_key(test_rsa_key().clone())
        .build()
        .unwrap();
    let payload = r#"[{}, {}]"#;

    let encrypted = field_level::encrypt_payload(payload, &field_level_config, None).unwrap();
    assert!(parse(&encrypted).is_object());
    let decrypted = field_level::decrypt_payload(&encrypted, &field_level_config, None).unwrap();
    assert_eq!(parse(&decrypted), parse(payload));

    let encrypted = jwe::encrypt_payload(payload, &jwe_config).unwrap();
    assert!(parse(&encrypted).is_object());
    let decrypted = jwe::decrypt_payload(&encrypted, &jwe_config).unwrap();
    assert_eq!(parse(&decrypted), parse(payload));
}

#[test]
fn field_level_decrypt_preserves_sibling_fields() {
    let config = test_field_level_config();
    let payload = r#"{"data": {"secret": "s"}}"#;
    let encrypted = field_level::encrypt_payload(payload, &config, None).unwrap();

    // graft extra cleartext next to the output path before decrypting
    let mut doc = parse(&encrypted);
    doc["data"] = serde_json::json!({"plain": "kept"});
    let decrypted = field_level::decrypt_payload(&doc.to_string(), &config, None).unwrap();
    assert_eq!(
        parse(&decrypted),
        serde_json::json!({"data": {"plain": "kept", "secret": "s"}})
    );
}

#[test]
fn jwe_round_trip() {
    let config = test_jwe_config();
    let payload = r#"{"data": {"field1": "value1"}, "other": 17}"#;

    let encrypted = jwe::encrypt_payload(payload, &config).unwrap();
    let encrypted_doc = parse(&encrypted);
    assert!(encrypted_doc.get("data").is_none());
    let serialized = encrypted_doc["encryptedData"]["encryptedData"]
        .as_str()
        .unwrap();
    assert_eq!(serialized.split('.').count(), 5);

    let decrypted = jwe::decrypt_payload(&encrypted, &config).unwrap();
    assert_eq!(parse(&decrypted), parse(payload));
}

#[test]
fn jwe_whole_payload_round_trip() {
    let config = JweConfig::builder()
        .with_encryption_certificate(test_encryption_certificate())
        .with_decryption_key(test_rsa_key().clone())
        .build()
        .unwrap();
    let payload = r#"{"field1": "value1", "nested": {"field2": true}}"#;

    let encrypted = jwe::encrypt_payload(payload, &config).unwrap();
    let encrypted_doc = parse(&encrypted);
    assert_eq!(encrypted_doc.as_object().unwrap().len(), 1);
    assert!(encrypted_doc["encryptedData"].is_string());

    let decrypted = jwe::decrypt_payload(&encrypted, &config).unwrap();
    assert_eq!(parse(&decrypted), parse(payload));
}

#[test]
fn jwe_header_carries_standard_parameters() {
    let config = JweConfig::builder()
        .with_encryption_certificate(test_encryption_certificate())
        .build()
        .unwrap();
    let encrypted = jwe::encrypt_payload(r#"{"field": "value"}"#, &config).unwrap();
    let serialized = parse(&encrypted)["encryptedData"].as_str().unwrap().to_string();

    let jwe_object = crate::jwe::JweObject::parse(&serialized).unwrap();
    let header = jwe_object.header();
    assert_eq!(header.alg, "RSA-OAEP-256");
    assert_eq!(header.enc, "A256GCM");
    assert_eq!(header.cty.as_deref(), Some("application/json"));
    assert_eq!(
        header.kid.as_deref(),
        Some(test_encryption_certificate().key_fingerprint().unwrap().as_str())
    );
}

#[test]
fn jwe_array_value_round_trip() {
    let mut config = test_jwe_config();
    config.decryption_paths = vec![("$.encryptedData".to_string(), "$.data".to_string())];
    let payload = r#"{"data": [1, 2, 3]}"#;

    let encrypted = jwe::encrypt_payload(payload, &config).unwrap();
    let decrypted = jwe::decrypt_payload(&encrypted, &config).unwrap();
    assert_eq!(parse(&decrypted), parse(payload));
}

#[test]
fn jwe_scalar_value_round_trip() {
    let config = test_jwe_config();
    for payload in [r#"{"data": "string"}"#, r#"{"data": 42}"#, r#"{"data": true}"#] {
        let encrypted = jwe::encrypt_payload(payload, &config).unwrap();
        let decrypted = jwe::decrypt_payload(&encrypted, &config).unwrap();
        assert_eq!(parse(&decrypted), parse(payload), "payload: {payload}");
    }
}

#[test]
fn unified_config_dispatch_round_trips() {
    use crate::config::EncryptionConfig;

    for config in [
        EncryptionConfig::FieldLevel(test_field_level_config()),
        EncryptionConfig::Jwe(test_jwe_config()),
    ] {
        let payload = r#"{"data": {"field": "value"}}"#;
        let encrypted = config.encrypt_payload(payload).unwrap();
        let decrypted = config.decrypt_payload(&encrypted).unwrap();
        assert_eq!(parse(&decrypted), parse(payload));
    }
}
