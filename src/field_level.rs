//! Payload encryption in the legacy field format.
//!
//! Each configured path is pulled out of the payload, serialized, encrypted
//! with AES-128-CBC and written back as an encoded `encryptedValue` field,
//! with the IV, wrapped key, fingerprints and OAEP digest written as sibling
//! fields when configured. Decryption reverses the rewrite, merging the
//! cleartext back at the output path.

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::FieldLevelEncryptionConfig;
use crate::crypto;
use crate::encoding;
use crate::error::{Error, Result};
use crate::json_path;
use crate::params::FieldLevelEncryptionParams;

/// Encrypts the configured payload paths.
///
/// Explicit `params` are used for every path; with `None`, fresh parameters
/// are generated per path and written into the payload, which requires the
/// configuration to carry the IV and encrypted key field names.
pub fn encrypt_payload(
    payload: &str,
    config: &FieldLevelEncryptionConfig,
    params: Option<&FieldLevelEncryptionParams>,
) -> Result<String> {
    let mut document: Value =
        serde_json::from_str(payload).map_err(|e| Error::from(e).into_payload_encryption())?;
    debug!(paths = config.encryption_paths.len(), "encrypting payload fields");
    for (json_path_in, json_path_out) in &config.encryption_paths {
        encrypt_payload_path(&mut document, json_path_in, json_path_out, config, params)
            .map_err(Error::into_payload_encryption)?;
    }
    Ok(document.to_string())
}

/// Decrypts the configured payload paths.
///
/// With `params` set to `None`, the parameters are read (and removed) from
/// the payload fields; this fails with [`Error::MissingParams`] when the
/// configuration does not carry them in the payload.
pub fn decrypt_payload(
    payload: &str,
    config: &FieldLevelEncryptionConfig,
    params: Option<&FieldLevelEncryptionParams>,
) -> Result<String> {
    let mut document: Value =
        serde_json::from_str(payload).map_err(|e| Error::from(e).into_payload_decryption())?;
    debug!(paths = config.decryption_paths.len(), "decrypting payload fields");
    for (json_path_in, json_path_out) in &config.decryption_paths {
        decrypt_payload_path(&mut document, json_path_in, json_path_out, config, params)
            .map_err(Error::into_payload_decryption)?;
    }
    Ok(document.to_string())
}

fn encrypt_payload_path(
    document: &mut Value,
    json_path_in: &str,
    json_path_out: &str,
    config: &FieldLevelEncryptionConfig,
    params: Option<&FieldLevelEncryptionParams>,
) -> Result<()> {
    let Some(node) = json_path::select(document, json_path_in) else {
        return Ok(());
    };
    let cleartext = json_path::node_to_cleartext(node);

    let generated;
    let params = match params {
        Some(params) => params,
        None => {
            generated = FieldLevelEncryptionParams::generate(config)?;
            &generated
        }
    };
    let encrypted_bytes = crypto::encrypt_aes_cbc(
        params.secret_key_bytes(config)?,
        params.iv_bytes(config)?,
        cleartext.as_bytes(),
    )?;
    let encrypted_value = encoding::encode_bytes(&encrypted_bytes, config.value_encoding);

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
    write_field(out_object, &config.iv_field_name, &params.iv_value);
    write_field(
        out_object,
        &config.encrypted_key_field_name,
        &params.encrypted_key_value,
    );
    write_field(
        out_object,
        &config.encryption_certificate_fingerprint_field_name,
        &config.encryption_certificate_fingerprint,
    );
    write_field(
        out_object,
        &config.encryption_key_fingerprint_field_name,
        &config.encryption_key_fingerprint,
    );
    write_field(
        out_object,
        &config.oaep_padding_digest_algorithm_field_name,
        &params.oaep_padding_digest_algorithm_value,
    );
    Ok(())
}

fn write_field(out_object: &mut Map<String, Value>, name: &Option<String>, value: &Option<String>) {
    if let (Some(name), Some(value)) = (name, value) {
        out_object.insert(name.clone(), Value::String(value.clone()));
    }
}

fn decrypt_payload_path(
    document: &mut Value,
    json_path_in: &str,
    json_path_out: &str,
    config: &FieldLevelEncryptionConfig,
    params: Option<&FieldLevelEncryptionParams>,
) -> Result<()> {
    let cleartext = {
        let Some(node) = json_path::select_mut(document, json_path_in) else {
            return Ok(());
        };
        if !node.is_object() {
            return Err(Error::TypeMismatch(json_path_in.to_string()));
        }
        let encrypted_value = json_path::read_and_delete_key(
            node,
            Some(config.encrypted_value_field_name.as_str()),
        )
        .and_then(json_path::value_to_non_empty_string);
        let Some(encrypted_value) = encrypted_value else {
            return Ok(());
        };

        let read_params;
        let params = match params {
            Some(params) => params,
            None => {
                if !config.use_http_payloads() {
                    return Err(Error::MissingParams);
                }
                read_params = read_params_from_node(node, config);
                &read_params
            }
        };

        let encrypted_bytes = encoding::decode_value(&encrypted_value, config.value_encoding)?;
        let decrypted = crypto::decrypt_aes_cbc(
            params.secret_key_bytes(config)?,
            params.iv_bytes(config)?,
            &encrypted_bytes,
        )?;
        String::from_utf8_lossy(&decrypted).into_owned()
    };

    if json_path_out == "$" {
        *document = json_path::parse_cleartext(&cleartext);
        return Ok(());
    }
    json_path::check_or_create_out_object(document, json_path_out)?;
    json_path::add_decrypted_data(document, json_path_out, &cleartext)?;
    json_path::remove_if_empty(document, json_path_in)?;
    Ok(())
}

/// Pulls the encryption parameters out of the input node, removing each
/// field it finds. The fingerprint fields are removed without being used.
fn read_params_from_node(
    node: &mut Value,
    config: &FieldLevelEncryptionConfig,
) -> FieldLevelEncryptionParams {
    let oaep_digest =
        json_path::read_and_delete_key(node, config.oaep_padding_digest_algorithm_field_name.as_deref())
            .and_then(json_path::value_to_non_empty_string)
            .unwrap_or_else(|| config.oaep_padding_digest_algorithm.clone());
    let encrypted_key =
        json_path::read_and_delete_key(node, config.encrypted_key_field_name.as_deref())
            .and_then(json_path::value_to_non_empty_string);
    let iv = json_path::read_and_delete_key(node, config.iv_field_name.as_deref())
        .and_then(json_path::value_to_non_empty_string);
    json_path::read_and_delete_key(
        node,
        config.encryption_certificate_fingerprint_field_name.as_deref(),
    );
    json_path::read_and_delete_key(node, config.encryption_key_fingerprint_field_name.as_deref());
    FieldLevelEncryptionParams::new(iv, encrypted_key, Some(oaep_digest))
}
