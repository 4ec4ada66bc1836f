//! Symmetric content encryption primitives.
//!
//! Two families are supported: AES-GCM (96-bit nonce, 128-bit tag) and the
//! AES-CBC + HMAC-SHA2 generic composition from RFC 7518 §5.2, where the
//! content key is split into an HMAC half and an AES half and the tag is the
//! leftmost half of the MAC over `AAD || IV || ciphertext || bitlen(AAD)`.
//! A third, tag-less AES-128-CBC mode backs the legacy field format.

use aes::cipher::{block_padding::Pkcs7, consts::U12, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::encoding;
use crate::error::{Error, Result};

type Aes192Gcm = aes_gcm::AesGcm<Aes192, U12>;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes192CbcEnc = cbc::Encryptor<Aes192>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES-GCM nonce size in bytes.
pub const GCM_NONCE_SIZE: usize = 12;
/// AES-GCM authentication tag size in bytes.
pub const GCM_TAG_SIZE: usize = 16;
/// AES-CBC initialization vector size in bytes.
pub const CBC_IV_SIZE: usize = 16;

/// Ciphertext plus its detached authentication tag.
pub struct AuthenticatedCiphertext {
    /// The raw ciphertext bytes.
    pub ciphertext: Vec<u8>,
    /// The detached tag; empty when HMAC generation is disabled.
    pub auth_tag: Vec<u8>,
}

/// Fills a fresh buffer of the given size from the OS random source.
pub fn random_bytes(size: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; size];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generates a fresh content encryption key of the given bit length.
pub fn generate_cek(bit_length: usize) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(random_bytes(bit_length.div_ceil(8)))
}

/// Encrypts with AES-GCM. The key length selects the AES variant (16, 24 or
/// 32 bytes); the nonce must be 96 bits.
pub fn encrypt_aes_gcm(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<AuthenticatedCiphertext> {
    if nonce.len() != GCM_NONCE_SIZE {
        return Err(Error::InvalidKeyMaterial(format!(
            "AES-GCM nonce must be {GCM_NONCE_SIZE} bytes, got {}",
            nonce.len()
        )));
    }
    let nonce = Nonce::from_slice(nonce);
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    let sealed = match key.len() {
        16 => new_gcm::<Aes128Gcm>(key)?.encrypt(nonce, payload),
        24 => new_gcm::<Aes192Gcm>(key)?.encrypt(nonce, payload),
        32 => new_gcm::<Aes256Gcm>(key)?.encrypt(nonce, payload),
        other => {
            return Err(Error::InvalidKeyMaterial(format!(
                "unsupported AES key length: {other} bytes"
            )))
        }
    }
    .map_err(|_| Error::InvalidKeyMaterial("AES-GCM encryption failed".to_string()))?;
    let tag_offset = sealed.len() - GCM_TAG_SIZE;
    Ok(AuthenticatedCiphertext {
        auth_tag: sealed[tag_offset..].to_vec(),
        ciphertext: {
            let mut ciphertext = sealed;
            ciphertext.truncate(tag_offset);
            ciphertext
        },
    })
}

/// Decrypts AES-GCM ciphertext, verifying the tag.
pub fn decrypt_aes_gcm(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    auth_tag: &[u8],
) -> Result<Vec<u8>> {
    if nonce.len() != GCM_NONCE_SIZE || auth_tag.len() != GCM_TAG_SIZE {
        return Err(Error::AuthenticationFailed);
    }
    let nonce = Nonce::from_slice(nonce);
    let mut sealed = Vec::with_capacity(ciphertext.len() + auth_tag.len());
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(auth_tag);
    let payload = Payload {
        msg: &sealed,
        aad,
    };
    match key.len() {
        16 => new_gcm::<Aes128Gcm>(key)?.decrypt(nonce, payload),
        24 => new_gcm::<Aes192Gcm>(key)?.decrypt(nonce, payload),
        32 => new_gcm::<Aes256Gcm>(key)?.decrypt(nonce, payload),
        other => {
            return Err(Error::InvalidKeyMaterial(format!(
                "unsupported AES key length: {other} bytes"
            )))
        }
    }
    .map_err(|_| Error::AuthenticationFailed)
}

fn new_gcm<C: KeyInit>(key: &[u8]) -> Result<C> {
    C::new_from_slice(key).map_err(|e| Error::InvalidKeyMaterial(e.to_string()))
}

/// Encrypts with the CBC-HMAC composition. The key must be twice the AES key
/// length (32, 48 or 64 bytes); its first half keys the MAC, its second half
/// keys the cipher. When `generate_hmac` is false the tag is left empty.
pub fn encrypt_aes_cbc_hmac(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
    generate_hmac: bool,
) -> Result<AuthenticatedCiphertext> {
    let (hmac_key, aes_key) = split_cbc_hmac_key(key)?;
    let ciphertext = encrypt_aes_cbc(aes_key, iv, plaintext)?;
    let auth_tag = if generate_hmac {
        let mut tag = compute_cbc_hmac(hmac_key, aad, iv, &ciphertext)?;
        tag.truncate(hmac_key.len());
        tag
    } else {
        Vec::new()
    };
    Ok(AuthenticatedCiphertext {
        ciphertext,
        auth_tag,
    })
}

/// Decrypts CBC-HMAC ciphertext. When `verify_hmac` is true the tag is
/// recomputed and compared in constant time before any decryption happens;
/// a mismatch fails with [`Error::HmacVerificationFailed`].
pub fn decrypt_aes_cbc_hmac(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    auth_tag: &[u8],
    verify_hmac: bool,
) -> Result<Vec<u8>> {
    let (hmac_key, aes_key) = split_cbc_hmac_key(key)?;
    if verify_hmac {
        let mut expected = compute_cbc_hmac(hmac_key, aad, iv, ciphertext)?;
        expected.truncate(hmac_key.len());
        if !encoding::constant_time_eq(auth_tag, &expected) {
            return Err(Error::HmacVerificationFailed);
        }
    }
    decrypt_aes_cbc(aes_key, iv, ciphertext)
}

fn split_cbc_hmac_key(key: &[u8]) -> Result<(&[u8], &[u8])> {
    if !matches!(key.len(), 32 | 48 | 64) {
        return Err(Error::InvalidKeyMaterial(format!(
            "CBC-HMAC key must be 32, 48 or 64 bytes, got {}",
            key.len()
        )));
    }
    Ok(key.split_at(key.len() / 2))
}

/// HMAC input is `AAD || IV || ciphertext || bitlen(AAD)` with the bit
/// length as a big-endian u64. Returns the full digest; callers truncate.
fn compute_cbc_hmac(hmac_key: &[u8], aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let aad_bit_length = ((aad.len() as u64) * 8).to_be_bytes();
    macro_rules! mac_with {
        ($digest:ty) => {{
            // disambiguate from aead's KeyInit, which also has new_from_slice
            let mut mac = <Hmac<$digest> as Mac>::new_from_slice(hmac_key)
                .map_err(|e| Error::InvalidKeyMaterial(e.to_string()))?;
            mac.update(aad);
            mac.update(iv);
            mac.update(ciphertext);
            mac.update(&aad_bit_length);
            Ok(mac.finalize().into_bytes().to_vec())
        }};
    }
    match hmac_key.len() {
        16 => mac_with!(Sha256),
        24 => mac_with!(Sha384),
        32 => mac_with!(Sha512),
        other => Err(Error::InvalidKeyMaterial(format!(
            "unsupported HMAC key length: {other} bytes"
        ))),
    }
}

/// Encrypts with AES-CBC and PKCS#7 padding. The key length selects the AES
/// variant.
pub fn encrypt_aes_cbc(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != CBC_IV_SIZE {
        return Err(Error::InvalidKeyMaterial(format!(
            "AES-CBC IV must be {CBC_IV_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    macro_rules! encrypt_with {
        ($cipher:ty) => {
            Ok(<$cipher>::new_from_slices(key, iv)
                .map_err(|e| Error::InvalidKeyMaterial(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext))
        };
    }
    match key.len() {
        16 => encrypt_with!(Aes128CbcEnc),
        24 => encrypt_with!(Aes192CbcEnc),
        32 => encrypt_with!(Aes256CbcEnc),
        other => Err(Error::InvalidKeyMaterial(format!(
            "unsupported AES key length: {other} bytes"
        ))),
    }
}

/// Decrypts AES-CBC ciphertext and strips PKCS#7 padding.
pub fn decrypt_aes_cbc(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != CBC_IV_SIZE {
        return Err(Error::InvalidKeyMaterial(format!(
            "AES-CBC IV must be {CBC_IV_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    macro_rules! decrypt_with {
        ($cipher:ty) => {
            <$cipher>::new_from_slices(key, iv)
                .map_err(|e| Error::InvalidKeyMaterial(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| Error::Padding)
        };
    }
    match key.len() {
        16 => decrypt_with!(Aes128CbcDec),
        24 => decrypt_with!(Aes192CbcDec),
        32 => decrypt_with!(Aes256CbcDec),
        other => Err(Error::InvalidKeyMaterial(format!(
            "unsupported AES key length: {other} bytes"
        ))),
    }
}
