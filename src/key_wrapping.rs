//! RSA-OAEP wrapping of content encryption keys.

use rand_core::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha512};

use crate::error::{Error, Result};

/// Wraps a content encryption key under the recipient's RSA public key.
///
/// The digest algorithm selects the OAEP hash: exactly `SHA-256` uses
/// SHA-256, anything else falls back to SHA-512.
pub fn wrap_key(
    public_key: &RsaPublicKey,
    key_bytes: &[u8],
    oaep_digest_algorithm: &str,
) -> Result<Vec<u8>> {
    let mut rng = OsRng;
    let wrapped = if oaep_digest_algorithm == "SHA-256" {
        public_key.encrypt(&mut rng, Oaep::new::<Sha256>(), key_bytes)
    } else {
        public_key.encrypt(&mut rng, Oaep::new::<Sha512>(), key_bytes)
    };
    wrapped.map_err(Error::KeyWrapFailed)
}

/// Unwraps a content encryption key with the local RSA private key.
///
/// The digest algorithm name is normalized first, so the dash-free wire form
/// (`SHA256`) and the standard form (`SHA-256`) select the same hash.
pub fn unwrap_key(
    private_key: &RsaPrivateKey,
    wrapped_key: &[u8],
    oaep_digest_algorithm: &str,
) -> Result<Vec<u8>> {
    let algorithm = normalize_digest_algorithm(oaep_digest_algorithm);
    let unwrapped = if algorithm == "SHA-256" {
        private_key.decrypt(Oaep::new::<Sha256>(), wrapped_key)
    } else {
        private_key.decrypt(Oaep::new::<Sha512>(), wrapped_key)
    };
    unwrapped.map_err(Error::KeyUnwrapFailed)
}

/// Inserts the dash into dash-free digest names: `SHA256` becomes `SHA-256`.
pub(crate) fn normalize_digest_algorithm(name: &str) -> String {
    if name.contains('-') {
        name.to_string()
    } else {
        name.replace("SHA", "SHA-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::tests::test_rsa_key;

    #[test]
    fn wrap_unwrap_inverse_sha256() {
        let private_key = test_rsa_key();
        let public_key = RsaPublicKey::from(private_key);
        let cek = [7u8; 16];
        let wrapped = wrap_key(&public_key, &cek, "SHA-256").unwrap();
        assert_eq!(unwrap_key(private_key, &wrapped, "SHA-256").unwrap(), cek);
    }

    #[test]
    fn wrap_unwrap_inverse_sha512() {
        let private_key = test_rsa_key();
        let public_key = RsaPublicKey::from(private_key);
        let cek = [7u8; 16];
        let wrapped = wrap_key(&public_key, &cek, "SHA-512").unwrap();
        assert_eq!(unwrap_key(private_key, &wrapped, "SHA-512").unwrap(), cek);
    }

    #[test]
    fn unwrap_accepts_dash_free_digest_name() {
        let private_key = test_rsa_key();
        let public_key = RsaPublicKey::from(private_key);
        let cek = [7u8; 16];
        let wrapped = wrap_key(&public_key, &cek, "SHA-256").unwrap();
        assert_eq!(unwrap_key(private_key, &wrapped, "SHA256").unwrap(), cek);
    }

    #[test]
    fn digest_mismatch_fails_unwrap() {
        let private_key = test_rsa_key();
        let public_key = RsaPublicKey::from(private_key);
        let wrapped = wrap_key(&public_key, &[7u8; 16], "SHA-256").unwrap();
        assert!(matches!(
            unwrap_key(private_key, &wrapped, "SHA-512"),
            Err(Error::KeyUnwrapFailed(_))
        ));
    }

    #[test]
    fn wrap_fails_when_modulus_is_too_small() {
        // SHA-512 OAEP needs 2 * 64 + 2 bytes of overhead, more than a
        // 512-bit modulus can carry.
        let small_key = RsaPrivateKey::new(&mut OsRng, 512).unwrap();
        let public_key = RsaPublicKey::from(&small_key);
        assert!(matches!(
            wrap_key(&public_key, &[7u8; 16], "SHA-512"),
            Err(Error::KeyWrapFailed(_))
        ));
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_digest_algorithm("SHA256"), "SHA-256");
        assert_eq!(normalize_digest_algorithm("SHA512"), "SHA-512");
        assert_eq!(normalize_digest_algorithm("SHA-256"), "SHA-256");
    }
}
