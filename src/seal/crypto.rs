//! # Hybrid Encryption
//!
//! The envelope understood by the SealedSecrets controller.
//!
//! Every value gets a fresh 32-byte AES-256-GCM session key. The session key
//! is wrapped with RSA-OAEP (SHA-256) under the controller's public key,
//! using the sealing scope as the OAEP label. Because each session key
//! encrypts exactly one value, a zero nonce is safe.
//!
//! ```text
//! +----------------+----------------------+-----------------------------+
//! | u16 BE length  | RSA-OAEP(session key) | AES-256-GCM(value) || tag   |
//! +----------------+----------------------+-----------------------------+
//! ```

use crate::constants::SESSION_KEY_BYTES;
use crate::error::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::{CryptoRng, RngCore};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

const LENGTH_PREFIX_BYTES: usize = 2;
const NONCE_BYTES: usize = 12;

/// Encrypt `plaintext` for the holder of `public_key`
///
/// # Errors
///
/// Returns [`Error::Crypto`] if the RSA modulus is too small to wrap the
/// session key or the AEAD rejects the input.
pub fn hybrid_encrypt<R>(
    rng: &mut R,
    public_key: &RsaPublicKey,
    plaintext: &[u8],
    label: &str,
) -> Result<Vec<u8>>
where
    R: RngCore + CryptoRng,
{
    let mut session_key = Zeroizing::new([0u8; SESSION_KEY_BYTES]);
    rng.fill_bytes(session_key.as_mut());

    let wrapped = public_key
        .encrypt(rng, oaep(label), session_key.as_ref())
        .map_err(|e| Error::Crypto(format!("failed to wrap session key: {e}")))?;
    let wrapped_len = u16::try_from(wrapped.len())
        .map_err(|e| Error::Crypto(format!("wrapped session key too large: {e}")))?;

    let cipher = Aes256Gcm::new_from_slice(session_key.as_ref())
        .map_err(|e| Error::Crypto(e.to_string()))?;
    let sealed = cipher
        .encrypt(Nonce::from_slice(&[0u8; NONCE_BYTES]), plaintext)
        .map_err(|e| Error::Crypto(format!("failed to encrypt value: {e}")))?;

    let mut out = Vec::with_capacity(LENGTH_PREFIX_BYTES + wrapped.len() + sealed.len());
    out.extend_from_slice(&wrapped_len.to_be_bytes());
    out.extend_from_slice(&wrapped);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Reverse [`hybrid_encrypt`] with the controller's private key
///
/// Lets sealed output be verified against a known key pair.
///
/// # Errors
///
/// Returns [`Error::Crypto`] on truncated input, a label mismatch, or a
/// tampered payload.
pub fn hybrid_decrypt(
    private_key: &RsaPrivateKey,
    ciphertext: &[u8],
    label: &str,
) -> Result<Vec<u8>> {
    let (prefix, rest) = ciphertext
        .split_first_chunk::<LENGTH_PREFIX_BYTES>()
        .ok_or_else(|| Error::Crypto("ciphertext too short".into()))?;
    let wrapped_len = usize::from(u16::from_be_bytes(*prefix));
    if rest.len() < wrapped_len {
        return Err(Error::Crypto("ciphertext truncated".into()));
    }
    let (wrapped, sealed) = rest.split_at(wrapped_len);

    let session_key = Zeroizing::new(
        private_key
            .decrypt(oaep(label), wrapped)
            .map_err(|e| Error::Crypto(format!("failed to unwrap session key: {e}")))?,
    );

    let cipher = Aes256Gcm::new_from_slice(&session_key)
        .map_err(|e| Error::Crypto(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(&[0u8; NONCE_BYTES]), sealed)
        .map_err(|e| Error::Crypto(format!("failed to decrypt value: {e}")))
}

fn oaep(label: &str) -> Oaep {
    Oaep::new_with_label::<Sha256, _>(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rsa::pkcs8::DecodePrivateKey;

    fn key_pair() -> (RsaPrivateKey, RsaPublicKey) {
        let private_key =
            RsaPrivateKey::from_pkcs8_pem(include_str!("../../tests/fixtures/rsa-key.pem")).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        (private_key, public_key)
    }

    #[test]
    fn test_envelope_layout_and_decrypt() {
        let (private_key, public_key) = key_pair();
        let ciphertext = hybrid_encrypt(&mut OsRng, &public_key, b"s3cr3t", "app/db").unwrap();

        let wrapped_len = usize::from(u16::from_be_bytes([ciphertext[0], ciphertext[1]]));
        assert_eq!(wrapped_len, 256);
        // prefix + wrapped key + plaintext + 16-byte GCM tag
        assert_eq!(ciphertext.len(), 2 + 256 + 6 + 16);

        let plaintext = hybrid_decrypt(&private_key, &ciphertext, "app/db").unwrap();
        assert_eq!(plaintext, b"s3cr3t");
    }

    #[test]
    fn test_session_keys_are_fresh() {
        let (private_key, public_key) = key_pair();
        let first = hybrid_encrypt(&mut OsRng, &public_key, b"s3cr3t", "").unwrap();
        let second = hybrid_encrypt(&mut OsRng, &public_key, b"s3cr3t", "").unwrap();
        assert_ne!(first, second);
        assert_eq!(
            hybrid_decrypt(&private_key, &first, "").unwrap(),
            hybrid_decrypt(&private_key, &second, "").unwrap()
        );
    }

    #[test]
    fn test_label_mismatch_fails() {
        let (private_key, public_key) = key_pair();
        let ciphertext = hybrid_encrypt(&mut OsRng, &public_key, b"s3cr3t", "app/db").unwrap();
        assert!(matches!(
            hybrid_decrypt(&private_key, &ciphertext, "other/db"),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let (private_key, _) = key_pair();
        assert!(matches!(
            hybrid_decrypt(&private_key, &[0x01], ""),
            Err(Error::Crypto(_))
        ));
        assert!(matches!(
            hybrid_decrypt(&private_key, &[0x01, 0x00, 0xff], ""),
            Err(Error::Crypto(_))
        ));
    }
}
