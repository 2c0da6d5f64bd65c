//! Decryption of secrets stored at rest as base64url(nonce || ciphertext)
//! sealed with AES-GCM.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret is not valid base64url")]
    Encoding,
    #[error("decryption key must be 16 or 32 bytes, got {0}")]
    KeyLength(usize),
    #[error("secret is shorter than the nonce")]
    Truncated,
    #[error("secret failed authentication")]
    Authentication,
    #[error("decrypted secret is not valid utf-8")]
    Utf8,
}

/// Opens `envelope` with `key`; the key length picks AES-128 or AES-256.
pub fn decrypt_secret(envelope: &str, key: &[u8]) -> Result<String, SecretError> {
    let envelope = envelope.trim();
    let raw = URL_SAFE
        .decode(envelope)
        .or_else(|_| URL_SAFE_NO_PAD.decode(envelope))
        .map_err(|_| SecretError::Encoding)?;
    if raw.len() < NONCE_LEN {
        return Err(SecretError::Truncated);
    }
    let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce);

    let plaintext = match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map_err(|_| SecretError::KeyLength(key.len()))?
            .decrypt(nonce, ciphertext),
        32 => Aes256Gcm::new_from_slice(key)
            .map_err(|_| SecretError::KeyLength(key.len()))?
            .decrypt(nonce, ciphertext),
        other => return Err(SecretError::KeyLength(other)),
    }
    .map_err(|_| SecretError::Authentication)?;

    String::from_utf8(plaintext).map_err(|_| SecretError::Utf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    fn seal(plaintext: &str, key: &[u8]) -> String {
        let nonce = [7u8; NONCE_LEN];
        let cipher = Aes256Gcm::new_from_slice(key).unwrap();
        let mut sealed = nonce.to_vec();
        sealed.extend(
            cipher
                .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
                .unwrap(),
        );
        URL_SAFE.encode(sealed)
    }

    #[test]
    fn opens_sealed_password() {
        let envelope = seal("smtp-password", KEY);
        assert_eq!(decrypt_secret(&envelope, KEY).unwrap(), "smtp-password");
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let envelope = seal("smtp-password", KEY);
        let other = b"fedcba9876543210fedcba9876543210";
        assert_eq!(
            decrypt_secret(&envelope, other),
            Err(SecretError::Authentication)
        );
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(
            decrypt_secret("***", KEY),
            Err(SecretError::Encoding)
        );
        assert_eq!(
            decrypt_secret(&URL_SAFE.encode([1u8; 4]), KEY),
            Err(SecretError::Truncated)
        );
        assert_eq!(
            decrypt_secret(&seal("x", KEY), b"short"),
            Err(SecretError::KeyLength(5))
        );
    }
}
