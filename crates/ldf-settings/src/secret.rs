//! AEAD secret encryption for settings flagged `sensitive`.
//!
//! Encrypted values carry the prefix `enc:v1:` followed by
//! `base64(nonce || ciphertext)`. Decryption is a passthrough when the
//! prefix is absent, so plaintext values written before encryption was
//! enabled keep working.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;

use crate::master_key::KEY_LEN;

pub const ENCRYPTED_PREFIX: &str = "enc:v1:";
const NONCE_LEN: usize = 12;

/// Encrypts `plaintext` under `key`, returning an `enc:v1:`-prefixed value.
pub fn encrypt(plaintext: &str, key: &[u8; KEY_LEN]) -> anyhow::Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key)?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| anyhow::anyhow!("secret encryption failed: {e:?}"))?;

    let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    payload.extend_from_slice(&nonce_bytes);
    payload.extend_from_slice(&ciphertext);

    Ok(format!("{ENCRYPTED_PREFIX}{}", BASE64.encode(payload)))
}

/// Decrypts a value previously produced by [`encrypt`]. Values without the
/// `enc:v1:` prefix are returned unchanged.
pub fn decrypt(value: &str, key: &[u8; KEY_LEN]) -> anyhow::Result<String> {
    let Some(encoded) = value.strip_prefix(ENCRYPTED_PREFIX) else {
        return Ok(value.to_string());
    };

    let payload = BASE64.decode(encoded)?;
    if payload.len() < NONCE_LEN {
        anyhow::bail!("encrypted setting value is truncated");
    }
    let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(key)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| anyhow::anyhow!("secret decryption failed: {e:?}"))?;

    Ok(String::from_utf8(plaintext)?)
}

/// True if `value` carries the `enc:v1:` prefix.
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> [u8; KEY_LEN] {
        [7u8; KEY_LEN]
    }

    #[test]
    fn roundtrips_through_encrypt_and_decrypt() {
        let encrypted = encrypt("super-secret", &key()).unwrap();
        assert!(is_encrypted(&encrypted));
        assert_eq!(decrypt(&encrypted, &key()).unwrap(), "super-secret");
    }

    #[test]
    fn two_encryptions_of_the_same_value_differ() {
        let a = encrypt("same", &key()).unwrap();
        let b = encrypt("same", &key()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn decrypt_is_a_passthrough_without_the_prefix() {
        assert_eq!(decrypt("plain-value", &key()).unwrap(), "plain-value");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let encrypted = encrypt("secret", &key()).unwrap();
        let wrong_key = [9u8; KEY_LEN];
        assert!(decrypt(&encrypted, &wrong_key).is_err());
    }
}
