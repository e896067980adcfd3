//! Encryption of external-datastore passwords at rest.
//!
//! Connection passwords never touch the app store in plaintext. They are
//! encrypted with AES-256 (PKCS7-padded) under a key derived from the
//! operator-configured secret, and base64-encoded for storage.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;

const BLOCK_SIZE: usize = 16;

/// Errors from credential encryption or decryption.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The stored ciphertext is not valid base64.
    #[error("stored password is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decrypted bytes are not valid UTF-8 (wrong key, or corrupted
    /// ciphertext).
    #[error("decryption produced invalid UTF-8; is the encryption key correct?")]
    InvalidPlaintext,

    /// The ciphertext length is not a whole number of cipher blocks.
    #[error("stored password has invalid length {0}")]
    InvalidLength(usize),
}

/// Encrypts and decrypts connection passwords.
#[derive(Clone)]
pub struct CredentialCipher {
    key: [u8; 32],
}

impl CredentialCipher {
    /// Creates a cipher from the operator-configured secret string.
    pub fn new(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"tablewatch::credentials::");
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();

        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypts a plaintext password to its base64 storage form.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let cipher = Aes256::new(GenericArray::from_slice(&self.key));
        let data = plaintext.as_bytes();

        // PKCS7: always pad, even on block-aligned input.
        let padding_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
        let mut padded = data.to_vec();
        padded.extend(std::iter::repeat(padding_len as u8).take(padding_len));

        let mut encrypted = Vec::with_capacity(padded.len());
        for chunk in padded.chunks(BLOCK_SIZE) {
            let mut block = GenericArray::clone_from_slice(chunk);
            cipher.encrypt_block(&mut block);
            encrypted.extend_from_slice(&block);
        }

        BASE64.encode(encrypted)
    }

    /// Decrypts a stored base64 ciphertext back to the plaintext password.
    pub fn decrypt(&self, stored: &str) -> Result<String, CipherError> {
        let data = BASE64.decode(stored.trim())?;
        if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
            return Err(CipherError::InvalidLength(data.len()));
        }

        let cipher = Aes256::new(GenericArray::from_slice(&self.key));
        let mut decrypted = Vec::with_capacity(data.len());
        for chunk in data.chunks(BLOCK_SIZE) {
            let mut block = GenericArray::clone_from_slice(chunk);
            cipher.decrypt_block(&mut block);
            decrypted.extend_from_slice(&block);
        }

        // Strip PKCS7 padding.
        match decrypted.last().copied() {
            Some(pad) if pad as usize >= 1 && pad as usize <= BLOCK_SIZE => {
                let pad = pad as usize;
                let body = decrypted.len() - pad;
                if decrypted[body..].iter().all(|&b| b as usize == pad) {
                    decrypted.truncate(body);
                } else {
                    return Err(CipherError::InvalidPlaintext);
                }
            }
            _ => return Err(CipherError::InvalidPlaintext),
        }

        String::from_utf8(decrypted).map_err(|_| CipherError::InvalidPlaintext)
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let cipher = CredentialCipher::new("unit-test-secret");
        for plaintext in ["", "p", "exactly sixteen!", "a much longer password with spaces"] {
            let stored = cipher.encrypt(plaintext);
            assert_ne!(stored, plaintext);
            assert_eq!(cipher.decrypt(&stored).unwrap(), plaintext);
        }
    }

    #[test]
    fn wrong_key_fails_closed() {
        let stored = CredentialCipher::new("key-a").encrypt("hunter2");
        let result = CredentialCipher::new("key-b").decrypt(&stored);
        // Either padding/UTF-8 validation rejects it, or the plaintext is
        // garbage; it must never decrypt to the original.
        assert!(result.map(|p| p != "hunter2").unwrap_or(true));
    }

    #[test]
    fn garbage_ciphertext_is_rejected() {
        let cipher = CredentialCipher::new("key");
        assert!(cipher.decrypt("not base64 !!!").is_err());
        assert!(cipher.decrypt(&BASE64.encode(b"short")).is_err());
    }
}
