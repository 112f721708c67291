//! AES-256-GCM authenticated encryption with associated data.
//!
//! Each call to `seal` generates a fresh random 12-byte nonce and
//! prepends it to the ciphertext.  `open` splits the nonce back out
//! before decrypting.  The associated data is the item's tree path,
//! which binds a ciphertext to its position in the document — a blob
//! copied from one key to another fails authentication.
//!
//! Layout of the returned byte buffer:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::crypto::keys::DataKey;
use crate::errors::{Result, SealboxError};

/// Size of the AES-256-GCM nonce in bytes.
const NONCE_LEN: usize = 12;

/// The cipher primitive collaborator.
///
/// The pipeline never inspects key bytes beyond handing them here, and
/// treats authentication failures as fatal to the whole operation.
pub trait Cipher {
    /// Encrypt `plaintext`, binding it to `associated_data`.
    fn seal(&self, key: &DataKey, associated_data: &str, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt data produced by `seal` under the same associated data.
    fn open(&self, key: &DataKey, associated_data: &str, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// The default cipher: AES-256-GCM with a random nonce per seal.
#[derive(Debug, Default, Clone, Copy)]
pub struct Aes256GcmCipher;

impl Cipher for Aes256GcmCipher {
    fn seal(&self, key: &DataKey, associated_data: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| SealboxError::EncryptionFailed(format!("invalid key length: {e}")))?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: associated_data.as_bytes(),
                },
            )
            .map_err(|e| SealboxError::EncryptionFailed(format!("encryption error: {e}")))?;

        // Prepend the nonce so the caller only needs to store one blob.
        let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    fn open(&self, key: &DataKey, associated_data: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        // Make sure we have at least a nonce worth of bytes.
        if ciphertext.len() < NONCE_LEN {
            return Err(SealboxError::MalformedCiphertext(format!(
                "blob is {} bytes, shorter than the {NONCE_LEN}-byte nonce",
                ciphertext.len()
            )));
        }

        let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| SealboxError::AuthenticationFailed)?;

        cipher
            .decrypt(
                nonce,
                Payload {
                    msg: body,
                    aad: associated_data.as_bytes(),
                },
            )
            .map_err(|_| SealboxError::AuthenticationFailed)
    }
}
