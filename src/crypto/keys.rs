//! Data keys and the key-management collaborator interface.
//!
//! Each document is encrypted under one symmetric **data key**.  The
//! data key itself never appears in the file: a [`KeySource`] wraps it
//! for one or more recipients and records the wrapped forms in the
//! document metadata, then unwraps one of them again on decrypt.
//!
//! The core treats key material as opaque — it passes bytes to the
//! cipher primitive and nothing else.

use rand::RngCore;
use zeroize::Zeroize;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use argon2::{Algorithm, Argon2, Params, Version};

use crate::crypto::cipher::{Aes256GcmCipher, Cipher};
use crate::errors::{Result, SealboxError};
use crate::metadata::{Metadata, WrappedKey};

/// Length of a data key in bytes (256 bits, for AES-256).
const KEY_LEN: usize = 32;

/// Length of the KDF salt in bytes (256 bits).
const SALT_LEN: usize = 32;

/// A 32-byte symmetric data key that zeroes its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct DataKey {
    bytes: [u8; KEY_LEN],
}

impl DataKey {
    /// Wrap raw bytes as a `DataKey`.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Mint a fresh random data key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Access the raw key bytes (e.g. to pass to the cipher or HKDF).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

/// The key-management collaborator.
///
/// `generate_data_key` is the encrypt path: mint a fresh data key, wrap
/// it, and record the wrapped form in `metadata.key_sources`.
/// `resolve_data_key` is the decrypt path: unwrap one of the recorded
/// entries.  Either call is a single synchronous unit of work per
/// document — retry and backoff policy belongs to the implementation,
/// never to the pipeline.
pub trait KeySource {
    fn generate_data_key(&self, metadata: &mut Metadata) -> Result<DataKey>;
    fn resolve_data_key(&self, metadata: &Metadata) -> Result<DataKey>;
}

// ---------------------------------------------------------------------------
// Passphrase-based key source
// ---------------------------------------------------------------------------

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Configurable Argon2id parameters for the passphrase key source.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// A local key-management collaborator that wraps the data key under a
/// key-encryption key derived from a passphrase with Argon2id.
///
/// Wrapped blob layout, base64-encoded into the metadata entry:
///   [ 32-byte salt | 12-byte nonce | ciphertext + 16-byte auth tag ]
pub struct PassphraseKeySource {
    recipient: String,
    passphrase: Vec<u8>,
    params: Argon2Params,
}

impl PassphraseKeySource {
    pub fn new(recipient: impl Into<String>, passphrase: &[u8]) -> Self {
        Self::with_params(recipient, passphrase, Argon2Params::default())
    }

    /// Use explicit Argon2id parameters (e.g. lighter settings in tests).
    pub fn with_params(
        recipient: impl Into<String>,
        passphrase: &[u8],
        params: Argon2Params,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            passphrase: passphrase.to_vec(),
            params,
        }
    }

    /// Derive the key-encryption key from the passphrase and a salt.
    ///
    /// The same passphrase + salt + params always produce the same KEK.
    /// Enforces minimum parameters to prevent dangerously weak settings.
    fn derive_kek(&self, salt: &[u8]) -> Result<DataKey> {
        if self.params.memory_kib < MIN_MEMORY_KIB {
            return Err(SealboxError::KeyDerivationFailed(format!(
                "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
                self.params.memory_kib
            )));
        }
        if self.params.iterations < 1 {
            return Err(SealboxError::KeyDerivationFailed(
                "Argon2 iterations must be at least 1".into(),
            ));
        }
        if self.params.parallelism < 1 {
            return Err(SealboxError::KeyDerivationFailed(
                "Argon2 parallelism must be at least 1".into(),
            ));
        }

        let params = Params::new(
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| SealboxError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut kek = [0u8; KEY_LEN];
        argon2
            .hash_password_into(&self.passphrase, salt, &mut kek)
            .map_err(|e| {
                SealboxError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}"))
            })?;

        let key = DataKey::new(kek);
        kek.zeroize();
        Ok(key)
    }
}

impl Drop for PassphraseKeySource {
    fn drop(&mut self) {
        self.passphrase.zeroize();
    }
}

impl KeySource for PassphraseKeySource {
    fn generate_data_key(&self, metadata: &mut Metadata) -> Result<DataKey> {
        let data_key = DataKey::generate();

        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);

        let kek = self.derive_kek(&salt)?;

        // Bind the wrapped blob to the recipient name so entries cannot
        // be swapped between recipients.
        let sealed = Aes256GcmCipher.seal(&kek, &self.recipient, data_key.as_bytes())?;

        let mut blob = Vec::with_capacity(SALT_LEN + sealed.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&sealed);

        metadata.key_sources.push(WrappedKey {
            recipient: self.recipient.clone(),
            enc: BASE64.encode(&blob),
        });

        Ok(data_key)
    }

    fn resolve_data_key(&self, metadata: &Metadata) -> Result<DataKey> {
        if !metadata.has_key_sources() {
            return Err(SealboxError::NoKeysFound);
        }

        for entry in &metadata.key_sources {
            if entry.recipient != self.recipient {
                continue;
            }

            let blob = BASE64.decode(&entry.enc).map_err(|e| {
                SealboxError::KeySource(format!("wrapped key is not valid base64: {e}"))
            })?;
            if blob.len() <= SALT_LEN {
                return Err(SealboxError::KeySource(
                    "wrapped key blob is too short".into(),
                ));
            }

            let (salt, sealed) = blob.split_at(SALT_LEN);
            let kek = self.derive_kek(salt)?;

            let mut unwrapped = Aes256GcmCipher.open(&kek, &self.recipient, sealed)?;
            let bytes: [u8; KEY_LEN] = unwrapped.as_slice().try_into().map_err(|_| {
                SealboxError::KeySource(format!(
                    "unwrapped data key is {} bytes, expected {KEY_LEN}",
                    unwrapped.len()
                ))
            })?;
            unwrapped.zeroize();

            return Ok(DataKey::new(bytes));
        }

        Err(SealboxError::KeySource(format!(
            "no wrapped key entry for recipient '{}'",
            self.recipient
        )))
    }
}
