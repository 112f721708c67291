//! Cryptographic collaborators for sealbox.
//!
//! This module provides:
//! - The `Cipher` trait and AES-256-GCM default implementation (`cipher`)
//! - Data keys and the `KeySource` collaborator interface (`keys`)
//! - The tree-order integrity MAC (`mac`)

pub mod cipher;
pub mod keys;
pub mod mac;

// Re-export the most commonly used items.
pub use cipher::{Aes256GcmCipher, Cipher};
pub use keys::{Argon2Params, DataKey, KeySource, PassphraseKeySource};
pub use mac::{compute_mac, macs_equal};
