//! Integrity MAC over the plaintext values of a tree.
//!
//! The MAC is HMAC-SHA256 over the concatenation, in document order, of
//! every plaintext scalar leaf value — comments and branch containers
//! excluded, `_unencrypted` items included, so tampering with an exempt
//! plaintext value is still detected.  The HMAC key is derived from the
//! data key with HKDF-SHA256 so the data key itself is never used for
//! two purposes.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::codec;
use crate::crypto::keys::DataKey;
use crate::errors::{Result, SealboxError};
use crate::tree::{for_each_scalar, TreeBranch};

/// Length of derived sub-keys (256 bits).
const KEY_LEN: usize = 32;

/// HKDF context string binding the derived key to its purpose.
const MAC_KEY_INFO: &[u8] = b"sealbox-mac-key";

/// Derive the HMAC key from the data key.
fn derive_mac_key(data_key: &DataKey) -> Result<[u8; KEY_LEN]> {
    // `salt` is None — HKDF uses a zero-filled salt internally.  The
    // data key is already uniform random, so extract adds nothing.
    let hk = Hkdf::<Sha256>::new(None, data_key.as_bytes());

    let mut okm = [0u8; KEY_LEN];
    hk.expand(MAC_KEY_INFO, &mut okm)
        .map_err(|e| SealboxError::MacError(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// Compute the MAC over all plaintext scalar leaves of `branches`.
///
/// Returns the tag as an uppercase hex string.  The traversal order is
/// the shared document order from [`for_each_scalar`], identical on the
/// encrypt and decrypt paths.
pub fn compute_mac(branches: &[TreeBranch], data_key: &DataKey) -> Result<String> {
    let mut mac_key = derive_mac_key(data_key)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(&mac_key)
        .map_err(|e| SealboxError::MacError(format!("invalid HMAC key: {e}")))?;
    mac_key.zeroize();

    for_each_scalar(branches, &mut |_, _, value| {
        mac.update(&codec::emit_value(value)?);
        Ok(())
    })?;

    Ok(hex_upper(&mac.finalize().into_bytes()))
}

/// Compare two MAC hex strings in constant time.
pub fn macs_equal(a: &str, b: &str) -> bool {
    // `ct_eq` requires equal lengths; a length difference is already a
    // mismatch and leaks nothing secret.
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn hex_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out
}
