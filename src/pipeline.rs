//! The envelope-encryption pipeline.
//!
//! `encrypt_tree` and `decrypt_tree` transform a tree in place between
//! its plaintext and ciphertext forms.  Both passes stage their work on
//! a copy of the branches and commit only on success, so a failed or
//! cancelled operation never leaves a partially-transformed tree behind.
//!
//! Which values are touched:
//! - every scalar leaf is encryption-eligible, *except* items whose key
//!   carries the reserved `_unencrypted` suffix — on a branch-valued
//!   key the suffix exempts the whole subtree beneath it;
//! - comments and branch containers are never encrypted;
//! - in `mac_only_encrypted` mode values stay in plaintext and only the
//!   MAC is protected by encryption.
//!
//! Ciphertext values travel as `ENC[<type>:<base64>]` strings.  The type
//! tag records the original scalar shape so typed formats recover an
//! integer as an integer, not a string.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Timelike, Utc};
use tracing::debug;

use crate::codec;
use crate::crypto::cipher::Cipher;
use crate::crypto::keys::{DataKey, KeySource};
use crate::crypto::mac::{compute_mac, macs_equal};
use crate::errors::{Result, SealboxError};
use crate::metadata::FORMAT_VERSION;
use crate::tree::{for_each_scalar_mut, Tree, Value};

/// Associated-data context for the sealed MAC itself.
const MAC_CONTEXT: &str = "sealbox:mac";

/// Encrypt every eligible leaf of `tree` and store the sealed MAC.
///
/// Obtains a fresh data key from `key_source` (which records its wrapped
/// form in the metadata), computes the MAC over the plaintext values
/// first, then replaces each eligible value with its ciphertext
/// envelope.  Stamps `version` and `last_modified`.
pub fn encrypt_tree(
    tree: &mut Tree,
    key_source: &dyn KeySource,
    cipher: &dyn Cipher,
) -> Result<()> {
    let mut metadata = tree.metadata.clone();
    let data_key = key_source.generate_data_key(&mut metadata)?;

    // MAC over plaintext, before any value is replaced.
    let mac = compute_mac(&tree.branches, &data_key)?;

    let mut branches = tree.branches.clone();
    let mut sealed_count = 0usize;
    if !metadata.mac_only_encrypted {
        for_each_scalar_mut(&mut branches, &mut |path, eligible, value| {
            if !eligible {
                return Ok(());
            }
            *value = seal_scalar(cipher, &data_key, path, value)?;
            sealed_count += 1;
            Ok(())
        })?;
    }

    let sealed_mac = cipher.seal(&data_key, MAC_CONTEXT, mac.as_bytes())?;
    metadata.mac = Some(format!("ENC[str:{}]", BASE64.encode(&sealed_mac)));
    metadata.version = FORMAT_VERSION.to_string();
    // Truncated to whole seconds: the textual form is second-precision,
    // and the round-trip invariant needs both to agree.
    metadata.last_modified = Utc::now().with_nanosecond(0);

    debug!(
        values = sealed_count,
        mac_only = metadata.mac_only_encrypted,
        "encrypted tree"
    );

    tree.branches = branches;
    tree.metadata = metadata;
    Ok(())
}

/// Decrypt every eligible leaf of `tree` and verify the stored MAC.
///
/// Resolves the data key from the metadata, opens each ciphertext
/// envelope in place, then opens the stored MAC and recomputes it over
/// the recovered plaintext in the same document order.  On any
/// disagreement the tree is left untouched and `MacMismatch` is
/// returned — a partially-decrypted tree is never observable.
pub fn decrypt_tree(
    tree: &mut Tree,
    key_source: &dyn KeySource,
    cipher: &dyn Cipher,
) -> Result<()> {
    let data_key = key_source.resolve_data_key(&tree.metadata)?;

    let sealed_mac = tree
        .metadata
        .mac
        .as_deref()
        .ok_or_else(|| SealboxError::MacError("document carries no MAC".into()))?;

    let mut branches = tree.branches.clone();
    let mut opened_count = 0usize;
    if !tree.metadata.mac_only_encrypted {
        for_each_scalar_mut(&mut branches, &mut |path, eligible, value| {
            if !eligible {
                return Ok(());
            }
            *value = open_scalar(cipher, &data_key, path, value)?;
            opened_count += 1;
            Ok(())
        })?;
    }

    let (tag, payload) = parse_envelope(sealed_mac)?;
    if tag != "str" {
        return Err(SealboxError::MalformedCiphertext(format!(
            "stored MAC has unexpected type tag '{tag}'"
        )));
    }
    let stored_mac_bytes = cipher.open(&data_key, MAC_CONTEXT, &payload)?;
    let stored_mac = String::from_utf8(stored_mac_bytes)
        .map_err(|_| SealboxError::MacError("decrypted MAC is not valid UTF-8".into()))?;

    let recomputed = compute_mac(&branches, &data_key)?;
    if !macs_equal(&stored_mac, &recomputed) {
        return Err(SealboxError::MacMismatch);
    }

    debug!(
        values = opened_count,
        mac_only = tree.metadata.mac_only_encrypted,
        "decrypted tree, MAC verified"
    );

    tree.branches = branches;
    Ok(())
}

// ---------------------------------------------------------------------------
// Ciphertext envelopes
// ---------------------------------------------------------------------------

fn seal_scalar(
    cipher: &dyn Cipher,
    data_key: &DataKey,
    path: &str,
    value: &Value,
) -> Result<Value> {
    // Strings are sealed as their raw bytes — newline escaping is a
    // line-format serialization concern, and the ciphertext only ever
    // travels base64-encoded.  Escaping here would turn a literal `\n`
    // two-character sequence into a real newline on the way back out.
    let (tag, payload) = match value {
        Value::String(s) => ("str", s.clone().into_bytes()),
        Value::Int(_) => ("int", codec::emit_value(value)?),
        Value::Float(_) => ("float", codec::emit_value(value)?),
        Value::Bool(_) => ("bool", codec::emit_value(value)?),
        Value::Branch(_) => return Err(SealboxError::UnsupportedValueType(value.kind())),
    };
    let sealed = cipher.seal(data_key, path, &payload)?;
    Ok(Value::String(format!(
        "ENC[{tag}:{}]",
        BASE64.encode(&sealed)
    )))
}

fn open_scalar(
    cipher: &dyn Cipher,
    data_key: &DataKey,
    path: &str,
    value: &Value,
) -> Result<Value> {
    let envelope = match value {
        Value::String(s) => s.as_str(),
        other => {
            return Err(SealboxError::MalformedCiphertext(format!(
                "value at '{path}' is a plaintext {}, expected an ENC[...] envelope",
                other.kind()
            )))
        }
    };
    let (tag, payload) = parse_envelope(envelope).map_err(|_| {
        SealboxError::MalformedCiphertext(format!(
            "value at '{path}' is not an ENC[...] envelope"
        ))
    })?;

    let plaintext = cipher.open(data_key, path, &payload)?;
    let text = String::from_utf8(plaintext).map_err(|_| {
        SealboxError::MalformedCiphertext(format!("decrypted value at '{path}' is not UTF-8"))
    })?;

    match tag {
        "str" => Ok(Value::String(text)),
        "int" => text.parse().map(Value::Int).map_err(|_| {
            SealboxError::MalformedCiphertext(format!("'{text}' at '{path}' is not an integer"))
        }),
        "float" => text.parse().map(Value::Float).map_err(|_| {
            SealboxError::MalformedCiphertext(format!("'{text}' at '{path}' is not a float"))
        }),
        "bool" => match text.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(SealboxError::MalformedCiphertext(format!(
                "'{text}' at '{path}' is not a boolean"
            ))),
        },
        other => Err(SealboxError::MalformedCiphertext(format!(
            "unknown envelope type tag '{other}' at '{path}'"
        ))),
    }
}

/// Split an `ENC[<type>:<base64>]` envelope into its tag and raw bytes.
fn parse_envelope(envelope: &str) -> Result<(&str, Vec<u8>)> {
    let inner = envelope
        .strip_prefix("ENC[")
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| {
            SealboxError::MalformedCiphertext(format!("'{envelope}' is not an ENC[...] envelope"))
        })?;
    let (tag, b64) = inner.split_once(':').ok_or_else(|| {
        SealboxError::MalformedCiphertext(format!("envelope '{envelope}' has no type tag"))
    })?;
    let payload = BASE64
        .decode(b64)
        .map_err(|e| SealboxError::MalformedCiphertext(format!("invalid base64: {e}")))?;
    Ok((tag, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parse_roundtrip() {
        let payload = b"\x01\x02\x03";
        let envelope = format!("ENC[str:{}]", BASE64.encode(payload));
        let (tag, bytes) = parse_envelope(&envelope).unwrap();
        assert_eq!(tag, "str");
        assert_eq!(bytes, payload);
    }

    #[test]
    fn envelope_rejects_garbage() {
        assert!(parse_envelope("not an envelope").is_err());
        assert!(parse_envelope("ENC[no-tag]").is_err());
        assert!(parse_envelope("ENC[str:!!!]").is_err());
    }
}
