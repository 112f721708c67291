//! Encryption metadata attached to a tree, and the coercion layer that
//! maps it to/from string-only host formats.
//!
//! In memory the metadata is strongly typed (`bool` flags, timestamps).
//! Purely textual formats such as dotenv cannot distinguish a boolean
//! from a string, so each typed field carries a decode/encode pair in a
//! descriptor table ([`FIELD_CODECS`]).  Adding a typed field is a table
//! entry, not new branching logic.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SealboxError};
use crate::tree::Value;

/// Version string stamped into metadata by the encrypt pipeline.
pub const FORMAT_VERSION: &str = "1.0";

/// A data key wrapped for one recipient by a key-management collaborator.
///
/// The `enc` blob is opaque to the core — only the collaborator that
/// produced it can unwrap it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// Identifier of the recipient/backend that can unwrap this entry.
    pub recipient: String,
    /// The wrapped data key (base64 text).
    pub enc: String,
}

/// Encryption parameters attached once per tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Format version of the encrypted document.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// When the document was last encrypted (RFC 3339 in text formats).
    #[serde(rename = "lastmodified", default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    /// The MAC over all plaintext scalar values, stored in its encrypted
    /// `ENC[...]` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    /// When set, individual values stay in plaintext and only the MAC is
    /// protected by encryption.
    #[serde(default)]
    pub mac_only_encrypted: bool,

    /// Wrapped data key entries, one per recipient.
    #[serde(rename = "keys", default, skip_serializing_if = "Vec::is_empty")]
    pub key_sources: Vec<WrappedKey>,
}

impl Metadata {
    /// Whether any wrapped data key material is present.
    pub fn has_key_sources(&self) -> bool {
        !self.key_sources.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Typed-field-descriptor table
// ---------------------------------------------------------------------------

/// One typed metadata field and its string-format coercion pair.
struct FieldCodec {
    name: &'static str,
    decode: fn(&mut Metadata, &Value) -> Result<()>,
    encode: fn(&Metadata) -> Option<Value>,
}

/// Scalar metadata fields, in canonical emission order.
///
/// Wrapped key entries are list-shaped and handled separately
/// (`key_<index>__recipient` / `key_<index>__enc` in flat formats).
const FIELD_CODECS: &[FieldCodec] = &[
    FieldCodec {
        name: "version",
        decode: |md, v| {
            md.version = expect_string("version", v)?;
            Ok(())
        },
        encode: |md| (!md.version.is_empty()).then(|| Value::String(md.version.clone())),
    },
    FieldCodec {
        name: "lastmodified",
        decode: |md, v| {
            let raw = expect_string("lastmodified", v)?;
            let parsed = DateTime::parse_from_rfc3339(&raw).map_err(|e| {
                SealboxError::MetadataField(format!("cannot parse lastmodified '{raw}': {e}"))
            })?;
            md.last_modified = Some(parsed.with_timezone(&Utc));
            Ok(())
        },
        encode: |md| {
            md.last_modified
                .map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::Secs, true)))
        },
    },
    FieldCodec {
        name: "mac",
        decode: |md, v| {
            md.mac = Some(expect_string("mac", v)?);
            Ok(())
        },
        encode: |md| md.mac.clone().map(Value::String),
    },
    FieldCodec {
        name: "mac_only_encrypted",
        decode: |md, v| {
            md.mac_only_encrypted = match v {
                Value::Bool(b) => *b,
                Value::String(s) => match s.as_str() {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(SealboxError::UnrecognizedValue {
                            field: "mac_only_encrypted".to_string(),
                            value: other.to_string(),
                        })
                    }
                },
                other => {
                    return Err(SealboxError::MetadataField(format!(
                        "mac_only_encrypted must be a boolean or string, got a {}",
                        other.kind()
                    )))
                }
            };
            Ok(())
        },
        // Emitted unconditionally so an encrypted document always states
        // its mode explicitly.
        encode: |md| Some(Value::Bool(md.mac_only_encrypted)),
    },
];

fn expect_string(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(SealboxError::MetadataField(format!(
            "{field} must be a string, got a {}",
            other.kind()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Mapping <-> Metadata
// ---------------------------------------------------------------------------

/// Reconstruct typed [`Metadata`] from a string-keyed field mapping.
///
/// Fields absent from the mapping keep their documented defaults
/// (`false` for `mac_only_encrypted`).  A reserved field name the
/// descriptor table does not know is an error — silently keeping it
/// would make round-trips lossy without the operator noticing.
pub fn map_to_metadata(fields: &[(String, Value)]) -> Result<Metadata> {
    let mut metadata = Metadata::default();
    // index -> (recipient, enc), ordered by index.
    let mut key_parts: BTreeMap<usize, (Option<String>, Option<String>)> = BTreeMap::new();

    for (name, value) in fields {
        if let Some(rest) = name.strip_prefix("key_") {
            decode_key_part(rest, value, &mut key_parts)?;
            continue;
        }
        match FIELD_CODECS.iter().find(|c| c.name == name.as_str()) {
            Some(codec) => (codec.decode)(&mut metadata, value)?,
            None => {
                return Err(SealboxError::MetadataField(format!(
                    "unknown metadata field '{name}'"
                )))
            }
        }
    }

    for (index, (recipient, enc)) in key_parts {
        match (recipient, enc) {
            (Some(recipient), Some(enc)) => {
                metadata.key_sources.push(WrappedKey { recipient, enc });
            }
            _ => {
                return Err(SealboxError::MetadataField(format!(
                    "wrapped key entry {index} is missing its recipient or enc part"
                )))
            }
        }
    }

    Ok(metadata)
}

fn decode_key_part(
    rest: &str,
    value: &Value,
    key_parts: &mut BTreeMap<usize, (Option<String>, Option<String>)>,
) -> Result<()> {
    let (index_str, field) = rest.split_once("__").ok_or_else(|| {
        SealboxError::MetadataField(format!("malformed wrapped key field 'key_{rest}'"))
    })?;
    let index: usize = index_str.parse().map_err(|_| {
        SealboxError::MetadataField(format!("malformed wrapped key index in 'key_{rest}'"))
    })?;
    let text = expect_string(field, value)?;
    let entry = key_parts.entry(index).or_default();
    match field {
        "recipient" => entry.0 = Some(text),
        "enc" => entry.1 = Some(text),
        other => {
            return Err(SealboxError::MetadataField(format!(
                "unknown wrapped key field '{other}'"
            )))
        }
    }
    Ok(())
}

/// Flatten typed [`Metadata`] into an ordered string-keyed field mapping.
///
/// Field order follows the descriptor table, then wrapped key entries by
/// index, so emission is deterministic.
pub fn metadata_to_map(metadata: &Metadata) -> Vec<(String, Value)> {
    let mut fields = Vec::new();
    for codec in FIELD_CODECS {
        if let Some(value) = (codec.encode)(metadata) {
            fields.push((codec.name.to_string(), value));
        }
    }
    for (index, key) in metadata.key_sources.iter().enumerate() {
        fields.push((
            format!("key_{index}__recipient"),
            Value::String(key.recipient.clone()),
        ));
        fields.push((format!("key_{index}__enc"), Value::String(key.enc.clone())));
    }
    fields
}
