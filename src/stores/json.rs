//! The structured JSON codec.
//!
//! One JSON object per document: nested objects map to branch values,
//! scalars to scalar values.  JSON has no comment syntax, so comment
//! items are encoded as reserved `"#comment-<n>"` members whose value
//! is the comment text.  Encrypted documents carry their metadata as a
//! native-typed `"sealbox"` member — booleans stay booleans here, the
//! string coercion table is a dotenv-side concern.
//!
//! Member order is preserved on load and emit (serde_json's
//! `preserve_order` feature), keeping the round-trip lossless.

use serde_json::Map;

use crate::codec;
use crate::errors::{Result, SealboxError};
use crate::metadata::Metadata;
use crate::stores::Store;
use crate::tree::{Key, Tree, TreeBranch, TreeItem, Value};

/// Reserved member name for the metadata block.
pub const METADATA_KEY: &str = "sealbox";

/// Reserved member-name prefix for encoded comments.
const COMMENT_PREFIX: &str = "#comment-";

/// The JSON codec.  Stateless; construct freely.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonStore;

// ---------------------------------------------------------------------------
// JSON <-> tree conversion
// ---------------------------------------------------------------------------

fn branch_from_object(object: &Map<String, serde_json::Value>) -> Result<TreeBranch> {
    let mut branch = TreeBranch::new();
    for (name, json) in object {
        if name.starts_with(COMMENT_PREFIX) {
            let text = json.as_str().ok_or_else(|| {
                SealboxError::InvalidDocument(format!("comment member '{name}' is not a string"))
            })?;
            branch.push(TreeItem::comment(text));
        } else {
            branch.push(TreeItem::pair(name, value_from_json(name, json)?));
        }
    }
    Ok(branch)
}

fn value_from_json(name: &str, json: &serde_json::Value) -> Result<Value> {
    match json {
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float(f))
            } else {
                Err(SealboxError::InvalidDocument(format!(
                    "number at '{name}' does not fit the value model"
                )))
            }
        }
        serde_json::Value::Object(inner) => Ok(Value::Branch(branch_from_object(inner)?)),
        serde_json::Value::Array(_) => Err(SealboxError::InvalidDocument(format!(
            "arrays are not supported (member '{name}')"
        ))),
        serde_json::Value::Null => Err(SealboxError::InvalidDocument(format!(
            "null values are not supported (member '{name}')"
        ))),
    }
}

fn branch_to_object(branch: &TreeBranch) -> Result<Map<String, serde_json::Value>> {
    let mut object = Map::new();
    let mut comment_counter = 0usize;
    for item in branch {
        match &item.key {
            Key::Comment(text) => {
                object.insert(
                    format!("{COMMENT_PREFIX}{comment_counter}"),
                    serde_json::Value::String(text.clone()),
                );
                comment_counter += 1;
            }
            Key::Plain(name) => {
                let value = item.value.as_ref().ok_or_else(|| {
                    SealboxError::InvalidDocument(format!("data item '{name}' has no value"))
                })?;
                object.insert(name.clone(), value_to_json(value)?);
            }
        }
    }
    Ok(object)
}

fn value_to_json(value: &Value) -> Result<serde_json::Value> {
    match value {
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Int(i) => Ok(serde_json::Value::from(*i)),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| {
                SealboxError::Serialization(format!("float {f} is not representable in JSON"))
            }),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Branch(inner) => Ok(serde_json::Value::Object(branch_to_object(inner)?)),
    }
}

impl JsonStore {
    fn parse_object(&self, bytes: &[u8]) -> Result<Map<String, serde_json::Value>> {
        let document: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| SealboxError::InvalidDocument(format!("invalid JSON: {e}")))?;
        match document {
            serde_json::Value::Object(object) => Ok(object),
            other => Err(SealboxError::InvalidDocument(format!(
                "expected a top-level JSON object, got {other}"
            ))),
        }
    }

    fn single_branch<'a>(&self, branches: &'a [TreeBranch]) -> Result<&'a TreeBranch> {
        match branches {
            [branch] => Ok(branch),
            _ => Err(SealboxError::InvalidDocument(format!(
                "a JSON document holds exactly one branch, got {}",
                branches.len()
            ))),
        }
    }

    fn render(&self, object: &Map<String, serde_json::Value>) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(object)
            .map_err(|e| SealboxError::Serialization(e.to_string()))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

impl Store for JsonStore {
    fn load_plain_file(&self, bytes: &[u8]) -> Result<Vec<TreeBranch>> {
        Ok(vec![branch_from_object(&self.parse_object(bytes)?)?])
    }

    fn emit_plain_file(&self, branches: &[TreeBranch]) -> Result<Vec<u8>> {
        let object = branch_to_object(self.single_branch(branches)?)?;
        self.render(&object)
    }

    fn emit_value(&self, value: &Value) -> Result<Vec<u8>> {
        codec::emit_value(value)
    }

    fn load_encrypted_file(&self, bytes: &[u8]) -> Result<Tree> {
        let mut object = self.parse_object(bytes)?;

        let metadata: Metadata = match object.remove(METADATA_KEY) {
            Some(member) => serde_json::from_value(member)
                .map_err(|e| SealboxError::MetadataField(e.to_string()))?,
            None => return Err(SealboxError::NoKeysFound),
        };
        if !metadata.has_key_sources() {
            return Err(SealboxError::NoKeysFound);
        }

        Ok(Tree {
            branches: vec![branch_from_object(&object)?],
            metadata,
        })
    }

    fn emit_encrypted_file(&self, tree: &Tree) -> Result<Vec<u8>> {
        let mut object = branch_to_object(self.single_branch(&tree.branches)?)?;
        let metadata = serde_json::to_value(&tree.metadata)
            .map_err(|e| SealboxError::Serialization(e.to_string()))?;
        object.insert(METADATA_KEY.to_string(), metadata);
        self.render(&object)
    }
}
