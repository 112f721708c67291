//! The line-oriented dotenv codec — the reference `Store` instance.
//!
//! Plaintext grammar, one record per line:
//! - `#text`      → a comment item (text preserved verbatim, no value)
//! - `KEY=VALUE`  → a string item (VALUE unescaped per the value codec)
//! - blank lines  → skipped without emitting an item
//! - anything else is a malformed line.
//!
//! Encrypted documents use the same grammar plus a reserved metadata
//! block: every metadata field is a `sealbox_`-prefixed `KEY=VALUE`
//! line, appended after the data lines in descriptor-table order.  The
//! prefix is reserved — data keys must not start with `sealbox_`.

use crate::codec;
use crate::errors::{Result, SealboxError};
use crate::metadata::{map_to_metadata, metadata_to_map};
use crate::stores::Store;
use crate::tree::{Key, Tree, TreeBranch, TreeItem, Value};

/// Reserved key prefix for the metadata block.
pub const METADATA_PREFIX: &str = "sealbox_";

/// The dotenv codec.  Stateless; construct freely.
#[derive(Debug, Default, Clone, Copy)]
pub struct DotenvStore;

impl DotenvStore {
    /// Parse file bytes into one flat branch, line by line.
    fn parse(&self, bytes: &[u8]) -> Result<TreeBranch> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| SealboxError::InvalidDocument(format!("file is not UTF-8: {e}")))?;

        let mut branch = TreeBranch::new();
        for (index, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                branch.push(TreeItem::comment(comment));
            } else if let Some((key, value)) = line.split_once('=') {
                branch.push(TreeItem::pair(
                    key,
                    Value::String(codec::unescape(value)),
                ));
            } else {
                return Err(SealboxError::MalformedLine {
                    line_number: index + 1,
                    line: line.to_string(),
                });
            }
        }
        Ok(branch)
    }

    /// Append one item as a line, plus the trailing newline.
    fn emit_item(&self, item: &TreeItem, out: &mut Vec<u8>) -> Result<()> {
        match &item.key {
            Key::Comment(text) => {
                out.push(b'#');
                out.extend_from_slice(text.as_bytes());
            }
            Key::Plain(name) => {
                let value = item.value.as_ref().ok_or_else(|| {
                    SealboxError::InvalidDocument(format!("data item '{name}' has no value"))
                })?;
                out.extend_from_slice(name.as_bytes());
                out.push(b'=');
                out.extend_from_slice(&codec::emit_value(value)?);
            }
        }
        out.push(b'\n');
        Ok(())
    }
}

impl Store for DotenvStore {
    fn load_plain_file(&self, bytes: &[u8]) -> Result<Vec<TreeBranch>> {
        Ok(vec![self.parse(bytes)?])
    }

    fn emit_plain_file(&self, branches: &[TreeBranch]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for branch in branches {
            for item in branch {
                self.emit_item(item, &mut out)?;
            }
        }
        Ok(out)
    }

    fn emit_value(&self, value: &Value) -> Result<Vec<u8>> {
        codec::emit_value(value)
    }

    fn load_encrypted_file(&self, bytes: &[u8]) -> Result<Tree> {
        let parsed = self.parse(bytes)?;

        // Split the reserved metadata block out of the data items.
        let mut branch = TreeBranch::new();
        let mut fields = Vec::new();
        for item in parsed {
            match item.key.as_plain().and_then(|n| {
                n.strip_prefix(METADATA_PREFIX).map(str::to_string)
            }) {
                Some(field_name) => {
                    let value = item.value.ok_or_else(|| {
                        SealboxError::MetadataField(format!(
                            "metadata field '{field_name}' has no value"
                        ))
                    })?;
                    fields.push((field_name, value));
                }
                None => branch.push(item),
            }
        }

        let metadata = map_to_metadata(&fields)?;
        if !metadata.has_key_sources() {
            return Err(SealboxError::NoKeysFound);
        }

        Ok(Tree {
            branches: vec![branch],
            metadata,
        })
    }

    fn emit_encrypted_file(&self, tree: &Tree) -> Result<Vec<u8>> {
        let mut out = self.emit_plain_file(&tree.branches)?;
        for (name, value) in metadata_to_map(&tree.metadata) {
            let item = TreeItem::pair(format!("{METADATA_PREFIX}{name}"), value);
            self.emit_item(&item, &mut out)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_lines_keep_their_text_verbatim() {
        let branch = DotenvStore.parse(b"# spaced comment\n#tight\n").unwrap();
        assert_eq!(branch[0], TreeItem::comment(" spaced comment"));
        assert_eq!(branch[1], TreeItem::comment("tight"));
    }

    #[test]
    fn blank_lines_produce_no_items() {
        let branch = DotenvStore.parse(b"A=1\n\n\nB=2\n").unwrap();
        assert_eq!(branch.len(), 2);
    }

    #[test]
    fn value_may_contain_equals_signs() {
        let branch = DotenvStore.parse(b"KEY=val=ue\n").unwrap();
        assert_eq!(
            branch[0],
            TreeItem::pair("KEY", Value::String("val=ue".into()))
        );
    }

    #[test]
    fn line_without_separator_is_malformed() {
        let err = DotenvStore.parse(b"A=1\nNOEQUALS\n").unwrap_err();
        match err {
            SealboxError::MalformedLine { line_number, line } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "NOEQUALS");
            }
            other => panic!("expected MalformedLine, got {other}"),
        }
    }

    #[test]
    fn non_utf8_input_is_rejected() {
        let err = DotenvStore.parse(&[0xFF, 0xFE, b'\n']).unwrap_err();
        assert!(matches!(err, SealboxError::InvalidDocument(_)));
    }

    #[test]
    fn nested_branches_are_inexpressible() {
        let branches = vec![vec![TreeItem::pair(
            "nested",
            Value::Branch(vec![TreeItem::pair("inner", Value::Int(1))]),
        )]];
        let err = DotenvStore.emit_plain_file(&branches).unwrap_err();
        assert!(matches!(err, SealboxError::UnsupportedValueType(_)));
    }
}
