//! The canonical, format-independent representation of secret data.
//!
//! Every concrete file format (dotenv, JSON, ...) parses into and emits
//! from these types.  A `Tree` is an ordered list of branches; a branch
//! is an ordered list of items; an item is either a `KEY = value` pair
//! or a free-text comment.  Order is semantically significant and must
//! survive every load/emit round-trip.

use crate::errors::Result;
use crate::metadata::Metadata;

/// Keys ending in this suffix are exempt from value encryption.
///
/// The suffix is part of the stored key name — codecs preserve it
/// verbatim and never strip or re-add it.
pub const UNENCRYPTED_SUFFIX: &str = "_unencrypted";

/// An ordered sequence of items forming one document/section of a tree.
pub type TreeBranch = Vec<TreeItem>;

/// The key of a tree item: a plain identifier, or a comment marker.
///
/// A comment is a wrapper around free text, not a data key — items with
/// a comment key never carry a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Plain(String),
    Comment(String),
}

impl Key {
    /// Returns the identifier for plain keys, `None` for comments.
    pub fn as_plain(&self) -> Option<&str> {
        match self {
            Key::Plain(name) => Some(name),
            Key::Comment(_) => None,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Key::Comment(_))
    }
}

/// A single value held by a tree item.
///
/// Scalars (`String`, `Int`, `Float`, `Bool`) are the only shapes a
/// line-oriented format can represent; `Branch` nesting exists for
/// structured formats such as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Branch(TreeBranch),
}

impl Value {
    /// A short noun for error messages ("branch value", "string value"...).
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string value",
            Value::Int(_) => "integer value",
            Value::Float(_) => "float value",
            Value::Bool(_) => "boolean value",
            Value::Branch(_) => "branch value",
        }
    }
}

/// A key/value pair, or a comment marker, within a branch.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeItem {
    pub key: Key,
    /// Always `None` for comment items; always `Some` for data items.
    pub value: Option<Value>,
}

impl TreeItem {
    /// A data item carrying a value.
    pub fn pair(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: Key::Plain(key.into()),
            value: Some(value),
        }
    }

    /// A comment item (no value).
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            key: Key::Comment(text.into()),
            value: None,
        }
    }

    /// Whether this item, considered on its own, participates in
    /// per-value encryption.
    ///
    /// Comments are never encrypted, and plain keys carrying the
    /// reserved `_unencrypted` suffix are exempt.  For branch-valued
    /// keys the exemption covers the whole subtree; the traversal
    /// functions below propagate it to every descendant leaf.
    pub fn is_encryption_eligible(&self) -> bool {
        match &self.key {
            Key::Comment(_) => false,
            Key::Plain(name) => !name.ends_with(UNENCRYPTED_SUFFIX),
        }
    }
}

/// A whole document: ordered branches plus one set of metadata.
///
/// A tree is constructed fresh on each load and is an immutable input
/// to each emit — no tree instance is shared across calls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tree {
    pub branches: Vec<TreeBranch>,
    pub metadata: Metadata,
}

// ---------------------------------------------------------------------------
// Ordered traversal
// ---------------------------------------------------------------------------
//
// The MAC is computed over scalar leaf values in document order, and the
// encrypt/decrypt passes must visit leaves in exactly that same order.
// Both therefore go through the two functions below; the recursion is
// the single source of truth for what "tree order" means.

/// Visit every scalar leaf of `branches` in document order (read-only).
///
/// The callback receives the item's colon-joined path (used as AEAD
/// associated data), whether the value is encryption-eligible, and the
/// scalar value.  Comments are skipped; `Branch` values are descended
/// into, not visited.  An `_unencrypted` suffix on a branch-valued key
/// exempts the whole subtree beneath it.
pub fn for_each_scalar<F>(branches: &[TreeBranch], f: &mut F) -> Result<()>
where
    F: FnMut(&str, bool, &Value) -> Result<()>,
{
    for branch in branches {
        walk_branch(branch, "", false, f)?;
    }
    Ok(())
}

fn walk_branch<F>(branch: &TreeBranch, prefix: &str, exempt: bool, f: &mut F) -> Result<()>
where
    F: FnMut(&str, bool, &Value) -> Result<()>,
{
    for item in branch {
        let name = match item.key.as_plain() {
            Some(name) => name,
            None => continue,
        };
        // A parent's exemption covers every leaf below it.
        let exempt = exempt || !item.is_encryption_eligible();
        let path = join_path(prefix, name);
        match &item.value {
            Some(Value::Branch(inner)) => walk_branch(inner, &path, exempt, f)?,
            Some(scalar) => f(&path, !exempt, scalar)?,
            None => {}
        }
    }
    Ok(())
}

/// Visit every scalar leaf of `branches` in document order, mutably.
///
/// Same order, path, and eligibility convention as [`for_each_scalar`].
/// The callback may replace the value in place (plaintext → ciphertext
/// or back).
pub fn for_each_scalar_mut<F>(branches: &mut [TreeBranch], f: &mut F) -> Result<()>
where
    F: FnMut(&str, bool, &mut Value) -> Result<()>,
{
    for branch in branches {
        walk_branch_mut(branch, "", false, f)?;
    }
    Ok(())
}

fn walk_branch_mut<F>(branch: &mut TreeBranch, prefix: &str, exempt: bool, f: &mut F) -> Result<()>
where
    F: FnMut(&str, bool, &mut Value) -> Result<()>,
{
    for item in branch.iter_mut() {
        let exempt = exempt || !item.is_encryption_eligible();
        let name = match item.key.as_plain() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let path = join_path(prefix, &name);
        match &mut item.value {
            Some(Value::Branch(inner)) => walk_branch_mut(inner, &path, exempt, f)?,
            Some(scalar) => f(&path, !exempt, scalar)?,
            None => {}
        }
    }
    Ok(())
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}:{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<TreeBranch> {
        vec![vec![
            TreeItem::pair("VAR1", Value::String("val1".into())),
            TreeItem::comment("a comment"),
            TreeItem::pair(
                "nested",
                Value::Branch(vec![TreeItem::pair("inner", Value::Int(7))]),
            ),
            TreeItem::pair("VAR2_unencrypted", Value::String("plain".into())),
        ]]
    }

    #[test]
    fn traversal_visits_scalars_in_document_order() {
        let branches = sample();
        let mut seen = Vec::new();
        for_each_scalar(&branches, &mut |path, _, value| {
            seen.push((path.to_string(), value.clone()));
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                ("VAR1".to_string(), Value::String("val1".into())),
                ("nested:inner".to_string(), Value::Int(7)),
                (
                    "VAR2_unencrypted".to_string(),
                    Value::String("plain".into())
                ),
            ]
        );
    }

    #[test]
    fn traversal_skips_comments() {
        let branches = sample();
        let mut count = 0;
        for_each_scalar(&branches, &mut |_, _, _| {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn traversal_reports_eligibility() {
        let branches = sample();
        let mut seen = Vec::new();
        for_each_scalar(&branches, &mut |path, eligible, _| {
            seen.push((path.to_string(), eligible));
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                ("VAR1".to_string(), true),
                ("nested:inner".to_string(), true),
                ("VAR2_unencrypted".to_string(), false),
            ]
        );
    }

    #[test]
    fn exemption_covers_whole_subtrees() {
        let branches = vec![vec![TreeItem::pair(
            "cfg_unencrypted",
            Value::Branch(vec![
                TreeItem::pair("inner", Value::String("plain".into())),
                TreeItem::pair(
                    "deeper",
                    Value::Branch(vec![TreeItem::pair("leaf", Value::Int(1))]),
                ),
            ]),
        )]];

        for_each_scalar(&branches, &mut |path, eligible, _| {
            assert!(!eligible, "leaf at '{path}' must inherit the exemption");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn unencrypted_suffix_marks_item_exempt() {
        let exempt = TreeItem::pair("FOO_unencrypted", Value::String("x".into()));
        let normal = TreeItem::pair("FOO", Value::String("x".into()));
        let comment = TreeItem::comment("hi");

        assert!(!exempt.is_encryption_eligible());
        assert!(normal.is_encryption_eligible());
        assert!(!comment.is_encryption_eligible());
    }

    #[test]
    fn mutable_traversal_matches_readonly_order() {
        let mut branches = sample();
        let mut mutable_paths = Vec::new();
        for_each_scalar_mut(&mut branches, &mut |path, _, _| {
            mutable_paths.push(path.to_string());
            Ok(())
        })
        .unwrap();

        let mut readonly_paths = Vec::new();
        for_each_scalar(&branches, &mut |path, _, _| {
            readonly_paths.push(path.to_string());
            Ok(())
        })
        .unwrap();

        assert_eq!(mutable_paths, readonly_paths);
    }
}
