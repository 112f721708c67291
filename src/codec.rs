//! Scalar value codec shared by every format.
//!
//! Converts a single scalar to/from its in-line textual representation
//! and rejects non-scalar inputs.  Line-oriented formats additionally
//! need newline escaping: a literal newline inside a value would corrupt
//! record boundaries, so it travels as the two-character sequence `\n`.

use crate::errors::{Result, SealboxError};
use crate::tree::Value;

/// Encode literal newlines as the two-character `\n` sequence.
pub fn escape(value: &str) -> String {
    value.replace('\n', "\\n")
}

/// Decode the two-character `\n` sequence back into a literal newline.
pub fn unescape(value: &str) -> String {
    value.replace("\\n", "\n")
}

/// Serialize a single scalar to its in-line byte representation.
///
/// Strings are emitted verbatim (after escaping); numbers and booleans
/// use their canonical textual form.  Branch values have no single-line
/// representation and fail with `UnsupportedValueType`.
pub fn emit_value(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::String(s) => Ok(escape(s).into_bytes()),
        Value::Int(i) => Ok(i.to_string().into_bytes()),
        Value::Float(f) => Ok(f.to_string().into_bytes()),
        Value::Bool(b) => Ok(b.to_string().into_bytes()),
        Value::Branch(_) => Err(SealboxError::UnsupportedValueType(value.kind())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeItem;

    #[test]
    fn emit_plain_string() {
        assert_eq!(emit_value(&Value::String("hello".into())).unwrap(), b"hello");
    }

    #[test]
    fn emit_numbers_and_bools() {
        assert_eq!(emit_value(&Value::Int(-42)).unwrap(), b"-42");
        assert_eq!(emit_value(&Value::Bool(true)).unwrap(), b"true");
        assert_eq!(emit_value(&Value::Float(2.5)).unwrap(), b"2.5");
    }

    #[test]
    fn emit_branch_is_rejected() {
        let branch = Value::Branch(vec![TreeItem::pair("K", Value::Int(1))]);
        let err = emit_value(&branch).unwrap_err();
        assert!(matches!(
            err,
            SealboxError::UnsupportedValueType("branch value")
        ));
    }

    #[test]
    fn newline_escapes_both_ways() {
        assert_eq!(escape("val4\nval4"), "val4\\nval4");
        assert_eq!(unescape("val4\\nval4"), "val4\nval4");
    }

    #[test]
    fn escape_roundtrip() {
        let original = "line1\nline2\nline3";
        assert_eq!(unescape(&escape(original)), original);
    }
}
