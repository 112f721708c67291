//! Integration tests for the dotenv codec.

use std::fs;

use sealbox::errors::SealboxError;
use sealbox::metadata::{Metadata, WrappedKey};
use sealbox::stores::dotenv::DotenvStore;
use sealbox::stores::Store;
use sealbox::tree::{Tree, TreeBranch, TreeItem, Value};

const PLAIN: &[u8] = b"VAR1=val1
VAR2=val2
#comment
VAR3_unencrypted=val3
VAR4=val4\\nval4
";

/// The tree form of the PLAIN fixture.
fn branch() -> TreeBranch {
    vec![
        TreeItem::pair("VAR1", Value::String("val1".into())),
        TreeItem::pair("VAR2", Value::String("val2".into())),
        TreeItem::comment("comment"),
        TreeItem::pair("VAR3_unencrypted", Value::String("val3".into())),
        TreeItem::pair("VAR4", Value::String("val4\nval4".into())),
    ]
}

// ---------------------------------------------------------------------------
// Plain round-trip
// ---------------------------------------------------------------------------

#[test]
fn load_plain_file() {
    let branches = DotenvStore.load_plain_file(PLAIN).expect("load plain");
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0], branch());
}

#[test]
fn emit_plain_file() {
    let bytes = DotenvStore.emit_plain_file(&[branch()]).expect("emit plain");
    assert_eq!(bytes, PLAIN);
}

#[test]
fn plain_roundtrip_is_lossless() {
    let branches = vec![branch()];
    let bytes = DotenvStore.emit_plain_file(&branches).unwrap();
    let back = DotenvStore.load_plain_file(&bytes).unwrap();
    assert_eq!(back, branches);
}

#[test]
fn newline_value_travels_as_backslash_n() {
    let branches = vec![vec![TreeItem::pair(
        "VAR4",
        Value::String("val4\nval4".into()),
    )]];
    let bytes = DotenvStore.emit_plain_file(&branches).unwrap();
    assert_eq!(bytes, b"VAR4=val4\\nval4\n");

    let back = DotenvStore.load_plain_file(&bytes).unwrap();
    assert_eq!(back[0][0].value, Some(Value::String("val4\nval4".into())));
}

// ---------------------------------------------------------------------------
// Scalar-only emission
// ---------------------------------------------------------------------------

#[test]
fn emit_value_string() {
    let bytes = DotenvStore.emit_value(&Value::String("hello".into())).unwrap();
    assert_eq!(bytes, b"hello");
}

#[test]
fn emit_value_branch_fails() {
    let err = DotenvStore
        .emit_value(&Value::Branch(branch()))
        .unwrap_err();
    assert!(matches!(err, SealboxError::UnsupportedValueType(_)));
}

// ---------------------------------------------------------------------------
// Encrypted emission stability
// ---------------------------------------------------------------------------

#[test]
fn emit_encrypted_file_is_stable() {
    // Emit the same tree multiple times to ensure the output is stable,
    // i.e. emitting the same tree always yields exactly the same bytes.
    let tree = Tree {
        branches: vec![TreeBranch::new()],
        metadata: Metadata::default(),
    };

    let mut previous: Option<Vec<u8>> = None;
    for _ in 0..10 {
        let bytes = DotenvStore.emit_encrypted_file(&tree).expect("emit");
        assert!(!bytes.is_empty());
        if let Some(prev) = &previous {
            assert_eq!(prev, &bytes);
        }
        previous = Some(bytes);
    }
}

// ---------------------------------------------------------------------------
// Metadata block
// ---------------------------------------------------------------------------

// mac_only_encrypted is a bool in metadata, but dotenv wants all strings.
#[test]
fn bool_metadata_coerces_through_strings() {
    let tree = Tree {
        branches: vec![TreeBranch::new()],
        metadata: Metadata {
            mac_only_encrypted: true,
            ..Metadata::default()
        },
    };

    let bytes = DotenvStore.emit_encrypted_file(&tree).unwrap();
    assert!(!bytes.is_empty());
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(text.contains("sealbox_mac_only_encrypted=true"));

    // The flag loads back correctly; the error afterwards is about the
    // missing key material, not the flag.
    let err = DotenvStore.load_encrypted_file(&bytes).unwrap_err();
    assert!(err.to_string().contains("No keys found in file"));
}

#[test]
fn bad_bool_metadata_names_the_offending_value() {
    let err = DotenvStore
        .load_encrypted_file(b"sealbox_mac_only_encrypted=bad-value\n")
        .unwrap_err();
    assert!(err.to_string().contains("unrecognized value 'bad-value'"));
}

#[test]
fn zero_secrets_with_key_material_is_valid() {
    // "No keys found" must be distinguishable from "file has zero
    // secret items" — the latter is a valid document.
    let tree = Tree {
        branches: vec![TreeBranch::new()],
        metadata: Metadata {
            mac: Some("ENC[str:AAAA]".to_string()),
            key_sources: vec![WrappedKey {
                recipient: "main".to_string(),
                enc: "AAAA".to_string(),
            }],
            ..Metadata::default()
        },
    };

    let bytes = DotenvStore.emit_encrypted_file(&tree).unwrap();
    let loaded = DotenvStore.load_encrypted_file(&bytes).expect("load");
    assert_eq!(loaded.branches, vec![TreeBranch::new()]);
    assert_eq!(loaded.metadata, tree.metadata);
}

#[test]
fn encrypted_metadata_roundtrips() {
    let tree = Tree {
        branches: vec![branch()],
        metadata: Metadata {
            version: "1.0".to_string(),
            mac: Some("ENC[str:c29tZW1hYw==]".to_string()),
            mac_only_encrypted: false,
            key_sources: vec![WrappedKey {
                recipient: "main".to_string(),
                enc: "d3JhcHBlZA==".to_string(),
            }],
            ..Metadata::default()
        },
    };

    let bytes = DotenvStore.emit_encrypted_file(&tree).unwrap();
    let loaded = DotenvStore.load_encrypted_file(&bytes).unwrap();
    assert_eq!(loaded, tree);
}

// ---------------------------------------------------------------------------
// Malformed input
// ---------------------------------------------------------------------------

#[test]
fn malformed_line_reports_its_position() {
    let err = DotenvStore
        .load_plain_file(b"GOOD=1\nthis line has no separator\n")
        .unwrap_err();
    match err {
        SealboxError::MalformedLine { line_number, line } => {
            assert_eq!(line_number, 2);
            assert_eq!(line, "this line has no separator");
        }
        other => panic!("expected MalformedLine, got {other}"),
    }
}

// ---------------------------------------------------------------------------
// On-disk round-trip
// ---------------------------------------------------------------------------

#[test]
fn roundtrip_through_a_real_file() {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let path = dir.path().join("app.env");

    let branches = vec![branch()];
    fs::write(&path, DotenvStore.emit_plain_file(&branches).unwrap()).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(DotenvStore.load_plain_file(&bytes).unwrap(), branches);
}
