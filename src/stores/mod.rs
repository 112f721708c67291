//! Per-format codecs.
//!
//! Every concrete file format implements the same five-operation
//! [`Store`] contract over the shared tree/metadata types.  There is no
//! format hierarchy — each codec is a self-contained implementation.
//!
//! This module provides:
//! - The line-oriented dotenv codec (`dotenv`)
//! - The structured JSON codec (`json`)

pub mod dotenv;
pub mod json;

use crate::errors::Result;
use crate::tree::{Tree, TreeBranch, Value};

/// The per-format codec contract.
///
/// Stores operate on in-memory byte buffers only — reading and writing
/// files belongs to the caller.  `emit_plain_file` and
/// `emit_encrypted_file` are pure functions of their input: identical
/// input yields byte-identical output, so encrypted artifacts can be
/// diffed and version-controlled meaningfully.
pub trait Store {
    /// Parse plaintext file bytes into ordered branches.
    fn load_plain_file(&self, bytes: &[u8]) -> Result<Vec<TreeBranch>>;

    /// Serialize branches back into plaintext file bytes.
    fn emit_plain_file(&self, branches: &[TreeBranch]) -> Result<Vec<u8>>;

    /// Serialize a single scalar leaf (e.g. as a ciphertext payload).
    fn emit_value(&self, value: &Value) -> Result<Vec<u8>>;

    /// Parse encrypted file bytes into a tree plus its metadata.
    ///
    /// Values are still ciphertext afterwards; fails with `NoKeysFound`
    /// when no usable key material is present in the document.
    fn load_encrypted_file(&self, bytes: &[u8]) -> Result<Tree>;

    /// Serialize a fully-ciphertext tree plus its metadata block.
    fn emit_encrypted_file(&self, tree: &Tree) -> Result<Vec<u8>>;
}
