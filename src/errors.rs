use thiserror::Error;

/// All errors that can occur in sealbox.
#[derive(Debug, Error)]
pub enum SealboxError {
    // --- Format errors ---
    #[error("malformed line {line_number}: '{line}'")]
    MalformedLine { line_number: usize, line: String },

    #[error("cannot serialize a {0} in this format — only scalars are representable")]
    UnsupportedValueType(&'static str),

    #[error("invalid document structure: {0}")]
    InvalidDocument(String),

    // --- Metadata errors ---
    #[error("metadata field '{field}' has unrecognized value '{value}'")]
    UnrecognizedValue { field: String, value: String },

    #[error("metadata field error: {0}")]
    MetadataField(String),

    #[error("No keys found in file")]
    NoKeysFound,

    // --- Crypto errors ---
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("authentication failed — wrong key or tampered ciphertext")]
    AuthenticationFailed,

    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("key source error: {0}")]
    KeySource(String),

    // --- Integrity errors ---
    #[error("MAC mismatch — file contents were tampered with or truncated")]
    MacMismatch,

    #[error("MAC error: {0}")]
    MacError(String),

    // --- Serialization errors ---
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience type alias for sealbox results.
pub type Result<T> = std::result::Result<T, SealboxError>;
