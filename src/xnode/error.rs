/// Errors raised while reading or writing `.xnode` archives.
#[derive(Debug, thiserror::Error)]
pub enum XnodeError {
    #[error("xnode archive is truncated ({len} bytes, header needs {needed})")]
    Truncated { len: usize, needed: usize },
    #[error("not an xnode archive (magic number mismatch)")]
    BadMagic,
    #[error("unsupported xnode layout version {0}")]
    UnsupportedVersion(u8),
    #[error("xnode payload integrity mismatch (expected {expected}, found {actual})")]
    IntegrityMismatch { expected: String, actual: String },
    #[error("xnode name hash does not match package `{name}`")]
    NameMismatch { name: String },
    #[error("script integrity mismatch (expected {expected}, found {actual})")]
    ScriptMismatch { expected: String, actual: String },
    #[error("xnode payload expands beyond {limit} bytes")]
    PayloadTooLarge { limit: u64 },
    #[error("zstd stream error: {0}")]
    Compression(#[from] std::io::Error),
    #[error("invalid payload envelope: {0}")]
    Envelope(#[from] serde_cbor::Error),
}
