use std::io::Read;

use serde::{Deserialize, Serialize};

use super::error::XnodeError;
use super::layout::{sha256, to_hex};

/// zstd level used for every payload.
pub const COMPRESSION_LEVEL: i32 = 6;

/// Largest decompressed envelope accepted when reading an archive.
pub const MAX_ENVELOPE_LEN: u64 = 64 * 1024 * 1024;

/// Package metadata carried inside the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Full package name, including the `@scope/` prefix when present.
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// File name of the bundled script.
    pub entry: String,
    pub builder: String,
    pub packed_at: String,
}

/// The CBOR document stored (compressed) after the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub manifest: Manifest,
    pub integrity: String,
    pub script: String,
}

impl Envelope {
    pub fn new(manifest: Manifest, script: String) -> Self {
        let integrity = script_integrity(&script);
        Self {
            manifest,
            integrity,
            script,
        }
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, XnodeError> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, XnodeError> {
        Ok(serde_cbor::from_slice(bytes)?)
    }

    pub fn verify_script(&self) -> Result<(), XnodeError> {
        let actual = script_integrity(&self.script);
        if actual != self.integrity {
            return Err(XnodeError::ScriptMismatch {
                expected: self.integrity.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// `sha256-<hex>` digest of the script text.
pub fn script_integrity(script: &str) -> String {
    format!("sha256-{}", to_hex(&sha256(script.as_bytes())))
}

pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, XnodeError> {
    Ok(zstd::encode_all(bytes, COMPRESSION_LEVEL)?)
}

pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, XnodeError> {
    decompress_bounded(bytes, MAX_ENVELOPE_LEN)
}

/// Decompresses at most `limit` bytes; anything larger is rejected.
pub fn decompress_bounded(bytes: &[u8], limit: u64) -> Result<Vec<u8>, XnodeError> {
    let decoder = zstd::stream::read::Decoder::new(bytes)?;
    let mut out = Vec::new();
    decoder.take(limit.saturating_add(1)).read_to_end(&mut out)?;
    if out.len() as u64 > limit {
        return Err(XnodeError::PayloadTooLarge { limit });
    }
    Ok(out)
}
