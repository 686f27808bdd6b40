//! The `.xnode` container: a fixed 326-byte header followed by a
//! zstd-compressed CBOR envelope holding the manifest and bundled script.

mod envelope;
mod error;
mod layout;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

pub use envelope::{
    COMPRESSION_LEVEL, Envelope, MAX_ENVELOPE_LEN, Manifest, compress, decompress,
    decompress_bounded, script_integrity,
};
pub use error::XnodeError;
pub use layout::{
    HASH_LEN, Header, INTEGRITY_OFFSET, LAYOUT_VERSION, MAGIC, NAME_HASH_OFFSET, PAYLOAD_OFFSET,
    VERSION_OFFSET, name_hash, sha256, to_hex,
};

/// A decoded and verified archive.
#[derive(Debug, Clone)]
pub struct Archive {
    pub header: Header,
    pub envelope: Envelope,
    /// Size of the compressed payload in bytes.
    pub payload_len: usize,
}

pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, XnodeError> {
    envelope.verify_script()?;
    let serialized = envelope.to_cbor()?;
    let payload = compress(&serialized)?;
    let header = Header::new(&envelope.manifest.name, &payload);

    let mut out = Vec::with_capacity(PAYLOAD_OFFSET + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&payload);
    debug!(
        name = %envelope.manifest.name,
        cbor = serialized.len(),
        payload = payload.len(),
        "encoded xnode"
    );
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<Archive, XnodeError> {
    let header = Header::parse(bytes)?;
    let payload = &bytes[PAYLOAD_OFFSET..];

    let actual = sha256(payload);
    if actual != header.integrity {
        return Err(XnodeError::IntegrityMismatch {
            expected: header.integrity_hex(),
            actual: to_hex(&actual),
        });
    }

    let envelope = Envelope::from_cbor(&decompress(payload)?)?;
    if name_hash(&envelope.manifest.name) != header.name_hash {
        return Err(XnodeError::NameMismatch {
            name: envelope.manifest.name,
        });
    }
    envelope.verify_script()?;

    Ok(Archive {
        header,
        envelope,
        payload_len: payload.len(),
    })
}

/// `sha256-<hex>` digest of a complete archive file, as sent to the registry.
pub fn archive_integrity(bytes: &[u8]) -> String {
    format!("sha256-{}", to_hex(&sha256(bytes)))
}

pub fn read_file(path: &Path) -> Result<Archive> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    decode(&bytes).with_context(|| format!("{} is not a valid xnode archive", path.display()))
}

pub fn write_file(path: &Path, envelope: &Envelope) -> Result<Vec<u8>> {
    let bytes = encode(envelope)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(bytes)
}
