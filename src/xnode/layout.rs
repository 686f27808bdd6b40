//! Fixed byte layout of the `.xnode` header.
//!
//! ```text
//! 0      5            37   38            230             262        326
//! | magic | name hash | v | reserved ... | integrity hash | reserved | payload ...
//! ```
//!
//! Reserved bytes are written as zero and ignored when reading, so later
//! layouts can claim them without breaking older readers of the same version.

use sha2::{Digest, Sha256};

use super::error::XnodeError;

/// Magic bytes identifying an xnode archive.
pub const MAGIC: &[u8; 5] = b"XNODE";
pub const NAME_HASH_OFFSET: usize = 5;
/// First reserved byte; carries the layout version.
pub const VERSION_OFFSET: usize = 37;
pub const INTEGRITY_OFFSET: usize = 230;
pub const PAYLOAD_OFFSET: usize = 326;
pub const HASH_LEN: usize = 32;

/// Layout version written by this crate.
pub const LAYOUT_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub name_hash: [u8; HASH_LEN],
    pub version: u8,
    pub integrity: [u8; HASH_LEN],
}

impl Header {
    pub fn new(name: &str, payload: &[u8]) -> Self {
        Self {
            name_hash: name_hash(name),
            version: LAYOUT_VERSION,
            integrity: sha256(payload),
        }
    }

    pub fn to_bytes(&self) -> [u8; PAYLOAD_OFFSET] {
        let mut out = [0u8; PAYLOAD_OFFSET];
        out[..MAGIC.len()].copy_from_slice(MAGIC);
        out[NAME_HASH_OFFSET..NAME_HASH_OFFSET + HASH_LEN].copy_from_slice(&self.name_hash);
        out[VERSION_OFFSET] = self.version;
        out[INTEGRITY_OFFSET..INTEGRITY_OFFSET + HASH_LEN].copy_from_slice(&self.integrity);
        out
    }

    /// Parses the header, checking length, magic and layout version.
    pub fn parse(bytes: &[u8]) -> Result<Self, XnodeError> {
        if bytes.len() < PAYLOAD_OFFSET {
            return Err(XnodeError::Truncated {
                len: bytes.len(),
                needed: PAYLOAD_OFFSET,
            });
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(XnodeError::BadMagic);
        }
        let version = bytes[VERSION_OFFSET];
        if version != LAYOUT_VERSION {
            return Err(XnodeError::UnsupportedVersion(version));
        }
        Ok(Self {
            name_hash: hash_at(bytes, NAME_HASH_OFFSET),
            version,
            integrity: hash_at(bytes, INTEGRITY_OFFSET),
        })
    }

    pub fn integrity_hex(&self) -> String {
        to_hex(&self.integrity)
    }

    pub fn name_hash_hex(&self) -> String {
        to_hex(&self.name_hash)
    }
}

fn hash_at(bytes: &[u8], offset: usize) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&bytes[offset..offset + HASH_LEN]);
    out
}

pub fn sha256(bytes: &[u8]) -> [u8; HASH_LEN] {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&digest);
    out
}

pub fn name_hash(name: &str) -> [u8; HASH_LEN] {
    sha256(name.as_bytes())
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_land_at_fixed_offsets() {
        let header = Header::new("@acme/hello", b"payload");
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..5], b"XNODE");
        assert_eq!(&bytes[5..37], &name_hash("@acme/hello"));
        assert_eq!(bytes[37], LAYOUT_VERSION);
        assert!(bytes[38..230].iter().all(|b| *b == 0));
        assert_eq!(&bytes[230..262], &sha256(b"payload"));
        assert!(bytes[262..326].iter().all(|b| *b == 0));
    }

    #[test]
    fn parse_ignores_reserved_bytes() {
        let header = Header::new("hello", b"x");
        let mut bytes = header.to_bytes().to_vec();
        bytes[100] = 0xaa;
        bytes[300] = 0x55;
        assert_eq!(Header::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn parse_rejects_short_input() {
        let err = Header::parse(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, XnodeError::Truncated { len: 10, .. }));
    }

    #[test]
    fn parse_rejects_unknown_version() {
        let mut bytes = Header::new("hello", b"x").to_bytes();
        bytes[VERSION_OFFSET] = 9;
        assert!(matches!(
            Header::parse(&bytes),
            Err(XnodeError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(to_hex(&[0x00, 0x0f, 0xab]), "000fab");
    }
}
