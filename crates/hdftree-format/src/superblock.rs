//! HDF5 superblock parsing (versions 2 and 3).
//!
//! Versions 0 and 1 root the file in a symbol-table group, which this reader
//! does not walk; they are rejected with [`FormatError::BadVersion`].

use crate::bytes::{ensure_len, read_address, read_u32, read_uint, validate_sizes};
use crate::checksum::jenkins_lookup3;
use crate::error::{FormatError, Structure};
use crate::signature::HDF5_SIGNATURE;

/// Parsed v2/v3 superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Superblock version (2 or 3).
    pub version: u8,
    /// Size of offsets in bytes (2, 4, or 8).
    pub offset_size: u8,
    /// Size of lengths in bytes (2, 4, or 8).
    pub length_size: u8,
    /// File consistency flags.
    pub consistency_flags: u8,
    /// Base address that all other addresses are relative to.
    pub base_address: u64,
    /// Superblock extension object header, if any.
    pub superblock_extension_address: Option<u64>,
    /// End-of-file address.
    pub eof_address: u64,
    /// Root group object header address.
    pub root_group_address: u64,
}

impl Superblock {
    /// Encoded size of a v2/v3 superblock for the given offset size.
    pub fn encoded_len(offset_size: u8) -> usize {
        12 + 4 * offset_size as usize + 4
    }

    /// Parse a superblock from `data` starting at `signature_offset`.
    pub fn parse(data: &[u8], signature_offset: usize) -> Result<Superblock, FormatError> {
        ensure_len(data, signature_offset, 9)?;
        let d = &data[signature_offset..];
        if d[..8] != HDF5_SIGNATURE {
            return Err(FormatError::SignatureNotFound);
        }

        let version = d[8];
        if !matches!(version, 2 | 3) {
            return Err(FormatError::version(Structure::Superblock, version));
        }

        // sig(8) + version(1) + offset_size(1) + length_size(1) + flags(1)
        ensure_len(d, 0, 12)?;
        let offset_size = d[9];
        let length_size = d[10];
        validate_sizes(offset_size, length_size)?;
        let consistency_flags = d[11];

        let os = offset_size as usize;
        let checksum_pos = 12 + 4 * os;
        ensure_len(d, checksum_pos, 4)?;

        let stored = read_u32(d, checksum_pos)?;
        let computed = jenkins_lookup3(&d[..checksum_pos]);
        if stored != computed {
            return Err(FormatError::ChecksumMismatch {
                expected: stored,
                computed,
            });
        }

        let base_address = read_uint(d, 12, offset_size)?;
        let superblock_extension_address = read_address(d, 12 + os, offset_size)?;
        let eof_address = read_uint(d, 12 + 2 * os, offset_size)?;
        let root_group_address = read_uint(d, 12 + 3 * os, offset_size)?;

        Ok(Superblock {
            version,
            offset_size,
            length_size,
            consistency_flags,
            base_address,
            superblock_extension_address,
            eof_address,
            root_group_address,
        })
    }

    /// Serialize the superblock, including its checksum.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::encoded_len(self.offset_size));
        buf.extend_from_slice(&HDF5_SIGNATURE);
        buf.push(self.version);
        buf.push(self.offset_size);
        buf.push(self.length_size);
        buf.push(self.consistency_flags);
        let os = self.offset_size as usize;
        let undefined = u64::MAX;
        for value in [
            self.base_address,
            self.superblock_extension_address.unwrap_or(undefined),
            self.eof_address,
            self.root_group_address,
        ] {
            buf.extend_from_slice(&value.to_le_bytes()[..os]);
        }
        let checksum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }
}
