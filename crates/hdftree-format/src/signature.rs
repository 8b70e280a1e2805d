//! Superblock signature search.

use crate::error::FormatError;

/// The 8-byte HDF5 magic signature.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1A, b'\n'];

/// Offset of the superblock signature.
///
/// The superblock sits at 0 or, after a user block, at the next power of
/// two from 512 upwards.
pub fn find_signature(data: &[u8]) -> Result<usize, FormatError> {
    std::iter::once(0)
        .chain(std::iter::successors(Some(512usize), |o| o.checked_mul(2)))
        .take_while(|&o| o.saturating_add(8) <= data.len())
        .find(|&o| data[o..o + 8] == HDF5_SIGNATURE)
        .ok_or(FormatError::SignatureNotFound)
}
