//! Little-endian field readers shared by the message parsers.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{FormatError, Structure};

pub(crate) fn ensure_len(data: &[u8], pos: usize, needed: usize) -> Result<(), FormatError> {
    match pos.checked_add(needed) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(FormatError::UnexpectedEof {
            expected: pos.saturating_add(needed),
            available: data.len(),
        }),
    }
}

/// Read an unsigned integer of 1, 2, 4, or 8 bytes.
pub(crate) fn read_uint(data: &[u8], pos: usize, size: u8) -> Result<u64, FormatError> {
    ensure_len(data, pos, size as usize)?;
    let slice = &data[pos..pos + size as usize];
    Ok(match size {
        1 => slice[0] as u64,
        2 => LittleEndian::read_u16(slice) as u64,
        4 => LittleEndian::read_u32(slice) as u64,
        8 => LittleEndian::read_u64(slice),
        _ => return Err(FormatError::field(Structure::Superblock, "offset size", size)),
    })
}

pub(crate) fn read_u16(data: &[u8], pos: usize) -> Result<u16, FormatError> {
    ensure_len(data, pos, 2)?;
    Ok(LittleEndian::read_u16(&data[pos..pos + 2]))
}

pub(crate) fn read_u32(data: &[u8], pos: usize) -> Result<u32, FormatError> {
    ensure_len(data, pos, 4)?;
    Ok(LittleEndian::read_u32(&data[pos..pos + 4]))
}

/// Read an address field, mapping the all-ones "undefined address" to `None`.
pub(crate) fn read_address(data: &[u8], pos: usize, size: u8) -> Result<Option<u64>, FormatError> {
    let value = read_uint(data, pos, size)?;
    let undefined = match size {
        2 => 0xFFFF,
        4 => 0xFFFF_FFFF,
        _ => u64::MAX,
    };
    Ok(if value == undefined { None } else { Some(value) })
}

pub(crate) fn validate_sizes(offset_size: u8, length_size: u8) -> Result<(), FormatError> {
    if !matches!(offset_size, 2 | 4 | 8) {
        return Err(FormatError::field(Structure::Superblock, "offset size", offset_size));
    }
    if !matches!(length_size, 2 | 4 | 8) {
        return Err(FormatError::field(Structure::Superblock, "length size", length_size));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_each_width() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_uint(&data, 0, 1).unwrap(), 0x01);
        assert_eq!(read_uint(&data, 0, 2).unwrap(), 0x0201);
        assert_eq!(read_uint(&data, 0, 4).unwrap(), 0x0403_0201);
        assert_eq!(read_uint(&data, 0, 8).unwrap(), 0x0807_0605_0403_0201);
    }

    #[test]
    fn rejects_odd_width() {
        assert_eq!(
            read_uint(&[0; 8], 0, 3),
            Err(FormatError::field(Structure::Superblock, "offset size", 3))
        );
    }

    #[test]
    fn undefined_address_is_none() {
        assert_eq!(read_address(&[0xFF; 8], 0, 8).unwrap(), None);
        assert_eq!(read_address(&[0xFF; 4], 0, 4).unwrap(), None);
        assert_eq!(read_address(&[0x10, 0, 0, 0], 0, 4).unwrap(), Some(0x10));
    }

    #[test]
    fn overflow_is_eof() {
        assert!(matches!(
            ensure_len(&[0; 4], usize::MAX, 2),
            Err(FormatError::UnexpectedEof { .. })
        ));
    }
}
