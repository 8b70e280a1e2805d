//! HDF5 Datatype message parsing (message type 0x0003).
//!
//! Only the atomic classes needed for array payloads are decoded in full:
//! fixed-point, floating-point and fixed-length strings. Every other class is
//! kept as [`Datatype::Other`] with its element size so objects using it can
//! still be described.

use crate::bytes::{ensure_len, read_u32};
use crate::error::{FormatError, Structure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringPadding {
    NullTerminate,
    NullPad,
    SpacePad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterSet {
    Ascii,
    Utf8,
}

/// Parsed HDF5 datatype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datatype {
    /// Class 0: integers.
    FixedPoint {
        size: u32,
        byte_order: ByteOrder,
        signed: bool,
    },
    /// Class 1: IEEE floats.
    FloatingPoint { size: u32, byte_order: ByteOrder },
    /// Class 3: fixed-length strings.
    String {
        size: u32,
        padding: StringPadding,
        charset: CharacterSet,
    },
    /// Any other class (compound, enum, variable-length, reference, ...).
    Other { class: u8, size: u32 },
}

pub(crate) fn parse_charset(val: u8) -> Result<CharacterSet, FormatError> {
    match val {
        0 => Ok(CharacterSet::Ascii),
        1 => Ok(CharacterSet::Utf8),
        _ => Err(FormatError::field(Structure::Datatype, "character set", val)),
    }
}

fn parse_padding(val: u8) -> Result<StringPadding, FormatError> {
    match val {
        0 => Ok(StringPadding::NullTerminate),
        1 => Ok(StringPadding::NullPad),
        2 => Ok(StringPadding::SpacePad),
        _ => Err(FormatError::field(Structure::Datatype, "string padding", val)),
    }
}

impl Datatype {
    pub fn native_f64() -> Self {
        Datatype::FloatingPoint {
            size: 8,
            byte_order: ByteOrder::LittleEndian,
        }
    }

    pub fn native_f32() -> Self {
        Datatype::FloatingPoint {
            size: 4,
            byte_order: ByteOrder::LittleEndian,
        }
    }

    /// Little-endian integer of `size` bytes.
    pub fn integer(size: u32, signed: bool) -> Self {
        Datatype::FixedPoint {
            size,
            byte_order: ByteOrder::LittleEndian,
            signed,
        }
    }

    /// Null-padded ASCII string of `size` bytes.
    pub fn fixed_string(size: u32) -> Self {
        Datatype::String {
            size,
            padding: StringPadding::NullPad,
            charset: CharacterSet::Ascii,
        }
    }

    /// Element size in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Datatype::FixedPoint { size, .. }
            | Datatype::FloatingPoint { size, .. }
            | Datatype::String { size, .. }
            | Datatype::Other { size, .. } => *size,
        }
    }

    pub fn byte_order(&self) -> Option<ByteOrder> {
        match self {
            Datatype::FixedPoint { byte_order, .. } | Datatype::FloatingPoint { byte_order, .. } => {
                Some(*byte_order)
            }
            _ => None,
        }
    }

    /// Parse a datatype message from raw bytes.
    ///
    /// Returns `(Datatype, bytes_consumed)`; for [`Datatype::Other`] the
    /// consumed count covers only the 8-byte common header.
    pub fn parse(data: &[u8]) -> Result<(Datatype, usize), FormatError> {
        ensure_len(data, 0, 8)?;
        let class = data[0] & 0x0F;
        let version = data[0] >> 4;
        if !(1..=5).contains(&version) {
            return Err(FormatError::version(Structure::Datatype, version));
        }
        let bf0 = data[1];
        let size = read_u32(data, 4)?;
        let order = if bf0 & 0x01 == 0 {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        };

        match class {
            0 => {
                ensure_len(data, 8, 4)?;
                Ok((
                    Datatype::FixedPoint {
                        size,
                        byte_order: order,
                        signed: bf0 & 0x08 != 0,
                    },
                    12,
                ))
            }
            1 => {
                ensure_len(data, 8, 12)?;
                if bf0 & 0x40 != 0 {
                    return Err(FormatError::Unsupported("VAX float byte order"));
                }
                Ok((
                    Datatype::FloatingPoint {
                        size,
                        byte_order: order,
                    },
                    20,
                ))
            }
            3 => Ok((
                Datatype::String {
                    size,
                    padding: parse_padding(bf0 & 0x0F)?,
                    charset: parse_charset(bf0 >> 4)?,
                },
                8,
            )),
            other => Ok((Datatype::Other { class: other, size }, 8)),
        }
    }

    /// Serialize to a version 1 datatype message.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(20);
        match self {
            Datatype::FixedPoint {
                size,
                byte_order,
                signed,
            } => {
                let mut bf0 = 0u8;
                if *byte_order == ByteOrder::BigEndian {
                    bf0 |= 0x01;
                }
                if *signed {
                    bf0 |= 0x08;
                }
                buf.extend_from_slice(&[0x10, bf0, 0, 0]);
                buf.extend_from_slice(&size.to_le_bytes());
                buf.extend_from_slice(&0u16.to_le_bytes());
                buf.extend_from_slice(&((size * 8) as u16).to_le_bytes());
            }
            Datatype::FloatingPoint { size, byte_order } => {
                // implied mantissa normalization; sign bit is the top bit
                let mut bf0 = 0x20u8;
                if *byte_order == ByteOrder::BigEndian {
                    bf0 |= 0x01;
                }
                let sign_location = (size * 8 - 1) as u8;
                buf.extend_from_slice(&[0x11, bf0, sign_location, 0]);
                buf.extend_from_slice(&size.to_le_bytes());
                let (exp_loc, exp_size, mant_size, bias) = if *size == 4 {
                    (23u8, 8u8, 23u8, 127u32)
                } else {
                    (52, 11, 52, 1023)
                };
                buf.extend_from_slice(&0u16.to_le_bytes());
                buf.extend_from_slice(&((size * 8) as u16).to_le_bytes());
                buf.extend_from_slice(&[exp_loc, exp_size, 0, mant_size]);
                buf.extend_from_slice(&bias.to_le_bytes());
            }
            Datatype::String {
                size,
                padding,
                charset,
            } => {
                let pad = match padding {
                    StringPadding::NullTerminate => 0u8,
                    StringPadding::NullPad => 1,
                    StringPadding::SpacePad => 2,
                };
                let cs = match charset {
                    CharacterSet::Ascii => 0u8,
                    CharacterSet::Utf8 => 1,
                };
                buf.extend_from_slice(&[0x13, pad | (cs << 4), 0, 0]);
                buf.extend_from_slice(&size.to_le_bytes());
            }
            Datatype::Other { class, size } => {
                buf.extend_from_slice(&[0x10 | (class & 0x0F), 0, 0, 0]);
                buf.extend_from_slice(&size.to_le_bytes());
            }
        }
        buf
    }
}

/// Decode one fixed-length string element according to its padding.
pub fn decode_fixed_string(raw: &[u8], padding: StringPadding) -> String {
    let end = match padding {
        StringPadding::NullTerminate | StringPadding::NullPad => {
            raw.iter().position(|&b| b == 0).unwrap_or(raw.len())
        }
        StringPadding::SpacePad => raw.iter().rposition(|&b| b != b' ').map_or(0, |p| p + 1),
    };
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
