//! HDF5 Link message parsing (message type 0x0006).

use crate::bytes::{ensure_len, read_u16, read_uint};
use crate::error::{FormatError, Structure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Points at an object header in the same file.
    Hard { address: u64 },
    /// Path in the same file, absolute or relative to the owning group.
    Soft { path: String },
    /// Object path inside another file.
    External { file: String, path: String },
}

/// A named entry of a compact-storage group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
    pub name: String,
    pub target: LinkTarget,
    pub creation_order: Option<u64>,
}

const LINK_TYPE_SOFT: u8 = 1;
const LINK_TYPE_EXTERNAL: u8 = 64;

fn split_nul(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let idx = data.iter().position(|&b| b == 0)?;
    Some((&data[..idx], &data[idx + 1..]))
}

fn lossy(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

impl LinkMessage {
    pub fn parse(data: &[u8], offset_size: u8) -> Result<LinkMessage, FormatError> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        if version != 1 {
            return Err(FormatError::version(Structure::Link, version));
        }
        let flags = data[1];
        let name_len_width = 1u8 << (flags & 0x03);
        let mut pos = 2;

        let link_type = if flags & 0x08 != 0 {
            ensure_len(data, pos, 1)?;
            pos += 1;
            data[pos - 1]
        } else {
            0
        };
        let creation_order = if flags & 0x04 != 0 {
            let v = read_uint(data, pos, 8)?;
            pos += 8;
            Some(v)
        } else {
            None
        };
        if flags & 0x10 != 0 {
            // charset; names are decoded lossily either way
            ensure_len(data, pos, 1)?;
            pos += 1;
        }

        let name_len = read_uint(data, pos, name_len_width)? as usize;
        pos += name_len_width as usize;
        ensure_len(data, pos, name_len)?;
        let name = lossy(&data[pos..pos + name_len]);
        pos += name_len;

        let target = match link_type {
            0 => LinkTarget::Hard {
                address: read_uint(data, pos, offset_size)?,
            },
            LINK_TYPE_SOFT => {
                let len = read_u16(data, pos)? as usize;
                ensure_len(data, pos + 2, len)?;
                LinkTarget::Soft {
                    path: lossy(&data[pos + 2..pos + 2 + len]),
                }
            }
            LINK_TYPE_EXTERNAL => {
                let len = read_u16(data, pos)? as usize;
                ensure_len(data, pos + 2, len)?;
                let value = &data[pos + 2..pos + 2 + len];
                // first byte holds version and flags
                let malformed = || FormatError::field(Structure::Link, "type", link_type);
                let rest = value.get(1..).ok_or_else(malformed)?;
                let (file, rest) = split_nul(rest).ok_or_else(malformed)?;
                let path = split_nul(rest).map_or(rest, |(p, _)| p);
                LinkTarget::External {
                    file: lossy(file),
                    path: lossy(path),
                }
            }
            t => return Err(FormatError::field(Structure::Link, "type", t)),
        };

        Ok(LinkMessage {
            name,
            target,
            creation_order,
        })
    }

    pub fn serialize(&self, offset_size: u8) -> Vec<u8> {
        let name = self.name.as_bytes();
        let (width_bits, width) = if name.len() <= 0xFF {
            (0u8, 1usize)
        } else if name.len() <= 0xFFFF {
            (1, 2)
        } else {
            (2, 4)
        };

        let mut flags = width_bits;
        if self.creation_order.is_some() {
            flags |= 0x04;
        }
        let link_type = match self.target {
            LinkTarget::Hard { .. } => None,
            LinkTarget::Soft { .. } => Some(LINK_TYPE_SOFT),
            LinkTarget::External { .. } => Some(LINK_TYPE_EXTERNAL),
        };
        if link_type.is_some() {
            flags |= 0x08;
        }

        let mut buf = vec![1, flags];
        buf.extend(link_type);
        if let Some(order) = self.creation_order {
            buf.extend_from_slice(&order.to_le_bytes());
        }
        buf.extend_from_slice(&(name.len() as u64).to_le_bytes()[..width]);
        buf.extend_from_slice(name);

        match &self.target {
            LinkTarget::Hard { address } => {
                buf.extend_from_slice(&address.to_le_bytes()[..offset_size as usize]);
            }
            LinkTarget::Soft { path } => {
                buf.extend_from_slice(&(path.len() as u16).to_le_bytes());
                buf.extend_from_slice(path.as_bytes());
            }
            LinkTarget::External { file, path } => {
                let len = 1 + file.len() + 1 + path.len() + 1;
                buf.extend_from_slice(&(len as u16).to_le_bytes());
                buf.push(0);
                buf.extend_from_slice(file.as_bytes());
                buf.push(0);
                buf.extend_from_slice(path.as_bytes());
                buf.push(0);
            }
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(link: LinkMessage) {
        assert_eq!(LinkMessage::parse(&link.serialize(8), 8).unwrap(), link);
    }

    #[test]
    fn hard_soft_external() {
        round_trip(LinkMessage {
            name: "data".into(),
            target: LinkTarget::Hard { address: 0x1234 },
            creation_order: None,
        });
        round_trip(LinkMessage {
            name: "alias".into(),
            target: LinkTarget::Soft {
                path: "/entry/data".into(),
            },
            creation_order: Some(3),
        });
        round_trip(LinkMessage {
            name: "ext".into(),
            target: LinkTarget::External {
                file: "images/img_0001.h5".into(),
                path: "/entry/data/data".into(),
            },
            creation_order: None,
        });
    }

    #[test]
    fn long_name_uses_wider_length() {
        let link = LinkMessage {
            name: "n".repeat(300),
            target: LinkTarget::Hard { address: 8 },
            creation_order: None,
        };
        let bytes = link.serialize(8);
        assert_eq!(bytes[1] & 0x03, 1);
        round_trip(link);
    }

    #[test]
    fn unknown_link_type() {
        let data = [1u8, 0x08, 7, 1, b'x', 0, 0];
        assert_eq!(
            LinkMessage::parse(&data, 8),
            Err(FormatError::field(Structure::Link, "type", 7))
        );
    }
}
