//! HDF5 Data Layout message parsing (message type 0x0008).

use crate::bytes::{ensure_len, read_address, read_u16, read_u32, read_uint};
use crate::error::{FormatError, Structure};

/// Where and how a dataset's raw data is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLayout {
    /// Raw data stored inside the layout message itself.
    Compact { data: Vec<u8> },
    /// One contiguous block; `address` is `None` until storage is allocated.
    Contiguous { address: Option<u64>, size: u64 },
    /// Chunked storage. `chunk_dims` excludes the trailing element-size
    /// dimension the file format appends.
    Chunked {
        chunk_dims: Vec<u64>,
        element_size: u32,
        index_address: Option<u64>,
    },
}

impl DataLayout {
    pub fn parse(data: &[u8], offset_size: u8, length_size: u8) -> Result<DataLayout, FormatError> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        match version {
            3 => Self::parse_v3(data, offset_size, length_size),
            4 => Self::parse_v4(data, offset_size, length_size),
            v => Err(FormatError::version(Structure::DataLayout, v)),
        }
    }

    fn parse_common(
        class: u8,
        data: &[u8],
        offset_size: u8,
        length_size: u8,
    ) -> Result<Option<DataLayout>, FormatError> {
        let layout = match class {
            0 => {
                let size = read_u16(data, 2)? as usize;
                ensure_len(data, 4, size)?;
                DataLayout::Compact {
                    data: data[4..4 + size].to_vec(),
                }
            }
            1 => DataLayout::Contiguous {
                address: read_address(data, 2, offset_size)?,
                size: read_uint(data, 2 + offset_size as usize, length_size)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(layout))
    }

    fn parse_v3(data: &[u8], offset_size: u8, length_size: u8) -> Result<DataLayout, FormatError> {
        let class = data[1];
        if let Some(layout) = Self::parse_common(class, data, offset_size, length_size)? {
            return Ok(layout);
        }
        if class != 2 {
            return Err(FormatError::field(Structure::DataLayout, "class", class));
        }
        ensure_len(data, 2, 1)?;
        let ndims = data[2] as usize;
        if ndims < 2 {
            return Err(FormatError::Unsupported("chunked layout without dimensions"));
        }
        let index_address = read_address(data, 3, offset_size)?;
        let mut pos = 3 + offset_size as usize;
        let mut dims = Vec::with_capacity(ndims);
        for _ in 0..ndims {
            dims.push(read_u32(data, pos)? as u64);
            pos += 4;
        }
        let element_size = dims.pop().unwrap_or(0) as u32;
        Ok(DataLayout::Chunked {
            chunk_dims: dims,
            element_size,
            index_address,
        })
    }

    fn parse_v4(data: &[u8], offset_size: u8, length_size: u8) -> Result<DataLayout, FormatError> {
        let class = data[1];
        if let Some(layout) = Self::parse_common(class, data, offset_size, length_size)? {
            return Ok(layout);
        }
        match class {
            2 => {}
            3 => return Err(FormatError::Unsupported("virtual dataset layout")),
            c => return Err(FormatError::field(Structure::DataLayout, "class", c)),
        }
        ensure_len(data, 2, 3)?;
        let flags = data[2];
        let ndims = data[3] as usize;
        let enc = data[4];
        if ndims < 2 || !(1..=8).contains(&enc) {
            return Err(FormatError::Unsupported("chunked layout encoding"));
        }
        let mut pos = 5;
        let mut dims = Vec::with_capacity(ndims);
        for _ in 0..ndims {
            ensure_len(data, pos, enc as usize)?;
            let mut raw = [0u8; 8];
            raw[..enc as usize].copy_from_slice(&data[pos..pos + enc as usize]);
            dims.push(u64::from_le_bytes(raw));
            pos += enc as usize;
        }
        ensure_len(data, pos, 1)?;
        let index_type = data[pos];
        pos += 1;
        pos += match index_type {
            // single chunk; filtered size and mask when the filter flag is set
            1 if flags & 0x02 != 0 => length_size as usize + 4,
            1 | 2 => 0,
            3 => 1,
            4 => 5,
            5 => 6,
            _ => return Err(FormatError::Unsupported("chunk index type")),
        };
        let index_address = read_address(data, pos, offset_size)?;
        let element_size = dims.pop().unwrap_or(0) as u32;
        Ok(DataLayout::Chunked {
            chunk_dims: dims,
            element_size,
            index_address,
        })
    }

    /// Serialize to a version 3 layout message.
    pub fn serialize(&self, offset_size: u8, length_size: u8) -> Vec<u8> {
        let os = offset_size as usize;
        let mut buf = vec![3];
        match self {
            DataLayout::Compact { data } => {
                buf.push(0);
                buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
                buf.extend_from_slice(data);
            }
            DataLayout::Contiguous { address, size } => {
                buf.push(1);
                buf.extend_from_slice(&address.unwrap_or(u64::MAX).to_le_bytes()[..os]);
                buf.extend_from_slice(&size.to_le_bytes()[..length_size as usize]);
            }
            DataLayout::Chunked {
                chunk_dims,
                element_size,
                index_address,
            } => {
                buf.push(2);
                buf.push(chunk_dims.len() as u8 + 1);
                buf.extend_from_slice(&index_address.unwrap_or(u64::MAX).to_le_bytes()[..os]);
                for d in chunk_dims {
                    buf.extend_from_slice(&(*d as u32).to_le_bytes());
                }
                buf.extend_from_slice(&element_size.to_le_bytes());
            }
        }
        buf
    }
}
