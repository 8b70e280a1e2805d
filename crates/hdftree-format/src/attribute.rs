//! HDF5 Attribute message parsing (message type 0x000C).
//!
//! Only attributes stored directly in an object header are read; attributes
//! kept in dense storage (an attribute-info message with a fractal heap) are
//! not visible through this module.

use crate::bytes::{ensure_len, read_u16};
use crate::dataspace::Dataspace;
use crate::datatype::{parse_charset, CharacterSet, Datatype};
use crate::error::{FormatError, Structure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMessage {
    pub name: String,
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    /// Raw value bytes, `num_elements * datatype.size()` long.
    pub raw_data: Vec<u8>,
}

fn pad8(x: usize) -> usize {
    (x + 7) & !7
}

fn extract_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl AttributeMessage {
    pub fn parse(data: &[u8], length_size: u8) -> Result<AttributeMessage, FormatError> {
        ensure_len(data, 0, 8)?;
        let version = data[0];
        let flags = data[1];
        if !(1..=3).contains(&version) {
            return Err(FormatError::version(Structure::Attribute, version));
        }
        if version > 1 && flags & 0x03 != 0 {
            return Err(FormatError::Unsupported("shared attribute datatype or dataspace"));
        }

        let name_size = read_u16(data, 2)? as usize;
        let datatype_size = read_u16(data, 4)? as usize;
        let dataspace_size = read_u16(data, 6)? as usize;
        let mut pos = 8;
        if version == 3 {
            ensure_len(data, pos, 1)?;
            let _charset: CharacterSet = parse_charset(data[pos])?;
            pos += 1;
        }
        let step = |n: usize| if version == 1 { pad8(n) } else { n };

        ensure_len(data, pos, name_size)?;
        let name = extract_name(&data[pos..pos + name_size]);
        pos += step(name_size);

        ensure_len(data, pos, datatype_size)?;
        let (datatype, _) = Datatype::parse(&data[pos..pos + datatype_size])?;
        pos += step(datatype_size);

        ensure_len(data, pos, dataspace_size)?;
        let dataspace = Dataspace::parse(&data[pos..pos + dataspace_size], length_size)?;
        pos += step(dataspace_size);

        let data_size = (dataspace.num_elements() as usize).saturating_mul(datatype.size() as usize);
        ensure_len(data, pos, data_size)?;
        let raw_data = data[pos..pos + data_size].to_vec();

        Ok(AttributeMessage {
            name,
            datatype,
            dataspace,
            raw_data,
        })
    }

    /// Serialize to a version 3 attribute message (ASCII name).
    pub fn serialize(&self, length_size: u8) -> Vec<u8> {
        let dt = self.datatype.serialize();
        let ds = self.dataspace.serialize(length_size);
        let name_size = self.name.len() + 1;

        let mut buf = Vec::with_capacity(9 + name_size + dt.len() + ds.len() + self.raw_data.len());
        buf.push(3);
        buf.push(0);
        buf.extend_from_slice(&(name_size as u16).to_le_bytes());
        buf.extend_from_slice(&(dt.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(ds.len() as u16).to_le_bytes());
        buf.push(0);
        buf.extend_from_slice(self.name.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&dt);
        buf.extend_from_slice(&ds);
        buf.extend_from_slice(&self.raw_data);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_scalar_f64() {
        let attr = AttributeMessage {
            name: "scale".into(),
            datatype: Datatype::native_f64(),
            dataspace: Dataspace::scalar(),
            raw_data: 2.5f64.to_le_bytes().to_vec(),
        };
        assert_eq!(AttributeMessage::parse(&attr.serialize(8), 8).unwrap(), attr);
    }

    #[test]
    fn v1_padded_fields() {
        let dt = Datatype::integer(4, true).serialize();
        let ds = Dataspace::simple(&[2]).serialize(8);
        let mut buf = vec![1, 0];
        buf.extend_from_slice(&3u16.to_le_bytes());
        buf.extend_from_slice(&(dt.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(ds.len() as u16).to_le_bytes());
        buf.extend_from_slice(b"ab\0\0\0\0\0\0");
        buf.extend_from_slice(&dt);
        buf.resize(buf.len() + pad8(dt.len()) - dt.len(), 0);
        buf.extend_from_slice(&ds);
        buf.resize(buf.len() + pad8(ds.len()) - ds.len(), 0);
        buf.extend_from_slice(&7i32.to_le_bytes());
        buf.extend_from_slice(&(-1i32).to_le_bytes());

        let attr = AttributeMessage::parse(&buf, 8).unwrap();
        assert_eq!(attr.name, "ab");
        assert_eq!(attr.raw_data.len(), 8);
    }

    #[test]
    fn truncated_value() {
        let attr = AttributeMessage {
            name: "v".into(),
            datatype: Datatype::native_f64(),
            dataspace: Dataspace::simple(&[4]),
            raw_data: vec![0; 32],
        };
        let bytes = attr.serialize(8);
        assert!(matches!(
            AttributeMessage::parse(&bytes[..bytes.len() - 8], 8),
            Err(FormatError::UnexpectedEof { .. })
        ));
    }
}
