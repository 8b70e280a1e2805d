//! HDF5 Link Info message (type 0x0002) and group member collection.

use crate::bytes::{ensure_len, read_address, read_uint};
use crate::error::{FormatError, Structure};
use crate::link_message::LinkMessage;
use crate::message_type::MessageType;
use crate::object_header::ObjectHeader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfoMessage {
    pub max_creation_order: Option<u64>,
    /// Fractal heap of dense link storage; `None` for compact groups.
    pub fractal_heap_address: Option<u64>,
    pub name_index_address: Option<u64>,
    pub creation_order_index_address: Option<u64>,
}

impl LinkInfoMessage {
    /// A compact-storage link info message.
    pub fn compact() -> Self {
        Self {
            max_creation_order: None,
            fractal_heap_address: None,
            name_index_address: None,
            creation_order_index_address: None,
        }
    }

    pub fn parse(data: &[u8], offset_size: u8) -> Result<LinkInfoMessage, FormatError> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        if version != 0 {
            return Err(FormatError::version(Structure::LinkInfo, version));
        }
        let flags = data[1];
        let os = offset_size as usize;
        let mut pos = 2;

        let max_creation_order = if flags & 0x01 != 0 {
            let v = read_uint(data, pos, 8)?;
            pos += 8;
            Some(v)
        } else {
            None
        };
        let fractal_heap_address = read_address(data, pos, offset_size)?;
        let name_index_address = read_address(data, pos + os, offset_size)?;
        pos += 2 * os;
        let creation_order_index_address = if flags & 0x02 != 0 {
            read_address(data, pos, offset_size)?
        } else {
            None
        };

        Ok(LinkInfoMessage {
            max_creation_order,
            fractal_heap_address,
            name_index_address,
            creation_order_index_address,
        })
    }

    pub fn serialize(&self, offset_size: u8) -> Vec<u8> {
        let os = offset_size as usize;
        let mut flags = 0u8;
        if self.max_creation_order.is_some() {
            flags |= 0x01;
        }
        if self.creation_order_index_address.is_some() {
            flags |= 0x02;
        }
        let mut buf = vec![0, flags];
        if let Some(v) = self.max_creation_order {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        let addr = |a: Option<u64>| a.unwrap_or(u64::MAX).to_le_bytes();
        buf.extend_from_slice(&addr(self.fractal_heap_address)[..os]);
        buf.extend_from_slice(&addr(self.name_index_address)[..os]);
        if self.creation_order_index_address.is_some() {
            buf.extend_from_slice(&addr(self.creation_order_index_address)[..os]);
        }
        buf
    }
}

/// Body of an empty version 0 Group Info message.
pub fn group_info_message() -> Vec<u8> {
    vec![0, 0]
}

/// Collect the links of a compact-storage group, ordered by name.
pub fn group_links(header: &ObjectHeader, offset_size: u8) -> Result<Vec<LinkMessage>, FormatError> {
    if let Some(msg) = header.find(MessageType::LinkInfo) {
        let info = LinkInfoMessage::parse(&msg.data, offset_size)?;
        if info.fractal_heap_address.is_some() {
            return Err(FormatError::Unsupported("dense link storage"));
        }
    } else if header.has(MessageType::SymbolTable) {
        return Err(FormatError::Unsupported("symbol table groups"));
    }

    let mut links = header
        .all(MessageType::Link)
        .map(|m| LinkMessage::parse(&m.data, offset_size))
        .collect::<Result<Vec<_>, _>>()?;
    links.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(links)
}
