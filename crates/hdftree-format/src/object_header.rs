//! HDF5 version 2 object headers (`OHDR` + `OCHK` continuation blocks).

use crate::bytes::{ensure_len, read_u16, read_u32, read_uint};
use crate::checksum::jenkins_lookup3;
use crate::error::{FormatError, Structure};
use crate::message_type::MessageType;

const OHDR_SIGNATURE: [u8; 4] = *b"OHDR";
const OCHK_SIGNATURE: [u8; 4] = *b"OCHK";

/// Upper bound on followed continuation blocks; guards against cyclic chains.
const MAX_CONTINUATIONS: usize = 4096;

/// A single parsed header message.
#[derive(Debug, Clone)]
pub struct HeaderMessage {
    /// The message type.
    pub msg_type: MessageType,
    /// Message flags byte.
    pub flags: u8,
    /// Raw message data bytes.
    pub data: Vec<u8>,
}

/// Parsed object header: every non-nil message from every chunk, in order.
#[derive(Debug, Clone)]
pub struct ObjectHeader {
    /// Header version (always 2).
    pub version: u8,
    /// Object header flags.
    pub flags: u8,
    /// Modification time, when the header stores times.
    pub modification_time: Option<u32>,
    /// Messages collected from all chunks.
    pub messages: Vec<HeaderMessage>,
}

impl ObjectHeader {
    /// Parse the object header at `offset`.
    pub fn parse(
        data: &[u8],
        offset: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<ObjectHeader, FormatError> {
        ensure_len(data, offset, 6)?;
        if data[offset..offset + 4] != OHDR_SIGNATURE {
            return Err(FormatError::Unsupported("version 1 object headers"));
        }
        let version = data[offset + 4];
        if version != 2 {
            return Err(FormatError::version(Structure::ObjectHeader, version));
        }
        let flags = data[offset + 5];
        let mut pos = offset + 6;

        let mut modification_time = None;
        if flags & 0x20 != 0 {
            ensure_len(data, pos, 16)?;
            modification_time = Some(read_u32(data, pos + 4)?);
            pos += 16;
        }
        if flags & 0x10 != 0 {
            // max compact / min dense attribute counts
            pos += 4;
        }

        let width = 1u8 << (flags & 0x03);
        let chunk0_size = read_uint(data, pos, width)? as usize;
        pos += width as usize;

        let chunk0_end = pos
            .checked_add(chunk0_size)
            .ok_or(FormatError::UnexpectedEof {
                expected: usize::MAX,
                available: data.len(),
            })?;
        ensure_len(data, chunk0_end, 4)?;
        verify_checksum(data, offset, chunk0_end)?;

        let tracks_order = flags & 0x04 != 0;
        let mut messages = Vec::new();
        let mut continuations = Vec::new();
        parse_messages(
            data,
            pos,
            chunk0_end,
            tracks_order,
            offset_size,
            length_size,
            &mut messages,
            &mut continuations,
        )?;

        let mut followed = 0;
        while let Some((cont_offset, cont_length)) = continuations.pop() {
            followed += 1;
            if followed > MAX_CONTINUATIONS {
                return Err(FormatError::Unsupported("object header continuation cycle"));
            }
            ensure_len(data, cont_offset, cont_length)?;
            if cont_length < 8 || data[cont_offset..cont_offset + 4] != OCHK_SIGNATURE {
                return Err(FormatError::BadMagic(Structure::ObjectHeader));
            }
            let checksum_pos = cont_offset + cont_length - 4;
            verify_checksum(data, cont_offset, checksum_pos)?;
            parse_messages(
                data,
                cont_offset + 4,
                checksum_pos,
                tracks_order,
                offset_size,
                length_size,
                &mut messages,
                &mut continuations,
            )?;
        }

        Ok(ObjectHeader {
            version,
            flags,
            modification_time,
            messages,
        })
    }

    /// First message of the given type.
    pub fn find(&self, msg_type: MessageType) -> Option<&HeaderMessage> {
        self.messages.iter().find(|m| m.msg_type == msg_type)
    }

    /// All messages of the given type, in header order.
    pub fn all(&self, msg_type: MessageType) -> impl Iterator<Item = &HeaderMessage> {
        self.messages.iter().filter(move |m| m.msg_type == msg_type)
    }

    pub fn has(&self, msg_type: MessageType) -> bool {
        self.find(msg_type).is_some()
    }

    /// True when the header describes a (new-style) group.
    pub fn is_group(&self) -> bool {
        self.has(MessageType::LinkInfo)
            || self.has(MessageType::Link)
            || self.has(MessageType::SymbolTable)
    }

    /// True when the header describes a dataset.
    pub fn is_dataset(&self) -> bool {
        self.has(MessageType::DataLayout)
    }
}

fn verify_checksum(data: &[u8], start: usize, checksum_pos: usize) -> Result<(), FormatError> {
    let stored = read_u32(data, checksum_pos)?;
    let computed = jenkins_lookup3(&data[start..checksum_pos]);
    if stored != computed {
        return Err(FormatError::ChecksumMismatch {
            expected: stored,
            computed,
        });
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn parse_messages(
    data: &[u8],
    start: usize,
    end: usize,
    tracks_order: bool,
    offset_size: u8,
    length_size: u8,
    messages: &mut Vec<HeaderMessage>,
    continuations: &mut Vec<(usize, usize)>,
) -> Result<(), FormatError> {
    let prefix = if tracks_order { 6 } else { 4 };
    let mut pos = start;

    // A trailing gap smaller than a message prefix is padding.
    while pos + prefix <= end {
        let msg_type = MessageType::from_u16(data[pos] as u16);
        let size = read_u16(data, pos + 1)? as usize;
        let flags = data[pos + 3];
        pos += prefix;

        if pos + size > end {
            return Err(FormatError::UnexpectedEof {
                expected: pos + size,
                available: end,
            });
        }

        if let MessageType::Unknown(id) = msg_type {
            if flags & 0x08 != 0 {
                return Err(FormatError::UnsupportedMessage(id));
            }
        }

        let body = &data[pos..pos + size];
        match msg_type {
            MessageType::ObjectHeaderContinuation => {
                let cont_offset = read_uint(body, 0, offset_size)? as usize;
                let cont_length = read_uint(body, offset_size as usize, length_size)? as usize;
                continuations.push((cont_offset, cont_length));
            }
            MessageType::Nil => {}
            _ => messages.push(HeaderMessage {
                msg_type,
                flags,
                data: body.to_vec(),
            }),
        }
        pos += size;
    }

    Ok(())
}

/// Writer for single-chunk v2 object headers with checksums.
#[derive(Debug, Default)]
pub struct ObjectHeaderWriter {
    messages: Vec<(MessageType, Vec<u8>, u8)>,
}

impl ObjectHeaderWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message with default flags (0).
    pub fn add_message(&mut self, msg_type: MessageType, data: Vec<u8>) {
        self.messages.push((msg_type, data, 0));
    }

    /// Add a message with specific flags.
    pub fn add_message_with_flags(&mut self, msg_type: MessageType, data: Vec<u8>, flags: u8) {
        self.messages.push((msg_type, data, flags));
    }

    /// Serialized length, without serializing.
    pub fn encoded_len(&self) -> usize {
        let body = self.body_len();
        6 + Self::size_width(body) + body + 4
    }

    /// Serialize the complete header (OHDR + messages + checksum).
    pub fn serialize(&self) -> Vec<u8> {
        let body = self.body_len();
        let width = Self::size_width(body);
        let mut buf = Vec::with_capacity(self.encoded_len());

        buf.extend_from_slice(&OHDR_SIGNATURE);
        buf.push(2);
        buf.push(width.trailing_zeros() as u8);
        buf.extend_from_slice(&(body as u64).to_le_bytes()[..width]);

        for (msg_type, data, flags) in &self.messages {
            buf.push(msg_type.to_u16() as u8);
            buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
            buf.push(*flags);
            buf.extend_from_slice(data);
        }

        let checksum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    fn body_len(&self) -> usize {
        self.messages.iter().map(|(_, data, _)| 4 + data.len()).sum()
    }

    fn size_width(body: usize) -> usize {
        if body <= 0xFF {
            1
        } else if body <= 0xFFFF {
            2
        } else {
            4
        }
    }
}
