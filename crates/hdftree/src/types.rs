//! Element types and attribute values.

use std::fmt;

use hdftree_format::attribute::AttributeMessage;
use hdftree_format::datatype::{decode_fixed_string, ByteOrder, Datatype, StringPadding};

/// Simplified element type of a dataset or array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    /// Fixed-length string of the given byte width.
    String(usize),
    /// Anything else, kept as opaque elements of `size` bytes.
    Other { class: u8, size: usize },
}

impl DType {
    /// Element size in bytes.
    pub fn size(&self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F64 | DType::I64 | DType::U64 => 8,
            DType::String(n) => *n,
            DType::Other { size, .. } => *size,
        }
    }

    /// True for integer and float types, whose bytes are endian-sensitive.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DType::String(_) | DType::Other { .. })
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
            DType::I8 => write!(f, "i8"),
            DType::I16 => write!(f, "i16"),
            DType::I32 => write!(f, "i32"),
            DType::I64 => write!(f, "i64"),
            DType::U8 => write!(f, "u8"),
            DType::U16 => write!(f, "u16"),
            DType::U32 => write!(f, "u32"),
            DType::U64 => write!(f, "u64"),
            DType::String(n) => write!(f, "string[{n}]"),
            DType::Other { class, size } => write!(f, "other(class {class}, {size} bytes)"),
        }
    }
}

/// Map a low-level datatype onto [`DType`].
pub(crate) fn classify_datatype(dt: &Datatype) -> DType {
    match dt {
        Datatype::FloatingPoint { size: 4, .. } => DType::F32,
        Datatype::FloatingPoint { size: 8, .. } => DType::F64,
        Datatype::FloatingPoint { size, .. } => DType::Other {
            class: 1,
            size: *size as usize,
        },
        Datatype::FixedPoint { size, signed, .. } => match (size, signed) {
            (1, true) => DType::I8,
            (2, true) => DType::I16,
            (4, true) => DType::I32,
            (8, true) => DType::I64,
            (1, false) => DType::U8,
            (2, false) => DType::U16,
            (4, false) => DType::U32,
            (8, false) => DType::U64,
            _ => DType::Other {
                class: 0,
                size: *size as usize,
            },
        },
        Datatype::String { size, .. } => DType::String(*size as usize),
        Datatype::Other { class, size } => DType::Other {
            class: *class,
            size: *size as usize,
        },
    }
}

/// Convert `raw` elements of `elem` bytes from `order` to native order.
pub(crate) fn to_native(raw: &mut [u8], elem: usize, order: ByteOrder) {
    let foreign = match order {
        ByteOrder::LittleEndian => cfg!(target_endian = "big"),
        ByteOrder::BigEndian => cfg!(target_endian = "little"),
    };
    if foreign && elem > 1 {
        for chunk in raw.chunks_exact_mut(elem) {
            chunk.reverse();
        }
    }
}

/// Decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    F64(f64),
    F64Array(Vec<f64>),
    I64(i64),
    I64Array(Vec<i64>),
    U64(u64),
    U64Array(Vec<u64>),
    String(String),
    StringArray(Vec<String>),
    /// Value of a type without a typed decoding.
    Raw { dtype: DType, bytes: Vec<u8> },
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::F64(v) => Some(*v),
            AttrValue::I64(v) => Some(*v as f64),
            AttrValue::U64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::I64(v) => Some(*v),
            AttrValue::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }
}

/// Named attribute of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

fn element_u64(raw: &[u8], order: ByteOrder) -> u64 {
    let mut buf = [0u8; 8];
    match order {
        ByteOrder::LittleEndian => {
            buf[..raw.len()].copy_from_slice(raw);
            u64::from_le_bytes(buf)
        }
        ByteOrder::BigEndian => {
            buf[8 - raw.len()..].copy_from_slice(raw);
            u64::from_be_bytes(buf)
        }
    }
}

fn sign_extend(v: u64, size: usize) -> i64 {
    let shift = 64 - 8 * size as u32;
    ((v << shift) as i64) >> shift
}

fn collapse<T, F, G>(mut values: Vec<T>, one: F, many: G) -> AttrValue
where
    F: FnOnce(T) -> AttrValue,
    G: FnOnce(Vec<T>) -> AttrValue,
{
    if values.len() == 1 {
        one(values.remove(0))
    } else {
        many(values)
    }
}

/// Decode an attribute message; types without a typed decoding become
/// [`AttrValue::Raw`].
pub(crate) fn decode_attribute(msg: &AttributeMessage) -> Attribute {
    let raw = &msg.raw_data;
    let value = match &msg.datatype {
        Datatype::FixedPoint {
            size: size @ (1 | 2 | 4 | 8),
            byte_order,
            signed,
        } => {
            let size = *size as usize;
            let words = raw.chunks_exact(size).map(|c| element_u64(c, *byte_order));
            if *signed {
                let vals = words.map(|w| sign_extend(w, size)).collect();
                collapse(vals, AttrValue::I64, AttrValue::I64Array)
            } else {
                collapse(words.collect(), AttrValue::U64, AttrValue::U64Array)
            }
        }
        Datatype::FloatingPoint {
            size: size @ (4 | 8),
            byte_order,
        } => {
            let size = *size as usize;
            let vals = raw
                .chunks_exact(size)
                .map(|c| {
                    let w = element_u64(c, *byte_order);
                    if size == 4 {
                        f32::from_bits(w as u32) as f64
                    } else {
                        f64::from_bits(w)
                    }
                })
                .collect();
            collapse(vals, AttrValue::F64, AttrValue::F64Array)
        }
        Datatype::String { size, padding, .. } if *size > 0 => {
            let vals = raw
                .chunks_exact(*size as usize)
                .map(|c| decode_fixed_string(c, *padding))
                .collect();
            collapse(vals, AttrValue::String, AttrValue::StringArray)
        }
        other => AttrValue::Raw {
            dtype: classify_datatype(other),
            bytes: raw.clone(),
        },
    };
    Attribute {
        name: msg.name.clone(),
        value,
    }
}

/// Decode fixed-length string elements, trimming NUL padding.
pub(crate) fn decode_strings(raw: &[u8], width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    raw.chunks_exact(width)
        .map(|c| decode_fixed_string(c, StringPadding::NullPad))
        .collect()
}
