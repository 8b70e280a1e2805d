//! Dense in-memory arrays returned by slice reads.

use crate::error::{Error, Result};
use crate::slice::{extract, output_shape, SliceSpec};
use crate::types::{decode_strings, DType};

/// Primitive element types an [`Array`] can be viewed as.
pub trait Element: bytemuck::Pod {
    const DTYPE: DType;
}

macro_rules! element {
    ($($t:ty => $d:expr),* $(,)?) => {
        $(impl Element for $t {
            const DTYPE: DType = $d;
        })*
    };
}

element! {
    f32 => DType::F32,
    f64 => DType::F64,
    i8 => DType::I8,
    i16 => DType::I16,
    i32 => DType::I32,
    i64 => DType::I64,
    u8 => DType::U8,
    u16 => DType::U16,
    u32 => DType::U32,
    u64 => DType::U64,
}

/// Number of elements in an array of `shape`, or `None` if it does not fit
/// in `usize`.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape.iter().try_fold(1usize, |n, &d| n.checked_mul(d))
}

/// Size in bytes of a dense array of `shape` with `elem`-byte elements.
pub fn byte_len(shape: &[usize], elem: usize) -> Result<usize> {
    element_count(shape)
        .and_then(|n| n.checked_mul(elem))
        .ok_or_else(|| Error::Unsupported(format!("array of shape {shape:?} does not fit in memory")))
}

/// Row-major array of native-endian elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Array {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl Array {
    /// Wrap raw native-endian bytes; their length must match the shape.
    pub fn new(dtype: DType, shape: Vec<usize>, data: Vec<u8>) -> Result<Array> {
        let expected = byte_len(&shape, dtype.size())?;
        if data.len() != expected {
            return Err(Error::ShapeMismatch {
                expected: vec![expected],
                actual: vec![data.len()],
            });
        }
        Ok(Array { dtype, shape, data })
    }

    pub fn from_vec<T: Element>(shape: &[usize], values: Vec<T>) -> Result<Array> {
        Array::new(
            T::DTYPE,
            shape.to_vec(),
            bytemuck::cast_slice(&values).to_vec(),
        )
    }

    pub fn zeros(dtype: DType, shape: &[usize]) -> Result<Array> {
        let len = byte_len(shape, dtype.size())?;
        Ok(Array {
            dtype,
            shape: shape.to_vec(),
            data: vec![0; len],
        })
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Copy out the elements as `T`, which must match the dtype.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if self.dtype != T::DTYPE {
            return Err(Error::Unsupported(format!(
                "cannot view {} array as {}",
                self.dtype,
                T::DTYPE
            )));
        }
        Ok(bytemuck::pod_collect_to_vec(&self.data))
    }

    /// Decode fixed-length string elements.
    pub fn strings(&self) -> Option<Vec<String>> {
        match self.dtype {
            DType::String(width) => Some(decode_strings(&self.data, width)),
            _ => None,
        }
    }

    /// Same elements under a new shape with the same element count.
    pub fn reshape(self, shape: &[usize]) -> Result<Array> {
        if element_count(shape) != Some(self.len()) {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                actual: self.shape,
            });
        }
        Ok(Array {
            shape: shape.to_vec(),
            ..self
        })
    }

    /// Copy out the sub-array selected by `spec`.
    pub fn slice(&self, spec: &SliceSpec) -> Result<Array> {
        if spec.is_everything(&self.shape) {
            return Ok(self.clone());
        }
        let sel = spec.resolve(&self.shape)?;
        Ok(Array {
            dtype: self.dtype,
            shape: output_shape(&sel),
            data: extract(&self.data, &self.shape, self.dtype.size(), &sel),
        })
    }
}
