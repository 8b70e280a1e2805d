//! HDF5 Dataspace message parsing (message type 0x0001).

use crate::bytes::{ensure_len, read_uint};
use crate::error::{FormatError, Structure};

/// Maximum-dimension value meaning "unlimited".
pub const UNLIMITED: u64 = u64::MAX;

/// Type of dataspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataspaceType {
    /// Scalar (single element).
    Scalar,
    /// Simple (N-dimensional array).
    Simple,
    /// Null (no data).
    Null,
}

/// Parsed HDF5 dataspace message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    /// The type of this dataspace.
    pub space_type: DataspaceType,
    /// Current dimension sizes.
    pub dimensions: Vec<u64>,
    /// Maximum dimension sizes, if present. [`UNLIMITED`] means unlimited.
    pub max_dimensions: Option<Vec<u64>>,
}

impl Dataspace {
    /// A simple dataspace with fixed dimensions.
    pub fn simple(dimensions: &[u64]) -> Self {
        Self {
            space_type: DataspaceType::Simple,
            dimensions: dimensions.to_vec(),
            max_dimensions: None,
        }
    }

    pub fn scalar() -> Self {
        Self {
            space_type: DataspaceType::Scalar,
            dimensions: Vec::new(),
            max_dimensions: None,
        }
    }

    /// Number of elements described by this dataspace.
    pub fn num_elements(&self) -> u64 {
        match self.space_type {
            DataspaceType::Null => 0,
            DataspaceType::Scalar => 1,
            DataspaceType::Simple => self
                .dimensions
                .iter()
                .fold(1u64, |acc, &d| acc.saturating_mul(d)),
        }
    }

    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    /// Parse a dataspace message from raw message bytes.
    pub fn parse(data: &[u8], length_size: u8) -> Result<Dataspace, FormatError> {
        ensure_len(data, 0, 4)?;
        let version = data[0];
        let rank = data[1] as usize;
        let flags = data[2];

        let (space_type, mut pos) = match version {
            1 => {
                // byte 3 and 4 more bytes are reserved
                ensure_len(data, 0, 8)?;
                let st = if rank == 0 {
                    DataspaceType::Scalar
                } else {
                    DataspaceType::Simple
                };
                (st, 8usize)
            }
            2 => {
                let st = match data[3] {
                    0 => DataspaceType::Scalar,
                    1 => DataspaceType::Simple,
                    2 => DataspaceType::Null,
                    t => return Err(FormatError::field(Structure::Dataspace, "type", t)),
                };
                (st, 4usize)
            }
            v => return Err(FormatError::version(Structure::Dataspace, v)),
        };

        let ls = length_size as usize;
        let mut dimensions = Vec::with_capacity(rank);
        for _ in 0..rank {
            dimensions.push(read_uint(data, pos, length_size)?);
            pos += ls;
        }

        let max_dimensions = if flags & 0x01 != 0 {
            let mut max = Vec::with_capacity(rank);
            for _ in 0..rank {
                max.push(read_uint(data, pos, length_size)?);
                pos += ls;
            }
            Some(max)
        } else {
            None
        };

        Ok(Dataspace {
            space_type,
            dimensions,
            max_dimensions,
        })
    }

    /// Serialize to a version 2 dataspace message.
    pub fn serialize(&self, length_size: u8) -> Vec<u8> {
        let ls = length_size as usize;
        let mut buf = vec![
            2,
            self.dimensions.len() as u8,
            u8::from(self.max_dimensions.is_some()),
            match self.space_type {
                DataspaceType::Scalar => 0,
                DataspaceType::Simple => 1,
                DataspaceType::Null => 2,
            },
        ];
        for d in &self.dimensions {
            buf.extend_from_slice(&d.to_le_bytes()[..ls]);
        }
        if let Some(max) = &self.max_dimensions {
            for d in max {
                buf.extend_from_slice(&d.to_le_bytes()[..ls]);
            }
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_with_unlimited_max() {
        let ds = Dataspace {
            space_type: DataspaceType::Simple,
            dimensions: vec![4, 6],
            max_dimensions: Some(vec![UNLIMITED, 6]),
        };
        let parsed = Dataspace::parse(&ds.serialize(8), 8).unwrap();
        assert_eq!(parsed, ds);
        assert_eq!(parsed.num_elements(), 24);
    }

    #[test]
    fn scalar_has_one_element() {
        let parsed = Dataspace::parse(&Dataspace::scalar().serialize(8), 8).unwrap();
        assert_eq!(parsed.space_type, DataspaceType::Scalar);
        assert_eq!(parsed.rank(), 0);
        assert_eq!(parsed.num_elements(), 1);
    }

    #[test]
    fn version1_layout() {
        // version 1, rank 1, no max, reserved(5), dim = 7 (4-byte lengths)
        let data = [1u8, 1, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0];
        let ds = Dataspace::parse(&data, 4).unwrap();
        assert_eq!(ds.dimensions, vec![7]);
    }

    #[test]
    fn bad_version() {
        assert_eq!(
            Dataspace::parse(&[9, 0, 0, 0], 8),
            Err(FormatError::version(Structure::Dataspace, 9))
        );
    }
}
