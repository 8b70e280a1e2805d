//! Parse errors.

use core::fmt;

/// On-disk structure an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    Superblock,
    ObjectHeader,
    Dataspace,
    Datatype,
    DataLayout,
    Attribute,
    Link,
    LinkInfo,
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Structure::Superblock => "superblock",
            Structure::ObjectHeader => "object header",
            Structure::Dataspace => "dataspace",
            Structure::Datatype => "datatype",
            Structure::DataLayout => "data layout",
            Structure::Attribute => "attribute",
            Structure::Link => "link",
            Structure::LinkInfo => "link info",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// No superblock signature at 0 or any power-of-two offset from 512.
    SignatureNotFound,
    UnexpectedEof { expected: usize, available: usize },
    /// A structure version this reader does not parse.
    BadVersion { structure: Structure, version: u8 },
    /// An enumerated field holds a value outside its domain.
    BadField {
        structure: Structure,
        field: &'static str,
        value: u8,
    },
    /// Block magic (`OHDR`, `OCHK`) missing.
    BadMagic(Structure),
    /// Unknown message flagged as must-understand.
    UnsupportedMessage(u16),
    /// Jenkins lookup3 mismatch between the stored and computed sums.
    ChecksumMismatch { expected: u32, computed: u32 },
    /// Valid HDF5 this reader does not implement.
    Unsupported(&'static str),
}

impl FormatError {
    pub fn version(structure: Structure, version: u8) -> Self {
        FormatError::BadVersion { structure, version }
    }

    pub fn field(structure: Structure, field: &'static str, value: u8) -> Self {
        FormatError::BadField {
            structure,
            field,
            value,
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::SignatureNotFound => f.write_str("no HDF5 superblock signature"),
            FormatError::UnexpectedEof {
                expected,
                available,
            } => write!(f, "truncated: {expected} bytes needed, {available} present"),
            FormatError::BadVersion { structure, version } => {
                write!(f, "{structure} version {version} not supported")
            }
            FormatError::BadField {
                structure,
                field,
                value,
            } => write!(f, "{structure} {field} has invalid value {value}"),
            FormatError::BadMagic(structure) => write!(f, "{structure} magic missing"),
            FormatError::UnsupportedMessage(id) => {
                write!(f, "required message type {id:#06x} not understood")
            }
            FormatError::ChecksumMismatch { expected, computed } => write!(
                f,
                "checksum {computed:#010x} does not match stored {expected:#010x}"
            ),
            FormatError::Unsupported(what) => write!(f, "{what} not supported"),
        }
    }
}

impl std::error::Error for FormatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_structure() {
        assert_eq!(
            FormatError::version(Structure::DataLayout, 2).to_string(),
            "data layout version 2 not supported"
        );
        assert_eq!(
            FormatError::field(Structure::Link, "type", 7).to_string(),
            "link type has invalid value 7"
        );
    }

    #[test]
    fn eof_message() {
        let e = FormatError::UnexpectedEof {
            expected: 16,
            available: 4,
        };
        assert_eq!(e.to_string(), "truncated: 16 bytes needed, 4 present");
    }
}
