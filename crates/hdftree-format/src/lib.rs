//! Read-only parsing of the HDF5 binary format subset used by `hdftree`.
//!
//! Parsers operate on byte slices holding the whole file. Each message type
//! also has a `serialize` counterpart, used to build fixture files.

pub mod attribute;
mod bytes;
pub mod checksum;
pub mod data_layout;
pub mod dataspace;
pub mod datatype;
pub mod error;
pub mod link_info;
pub mod link_message;
pub mod message_type;
pub mod object_header;
pub mod signature;
pub mod superblock;

pub use error::{FormatError, Structure};
