//! I/O layer for `hdftree`.
//!
//! Readers expose a whole file as one byte slice, the interface the
//! `hdftree-format` parsers expect. [`FileHandle`] pairs a reader with the
//! parsed superblock, and [`FileHandleTable`] shares open handles between
//! every tree and lazy dataset that touches the same path.

use std::io::{self, Read};
use std::path::Path;

pub use hdftree_format;

mod error;
mod handle;
mod table;

#[cfg(feature = "mmap")]
pub mod mmap;

pub use error::OpenError;
pub use handle::FileHandle;
#[cfg(feature = "mmap")]
pub use mmap::MmapReader;
pub use table::FileHandleTable;

/// Read-only access to HDF5 data.
pub trait HDF5Read: Send + Sync {
    /// Returns the entire file content as a byte slice.
    fn as_bytes(&self) -> &[u8];

    fn len(&self) -> usize {
        self.as_bytes().len()
    }

    fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// How files are brought into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Memory-map the file; falls back to [`ReadMode::Buffered`] when the
    /// `mmap` feature is disabled.
    #[default]
    Mmap,
    /// Read the whole file into an owned buffer.
    Buffered,
}

/// In-memory reader backed by an owned `Vec<u8>`.
#[derive(Debug, Clone)]
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl HDF5Read for MemoryReader {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// File-backed reader that loads the entire file into memory.
#[derive(Debug)]
pub struct FileReader {
    data: Vec<u8>,
}

impl FileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Self { data })
    }
}

impl HDF5Read for FileReader {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Open `path` with the reader matching `mode`.
pub fn open_reader(path: &Path, mode: ReadMode) -> io::Result<Box<dyn HDF5Read>> {
    match mode {
        #[cfg(feature = "mmap")]
        ReadMode::Mmap => Ok(Box::new(MmapReader::open(path)?)),
        _ => Ok(Box::new(FileReader::open(path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn memory_reader_basics() {
        let reader = MemoryReader::new(vec![1, 2, 3]);
        assert_eq!(reader.as_bytes(), &[1, 2, 3]);
        assert_eq!(reader.len(), 3);
        assert!(!reader.is_empty());
        assert_eq!(reader.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn file_reader_reads_whole_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello hdf").unwrap();
        let reader = FileReader::open(tmp.path()).unwrap();
        assert_eq!(reader.as_bytes(), b"hello hdf");
    }

    #[test]
    fn open_reader_modes_agree() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[9u8; 64]).unwrap();
        let a = open_reader(tmp.path(), ReadMode::Mmap).unwrap();
        let b = open_reader(tmp.path(), ReadMode::Buffered).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileReader::open(dir.path().join("nope.h5")).is_err());
    }
}
