//! Memory-mapped file reader via `memmap2`.

use memmap2::Mmap;
use std::fs;
use std::io;
use std::path::Path;

use crate::HDF5Read;

/// Read-only memory map of a whole file.
pub struct MmapReader {
    _file: fs::File,
    mmap: Mmap,
}

impl MmapReader {
    /// Map `path` for reading.
    ///
    /// The file must not be truncated by another process while mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        // SAFETY: read-only mapping; concurrent modification is the caller's
        // responsibility as documented above.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Bytes `offset..offset + len`, or `None` past the end.
    pub fn read_at(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.mmap.get(offset..offset.checked_add(len)?)
    }
}

impl HDF5Read for MmapReader {
    fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }
}

impl std::fmt::Debug for MmapReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapReader")
            .field("len", &self.mmap.len())
            .finish()
    }
}
