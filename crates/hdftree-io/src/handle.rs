use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hdftree_format::link_info::group_links;
use hdftree_format::link_message::{LinkMessage, LinkTarget};
use hdftree_format::object_header::ObjectHeader;
use hdftree_format::signature::find_signature;
use hdftree_format::superblock::Superblock;
use hdftree_format::FormatError;
use parking_lot::Mutex;

use crate::{open_reader, HDF5Read, OpenError, ReadMode};

/// An open HDF5 file: reader, superblock and a cache of parsed headers.
///
/// Addresses passed to the methods are file addresses as stored in the
/// container, i.e. relative to the superblock base address.
pub struct FileHandle {
    id: u64,
    path: PathBuf,
    reader: Box<dyn HDF5Read>,
    superblock: Superblock,
    base: u64,
    headers: Mutex<HashMap<u64, Arc<ObjectHeader>>>,
}

impl FileHandle {
    /// Open and validate the file at `path`.
    pub fn open(id: u64, path: &Path, mode: ReadMode) -> Result<FileHandle, OpenError> {
        let reader = open_reader(path, mode).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                OpenError::NotFound(path.to_path_buf())
            } else {
                OpenError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_reader(id, path.to_path_buf(), reader).map_err(|source| OpenError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Wrap an already opened reader.
    pub fn from_reader(
        id: u64,
        path: PathBuf,
        reader: Box<dyn HDF5Read>,
    ) -> Result<FileHandle, FormatError> {
        let bytes = reader.as_bytes();
        let sig = find_signature(bytes)?;
        let superblock = Superblock::parse(bytes, sig)?;
        let base = if superblock.base_address == 0 {
            sig as u64
        } else {
            superblock.base_address
        };
        Ok(FileHandle {
            id,
            path,
            reader,
            superblock,
            base,
            headers: Mutex::new(HashMap::new()),
        })
    }

    /// Process-unique id of this open handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        self.reader.as_bytes()
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn offset_size(&self) -> u8 {
        self.superblock.offset_size
    }

    pub fn length_size(&self) -> u8 {
        self.superblock.length_size
    }

    pub fn root_address(&self) -> u64 {
        self.superblock.root_group_address
    }

    fn absolute(&self, address: u64) -> Result<usize, FormatError> {
        self.base
            .checked_add(address)
            .and_then(|a| usize::try_from(a).ok())
            .ok_or(FormatError::UnexpectedEof {
                expected: usize::MAX,
                available: self.bytes().len(),
            })
    }

    /// Parsed object header at `address`, cached per handle.
    pub fn object_header(&self, address: u64) -> Result<Arc<ObjectHeader>, FormatError> {
        if let Some(hdr) = self.headers.lock().get(&address) {
            return Ok(Arc::clone(hdr));
        }
        let offset = self.absolute(address)?;
        let parsed = ObjectHeader::parse(
            self.bytes(),
            offset,
            self.offset_size(),
            self.length_size(),
        )?;
        let hdr = Arc::new(parsed);
        self.headers.lock().insert(address, Arc::clone(&hdr));
        Ok(hdr)
    }

    /// Links of the group at `address`, in file iteration order.
    pub fn links(&self, address: u64) -> Result<Vec<LinkMessage>, FormatError> {
        let hdr = self.object_header(address)?;
        group_links(&hdr, self.offset_size())
    }

    /// Target of the link called `name` in the group at `address`.
    pub fn member(&self, address: u64, name: &str) -> Result<Option<LinkTarget>, FormatError> {
        Ok(self
            .links(address)?
            .into_iter()
            .find(|l| l.name == name)
            .map(|l| l.target))
    }

    /// `len` raw bytes starting at file address `address`.
    pub fn read_raw(&self, address: u64, len: usize) -> Result<&[u8], FormatError> {
        let start = self.absolute(address)?;
        let bytes = self.bytes();
        start
            .checked_add(len)
            .and_then(|end| bytes.get(start..end))
            .ok_or(FormatError::UnexpectedEof {
                expected: start.saturating_add(len),
                available: bytes.len(),
            })
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("len", &self.reader.len())
            .finish()
    }
}
