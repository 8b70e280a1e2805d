//! Builder for small HDF5 files used by the `hdftree` test suites.
//!
//! Files use superblock version 2, 8-byte offsets and lengths, and version 2
//! object headers; groups store their links compactly. Objects are addressed
//! by slash-separated paths; missing intermediate groups are created.
//!
//! Misuse (linking under a dataset, dangling hard-link targets) panics, as
//! this crate only serves tests.

use std::io;
use std::path::Path;

use hdftree_format::attribute::AttributeMessage;
use hdftree_format::data_layout::DataLayout;
use hdftree_format::dataspace::{Dataspace, DataspaceType};
use hdftree_format::datatype::Datatype;
use hdftree_format::link_info::{group_info_message, LinkInfoMessage};
use hdftree_format::link_message::{LinkMessage, LinkTarget};
use hdftree_format::message_type::MessageType;
use hdftree_format::object_header::ObjectHeaderWriter;
use hdftree_format::superblock::Superblock;

const OFFSET_SIZE: u8 = 8;
const LENGTH_SIZE: u8 = 8;

/// How a dataset's raw data is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// Contiguous block after the headers; unallocated when `data` is empty.
    Contiguous,
    /// Inline in the layout message.
    Compact,
    /// Chunked. With `allocated == false` no chunk index exists yet; with
    /// `true` a chunk index address is recorded.
    Chunked { chunk: Vec<u64>, allocated: bool },
}

/// Description of one dataset.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub datatype: Datatype,
    pub shape: Vec<u64>,
    pub max_shape: Option<Vec<u64>>,
    pub storage: Storage,
    /// Little-endian element bytes in row-major order.
    pub data: Vec<u8>,
}

impl DatasetSpec {
    pub fn new(datatype: Datatype, shape: &[u64], data: Vec<u8>) -> Self {
        Self {
            datatype,
            shape: shape.to_vec(),
            max_shape: None,
            storage: Storage::Contiguous,
            data,
        }
    }

    pub fn f64(shape: &[u64], values: &[f64]) -> Self {
        Self::new(
            Datatype::native_f64(),
            shape,
            values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        )
    }

    pub fn i32(shape: &[u64], values: &[i32]) -> Self {
        Self::new(
            Datatype::integer(4, true),
            shape,
            values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        )
    }

    pub fn u16(shape: &[u64], values: &[u16]) -> Self {
        Self::new(
            Datatype::integer(2, false),
            shape,
            values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        )
    }

    /// Scalar fixed-length string.
    pub fn string(value: &str) -> Self {
        Self::new(
            Datatype::fixed_string(value.len().max(1) as u32),
            &[],
            pad_string(value),
        )
    }

    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn max_shape(mut self, max_shape: &[u64]) -> Self {
        self.max_shape = Some(max_shape.to_vec());
        self
    }

    fn dataspace(&self) -> Dataspace {
        Dataspace {
            space_type: if self.shape.is_empty() {
                DataspaceType::Scalar
            } else {
                DataspaceType::Simple
            },
            dimensions: self.shape.clone(),
            max_dimensions: self.max_shape.clone(),
        }
    }

    fn byte_len(&self) -> u64 {
        self.dataspace().num_elements() * self.datatype.size() as u64
    }
}

fn pad_string(value: &str) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    if bytes.is_empty() {
        bytes.push(0);
    }
    bytes
}

#[derive(Debug, Clone)]
enum Link {
    Hard(usize),
    Soft(String),
    External { file: String, path: String },
}

#[derive(Debug, Clone)]
enum Kind {
    Group { links: Vec<(String, Link)>, dense: bool },
    Dataset(DatasetSpec),
}

#[derive(Debug, Clone)]
struct Object {
    kind: Kind,
    attributes: Vec<AttributeMessage>,
}

/// In-memory model of an HDF5 file, serialized by [`FileBuilder::build`].
#[derive(Debug, Clone)]
pub struct FileBuilder {
    objects: Vec<Object>,
}

impl Default for FileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

impl FileBuilder {
    /// A file holding only an empty root group.
    pub fn new() -> Self {
        Self {
            objects: vec![Object {
                kind: Kind::Group {
                    links: Vec::new(),
                    dense: false,
                },
                attributes: Vec::new(),
            }],
        }
    }

    fn child(&self, group: usize, name: &str) -> Option<&Link> {
        match &self.objects[group].kind {
            Kind::Group { links, .. } => links.iter().find(|(n, _)| n == name).map(|(_, l)| l),
            Kind::Dataset(_) => None,
        }
    }

    /// Index of the object at `path`, following hard links only.
    fn lookup(&self, path: &str) -> Option<usize> {
        let mut current = 0;
        for name in split(path) {
            match self.child(current, name)? {
                Link::Hard(idx) => current = *idx,
                _ => return None,
            }
        }
        Some(current)
    }

    fn push(&mut self, kind: Kind) -> usize {
        self.objects.push(Object {
            kind,
            attributes: Vec::new(),
        });
        self.objects.len() - 1
    }

    fn ensure_group(&mut self, path: &[&str]) -> usize {
        let mut current = 0;
        for name in path {
            current = match self.child(current, name) {
                Some(Link::Hard(idx)) => *idx,
                Some(_) => panic!("{name} is not a hard-linked group"),
                None => {
                    let idx = self.push(Kind::Group {
                        links: Vec::new(),
                        dense: false,
                    });
                    self.add_link(current, name, Link::Hard(idx));
                    idx
                }
            };
        }
        current
    }

    fn add_link(&mut self, group: usize, name: &str, link: Link) {
        match &mut self.objects[group].kind {
            Kind::Group { links, .. } => {
                links.retain(|(n, _)| n != name);
                links.push((name.to_string(), link));
            }
            Kind::Dataset(_) => panic!("cannot add link {name} under a dataset"),
        }
    }

    fn link_at(&mut self, path: &str, link: Link) {
        let parts = split(path);
        let (name, parents) = parts.split_last().unwrap_or_else(|| panic!("empty path"));
        let parent = self.ensure_group(parents);
        self.add_link(parent, name, link);
    }

    /// Create the group at `path` (and any missing parents).
    pub fn group(&mut self, path: &str) -> &mut Self {
        self.ensure_group(&split(path));
        self
    }

    /// Create a group whose link info claims dense (fractal heap) storage.
    pub fn dense_group(&mut self, path: &str) -> &mut Self {
        let idx = self.ensure_group(&split(path));
        if let Kind::Group { dense, .. } = &mut self.objects[idx].kind {
            *dense = true;
        }
        self
    }

    pub fn dataset(&mut self, path: &str, spec: DatasetSpec) -> &mut Self {
        let idx = self.push(Kind::Dataset(spec));
        self.link_at(path, Link::Hard(idx));
        self
    }

    pub fn dataset_f64(&mut self, path: &str, shape: &[u64], values: &[f64]) -> &mut Self {
        self.dataset(path, DatasetSpec::f64(shape, values))
    }

    pub fn dataset_i32(&mut self, path: &str, shape: &[u64], values: &[i32]) -> &mut Self {
        self.dataset(path, DatasetSpec::i32(shape, values))
    }

    pub fn dataset_u16(&mut self, path: &str, shape: &[u64], values: &[u16]) -> &mut Self {
        self.dataset(path, DatasetSpec::u16(shape, values))
    }

    pub fn dataset_str(&mut self, path: &str, value: &str) -> &mut Self {
        self.dataset(path, DatasetSpec::string(value))
    }

    /// Second hard link to the object already at `target`.
    pub fn hard_link(&mut self, path: &str, target: &str) -> &mut Self {
        let idx = self
            .lookup(target)
            .unwrap_or_else(|| panic!("hard link target {target} does not exist"));
        self.link_at(path, Link::Hard(idx));
        self
    }

    pub fn soft_link(&mut self, path: &str, target: &str) -> &mut Self {
        self.link_at(path, Link::Soft(target.to_string()));
        self
    }

    pub fn external_link(&mut self, path: &str, file: &str, target: &str) -> &mut Self {
        self.link_at(
            path,
            Link::External {
                file: file.to_string(),
                path: target.to_string(),
            },
        );
        self
    }

    /// Attach an attribute to the object at `path`.
    pub fn attr(&mut self, path: &str, attr: AttributeMessage) -> &mut Self {
        let idx = self
            .lookup(path)
            .unwrap_or_else(|| panic!("attribute owner {path} does not exist"));
        let attrs = &mut self.objects[idx].attributes;
        attrs.retain(|a| a.name != attr.name);
        attrs.push(attr);
        self
    }

    pub fn attr_str(&mut self, path: &str, name: &str, value: &str) -> &mut Self {
        let raw = pad_string(value);
        self.attr(
            path,
            AttributeMessage {
                name: name.to_string(),
                datatype: Datatype::fixed_string(raw.len() as u32),
                dataspace: Dataspace::scalar(),
                raw_data: raw,
            },
        )
    }

    pub fn attr_f64(&mut self, path: &str, name: &str, value: f64) -> &mut Self {
        self.attr(
            path,
            AttributeMessage {
                name: name.to_string(),
                datatype: Datatype::native_f64(),
                dataspace: Dataspace::scalar(),
                raw_data: value.to_le_bytes().to_vec(),
            },
        )
    }

    pub fn attr_i64_array(&mut self, path: &str, name: &str, values: &[i64]) -> &mut Self {
        self.attr(
            path,
            AttributeMessage {
                name: name.to_string(),
                datatype: Datatype::integer(8, true),
                dataspace: Dataspace::simple(&[values.len() as u64]),
                raw_data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
            },
        )
    }

    fn header(&self, idx: usize, headers: &[u64], blocks: &[Option<u64>]) -> Vec<u8> {
        let obj = &self.objects[idx];
        let mut w = ObjectHeaderWriter::new();
        match &obj.kind {
            Kind::Group { links, dense } => {
                let mut info = LinkInfoMessage::compact();
                if *dense {
                    info.fractal_heap_address = Some(0);
                }
                w.add_message(MessageType::LinkInfo, info.serialize(OFFSET_SIZE));
                w.add_message(MessageType::GroupInfo, group_info_message());
                for (name, link) in links {
                    let target = match link {
                        Link::Hard(i) => LinkTarget::Hard {
                            address: headers[*i],
                        },
                        Link::Soft(path) => LinkTarget::Soft { path: path.clone() },
                        Link::External { file, path } => LinkTarget::External {
                            file: file.clone(),
                            path: path.clone(),
                        },
                    };
                    let msg = LinkMessage {
                        name: name.clone(),
                        target,
                        creation_order: None,
                    };
                    w.add_message(MessageType::Link, msg.serialize(OFFSET_SIZE));
                }
            }
            Kind::Dataset(spec) => {
                w.add_message(
                    MessageType::Dataspace,
                    spec.dataspace().serialize(LENGTH_SIZE),
                );
                w.add_message_with_flags(MessageType::Datatype, spec.datatype.serialize(), 0x01);
                let layout = match &spec.storage {
                    Storage::Compact => DataLayout::Compact {
                        data: spec.data.clone(),
                    },
                    Storage::Contiguous => DataLayout::Contiguous {
                        address: blocks[idx],
                        size: spec.byte_len(),
                    },
                    Storage::Chunked { chunk, allocated } => DataLayout::Chunked {
                        chunk_dims: chunk.clone(),
                        element_size: spec.datatype.size(),
                        index_address: allocated.then_some(headers[idx]),
                    },
                };
                w.add_message(
                    MessageType::DataLayout,
                    layout.serialize(OFFSET_SIZE, LENGTH_SIZE),
                );
            }
        }
        for attr in &obj.attributes {
            w.add_message(MessageType::Attribute, attr.serialize(LENGTH_SIZE));
        }
        w.serialize()
    }

    fn contiguous_data(&self, idx: usize) -> Option<&[u8]> {
        match &self.objects[idx].kind {
            Kind::Dataset(spec) if spec.storage == Storage::Contiguous && !spec.data.is_empty() => {
                Some(&spec.data)
            }
            _ => None,
        }
    }

    /// Serialize the whole file.
    pub fn build(&self) -> Vec<u8> {
        let n = self.objects.len();
        let sb_len = Superblock::encoded_len(OFFSET_SIZE) as u64;

        // Header sizes do not depend on the addresses they embed.
        let placeholder_headers = vec![0u64; n];
        let placeholder_blocks: Vec<Option<u64>> = (0..n)
            .map(|i| self.contiguous_data(i).map(|_| 0))
            .collect();
        let mut headers = Vec::with_capacity(n);
        let mut cursor = sb_len;
        for i in 0..n {
            headers.push(cursor);
            cursor += self.header(i, &placeholder_headers, &placeholder_blocks).len() as u64;
        }
        let mut blocks = Vec::with_capacity(n);
        for i in 0..n {
            match self.contiguous_data(i) {
                Some(data) => {
                    blocks.push(Some(cursor));
                    cursor += data.len() as u64;
                }
                None => blocks.push(None),
            }
        }

        let superblock = Superblock {
            version: 2,
            offset_size: OFFSET_SIZE,
            length_size: LENGTH_SIZE,
            consistency_flags: 0,
            base_address: 0,
            superblock_extension_address: None,
            eof_address: cursor,
            root_group_address: headers[0],
        };

        let mut out = superblock.serialize();
        for i in 0..n {
            out.extend_from_slice(&self.header(i, &headers, &blocks));
        }
        for i in 0..n {
            if let Some(data) = self.contiguous_data(i) {
                out.extend_from_slice(data);
            }
        }
        debug_assert_eq!(out.len() as u64, cursor);
        out
    }

    /// Serialize to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.build())
    }
}
