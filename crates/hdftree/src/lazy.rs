//! The lazy N-dimensional dataset contract and its in-crate implementations.
//!
//! Nothing is read until [`LazySource::read_slice`] is called, and then only
//! the selected region is copied out of the backing storage.

use std::fmt;
use std::sync::Arc;

use hdftree_format::data_layout::DataLayout;
use hdftree_format::dataspace::Dataspace;
use hdftree_format::datatype::Datatype;
use hdftree_format::message_type::MessageType;
use hdftree_format::object_header::ObjectHeader;
use hdftree_io::FileHandle;

use crate::array::{byte_len, Array};
use crate::error::{Error, Result};
use crate::slice::{extract, output_shape, reconcile, ResolvedSlice, SliceSpec};
use crate::types::{classify_datatype, to_native, DType};

/// A dataset whose payload is decoded on demand.
pub trait LazySource: Send + Sync + fmt::Debug {
    /// Whether the backing resource exists and looks valid.
    fn is_readable(&self) -> bool;

    /// Current logical shape.
    fn shape(&self) -> Vec<usize>;

    fn dtype(&self) -> DType;

    /// Decode the region selected by `spec` into a dense array whose shape
    /// is the resolved slice shape.
    fn read_slice(&self, spec: &SliceSpec) -> Result<Array>;

    /// Decode everything.
    fn read(&self) -> Result<Array> {
        self.read_slice(&SliceSpec::all())
    }
}

/// Dataspace, datatype and layout of a dataset object header.
#[derive(Debug, Clone)]
pub(crate) struct DatasetMeta {
    pub dataspace: Dataspace,
    pub datatype: Datatype,
    pub layout: DataLayout,
}

impl DatasetMeta {
    pub fn from_header(hdr: &ObjectHeader, offset_size: u8, length_size: u8) -> Result<Self> {
        let find = |t: MessageType| hdr.find(t).ok_or(Error::MissingMessage(t));
        let dataspace = Dataspace::parse(&find(MessageType::Dataspace)?.data, length_size)?;
        let (datatype, _) = Datatype::parse(&find(MessageType::Datatype)?.data)?;
        let layout = DataLayout::parse(
            &find(MessageType::DataLayout)?.data,
            offset_size,
            length_size,
        )?;
        Ok(Self {
            dataspace,
            datatype,
            layout,
        })
    }

    pub fn shape(&self) -> Vec<usize> {
        self.dataspace
            .dimensions
            .iter()
            .map(|&d| d as usize)
            .collect()
    }
}

/// Dataset stored in an HDF5 file.
///
/// Compact, contiguous and not-yet-allocated storage are read; unallocated
/// storage reads as zeros. Chunked datasets whose chunks have been written
/// report themselves unreadable.
pub struct DatasetSource {
    file: Arc<FileHandle>,
    address: u64,
    meta: DatasetMeta,
    shape: Vec<usize>,
    dtype: DType,
}

impl DatasetSource {
    /// Open the dataset whose object header is at `address`.
    pub fn open(file: Arc<FileHandle>, address: u64) -> Result<Self> {
        let hdr = file.object_header(address)?;
        Self::from_header(file, address, &hdr)
    }

    pub(crate) fn from_header(
        file: Arc<FileHandle>,
        address: u64,
        hdr: &ObjectHeader,
    ) -> Result<Self> {
        let meta = DatasetMeta::from_header(hdr, file.offset_size(), file.length_size())?;
        Ok(Self::from_meta(file, address, meta))
    }

    pub(crate) fn from_meta(file: Arc<FileHandle>, address: u64, meta: DatasetMeta) -> Self {
        let shape = meta.shape();
        let dtype = classify_datatype(&meta.datatype);
        Self {
            file,
            address,
            meta,
            shape,
            dtype,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn layout(&self) -> &DataLayout {
        &self.meta.layout
    }

    /// The full raw payload in file byte order, or `None` if unallocated.
    fn raw(&self) -> Result<Option<&[u8]>> {
        let payload_len = || byte_len(&self.shape, self.dtype.size());
        match &self.meta.layout {
            DataLayout::Compact { data } => {
                let needed = payload_len()?;
                if data.len() < needed {
                    return Err(Error::CorruptNode {
                        path: format!("@{:#x}", self.address),
                        reason: format!("compact data holds {} of {needed} bytes", data.len()),
                    });
                }
                Ok(Some(&data[..needed]))
            }
            DataLayout::Contiguous {
                address: Some(addr),
                ..
            } => Ok(Some(self.file.read_raw(*addr, payload_len()?)?)),
            DataLayout::Contiguous { address: None, .. }
            | DataLayout::Chunked {
                index_address: None,
                ..
            } => Ok(None),
            DataLayout::Chunked { .. } => Err(Error::Unsupported(
                "reading allocated chunked storage".to_string(),
            )),
        }
    }

    fn finish(&self, mut data: Vec<u8>, shape: Vec<usize>) -> Result<Array> {
        if let Some(order) = self.meta.datatype.byte_order() {
            to_native(&mut data, self.dtype.size(), order);
        }
        Array::new(self.dtype, shape, data)
    }
}

impl LazySource for DatasetSource {
    fn is_readable(&self) -> bool {
        self.dtype.size() > 0 && self.raw().is_ok()
    }

    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn read_slice(&self, spec: &SliceSpec) -> Result<Array> {
        if spec.is_everything(&self.shape) {
            return match self.raw()? {
                Some(raw) => self.finish(raw.to_vec(), self.shape.clone()),
                None => Array::zeros(self.dtype, &self.shape),
            };
        }
        let sel = spec.resolve(&self.shape)?;
        let out_shape = output_shape(&sel);
        match self.raw()? {
            Some(raw) => {
                let data = extract(raw, &self.shape, self.dtype.size(), &sel);
                self.finish(data, out_shape)
            }
            None => Array::zeros(self.dtype, &out_shape),
        }
    }
}

impl fmt::Debug for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetSource")
            .field("file", &self.file.path())
            .field("address", &self.address)
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .finish()
    }
}

/// An in-memory array behind the lazy interface.
#[derive(Debug, Clone)]
pub struct ArraySource {
    array: Array,
}

impl ArraySource {
    pub fn new(array: Array) -> Self {
        Self { array }
    }
}

impl LazySource for ArraySource {
    fn is_readable(&self) -> bool {
        true
    }

    fn shape(&self) -> Vec<usize> {
        self.array.shape().to_vec()
    }

    fn dtype(&self) -> DType {
        self.array.dtype()
    }

    fn read_slice(&self, spec: &SliceSpec) -> Result<Array> {
        self.array.slice(spec)
    }
}

/// A view of another source under a nominal shape that differs from the
/// backing shape only by length-1 axes.
#[derive(Debug)]
pub struct Reshaped {
    inner: Arc<dyn LazySource>,
    shape: Vec<usize>,
    mapping: Vec<Option<usize>>,
}

impl Reshaped {
    pub fn new(inner: Arc<dyn LazySource>, shape: &[usize]) -> Result<Self> {
        let mapping = reconcile(shape, &inner.shape())?;
        Ok(Self {
            inner,
            shape: shape.to_vec(),
            mapping,
        })
    }

    /// Wrap `inner` only when its shape differs from `shape`.
    pub fn wrap(inner: Arc<dyn LazySource>, shape: &[usize]) -> Result<Arc<dyn LazySource>> {
        if inner.shape() == shape {
            Ok(inner)
        } else {
            Ok(Arc::new(Self::new(inner, shape)?))
        }
    }
}

impl LazySource for Reshaped {
    fn is_readable(&self) -> bool {
        self.inner.is_readable()
    }

    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn dtype(&self) -> DType {
        self.inner.dtype()
    }

    fn read_slice(&self, spec: &SliceSpec) -> Result<Array> {
        let sel = spec.resolve(&self.shape)?;
        let out_shape = output_shape(&sel);
        if sel.iter().any(|s| s.count == 0) {
            return Array::zeros(self.dtype(), &out_shape);
        }

        let actual = self.inner.shape();
        let mut inner_sel: Vec<ResolvedSlice> = actual.iter().map(|&len| ResolvedSlice::full(len)).collect();
        for (nominal_axis, target) in self.mapping.iter().enumerate() {
            if let Some(a) = target {
                inner_sel[*a] = sel[nominal_axis];
            }
        }
        let part = self.inner.read_slice(&SliceSpec::from_resolved(&inner_sel))?;
        part.reshape(&out_shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdftree_fixtures::{DatasetSpec, FileBuilder, Storage};
    use hdftree_format::datatype::ByteOrder;
    use hdftree_format::link_message::LinkTarget;
    use hdftree_io::MemoryReader;
    use std::path::PathBuf;

    fn open(fb: &FileBuilder, name: &str) -> DatasetSource {
        let file = Arc::new(
            FileHandle::from_reader(
                1,
                PathBuf::from("mem.h5"),
                Box::new(MemoryReader::new(fb.build())),
            )
            .unwrap(),
        );
        let addr = match file.member(file.root_address(), name).unwrap() {
            Some(LinkTarget::Hard { address }) => address,
            other => panic!("unexpected {other:?}"),
        };
        DatasetSource::open(file, addr).unwrap()
    }

    fn grid(fb: &mut FileBuilder, storage: Storage) {
        let values: Vec<f64> = (0..20).map(|v| v as f64).collect();
        fb.dataset("d", DatasetSpec::f64(&[4, 5], &values).storage(storage));
    }

    #[test]
    fn contiguous_slice() {
        let mut fb = FileBuilder::new();
        grid(&mut fb, Storage::Contiguous);
        let src = open(&fb, "d");
        assert!(src.is_readable());
        assert_eq!(src.shape(), vec![4, 5]);

        let a = src
            .read_slice(&SliceSpec::all().start(&[1, 0]).stop(&[3, 5]).step(&[1, 2]))
            .unwrap();
        assert_eq!(a.shape(), &[2, 3]);
        assert_eq!(a.to_vec::<f64>().unwrap(), vec![5.0, 7.0, 9.0, 10.0, 12.0, 14.0]);
    }

    #[test]
    fn whole_read_matches_general_path() {
        let mut fb = FileBuilder::new();
        grid(&mut fb, Storage::Compact);
        let src = open(&fb, "d");
        let fast = src.read().unwrap();
        let general = src
            .read_slice(&SliceSpec::all().start(&[0, 0]).step(&[1, 1]))
            .unwrap();
        assert_eq!(fast, general);
    }

    #[test]
    fn unallocated_reads_zeros() {
        let mut fb = FileBuilder::new();
        fb.dataset(
            "d",
            DatasetSpec::new(Datatype::native_f32(), &[2, 3], Vec::new()).storage(
                Storage::Chunked {
                    chunk: vec![1, 3],
                    allocated: false,
                },
            ),
        );
        let src = open(&fb, "d");
        assert!(src.is_readable());
        let a = src.read_slice(&SliceSpec::all().start(&[1])).unwrap();
        assert_eq!(a.to_vec::<f32>().unwrap(), vec![0.0; 3]);
    }

    #[test]
    fn allocated_chunks_unreadable() {
        let mut fb = FileBuilder::new();
        grid(
            &mut fb,
            Storage::Chunked {
                chunk: vec![2, 5],
                allocated: true,
            },
        );
        let src = open(&fb, "d");
        assert!(!src.is_readable());
        assert!(matches!(src.read(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn big_endian_converted() {
        let mut fb = FileBuilder::new();
        let dt = Datatype::FixedPoint {
            size: 4,
            byte_order: ByteOrder::BigEndian,
            signed: true,
        };
        let raw = [1i32, -2].iter().flat_map(|v| v.to_be_bytes()).collect();
        fb.dataset("d", DatasetSpec::new(dt, &[2], raw));
        let src = open(&fb, "d");
        assert_eq!(src.read().unwrap().to_vec::<i32>().unwrap(), vec![1, -2]);
    }

    #[test]
    fn out_of_bounds_slice() {
        let mut fb = FileBuilder::new();
        grid(&mut fb, Storage::Contiguous);
        let src = open(&fb, "d");
        assert!(matches!(
            src.read_slice(&SliceSpec::all().stop(&[5, 5])),
            Err(Error::SliceOutOfBounds { axis: 0, .. })
        ));
    }

    #[test]
    fn reshaped_view() {
        let base = Array::from_vec(&[1, 3, 4], (0..12).collect::<Vec<u16>>()).unwrap();
        let inner: Arc<dyn LazySource> = Arc::new(ArraySource::new(base));
        let view = Reshaped::new(inner, &[3, 4]).unwrap();
        let a = view
            .read_slice(&SliceSpec::all().start(&[2, 1]).step(&[1, 2]))
            .unwrap();
        assert_eq!(a.shape(), &[1, 2]);
        assert_eq!(a.to_vec::<u16>().unwrap(), vec![9, 11]);
    }

    #[test]
    fn zero_length_axes_agree_across_paths() {
        let base: Arc<dyn LazySource> =
            Arc::new(ArraySource::new(Array::zeros(DType::F32, &[0]).unwrap()));
        let whole = base.read().unwrap();
        assert_eq!(whole.shape(), &[0]);
        let general = base.read_slice(&SliceSpec::all().step(&[1])).unwrap();
        assert_eq!(general, whole);

        let view = Reshaped::new(Arc::clone(&base), &[1, 0]).unwrap();
        let a = view.read().unwrap();
        assert_eq!(a.shape(), &[1, 0]);
        assert!(a.is_empty());
        let b = view.read_slice(&SliceSpec::all().stop(&[1]).step(&[1, 3])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reshaped_rejects_incompatible() {
        let base = Array::zeros(DType::U8, &[4, 3]).unwrap();
        let inner: Arc<dyn LazySource> = Arc::new(ArraySource::new(base));
        assert!(matches!(
            Reshaped::new(inner, &[3, 4]),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
