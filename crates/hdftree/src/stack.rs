//! Lazy stacks of per-file images.
//!
//! An [`ImageStack`] presents a 1-D or 2-D grid of image files as one array
//! of shape `dims ++ image_shape`. A slice read touches only the selected
//! files and pushes the in-image part of the slice down to each image.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hdftree_format::datatype::ByteOrder;
use parking_lot::Mutex;
use tracing::debug;

use crate::array::{byte_len, Array};
use crate::error::{Error, Result};
use crate::lazy::{ArraySource, LazySource, Reshaped};
use crate::slice::{output_shape, ResolvedSlice, SliceSpec};
use crate::types::{to_native, DType};

/// Turns one image file into a lazy source.
pub trait ImageLoader: Send + Sync + fmt::Debug {
    fn load(&self, path: &Path) -> Result<Arc<dyn LazySource>>;
}

/// Headerless little-endian images of a fixed type and shape, optionally
/// preceded by a header of `header_bytes` that is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImageLoader {
    dtype: DType,
    shape: Vec<usize>,
    header_bytes: usize,
}

impl RawImageLoader {
    pub fn new(dtype: DType, shape: &[usize]) -> Self {
        Self {
            dtype,
            shape: shape.to_vec(),
            header_bytes: 0,
        }
    }

    pub fn header_bytes(mut self, bytes: usize) -> Self {
        self.header_bytes = bytes;
        self
    }
}

impl ImageLoader for RawImageLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn LazySource>> {
        let raw = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let elem = self.dtype.size();
        let needed = byte_len(&self.shape, elem)?;
        let body = raw
            .get(self.header_bytes..self.header_bytes + needed)
            .ok_or_else(|| Error::ShapeMismatch {
                expected: self.shape.clone(),
                actual: vec![raw.len().saturating_sub(self.header_bytes) / elem.max(1)],
            })?;
        let mut data = body.to_vec();
        if self.dtype.is_numeric() {
            to_native(&mut data, elem, ByteOrder::LittleEndian);
        }
        let array = Array::new(self.dtype, self.shape.clone(), data)?;
        Ok(Arc::new(ArraySource::new(array)))
    }
}

enum Backing {
    Files {
        paths: Vec<PathBuf>,
        loader: Arc<dyn ImageLoader>,
        /// Most recently loaded image, keyed by flat stack index.
        last: Mutex<Option<(usize, Arc<dyn LazySource>)>>,
        loads: AtomicUsize,
    },
    Single(Arc<dyn LazySource>),
}

/// A lazy N-dimensional stack of images.
pub struct ImageStack {
    dims: Vec<usize>,
    image_shape: Vec<usize>,
    dtype: DType,
    backing: Backing,
}

impl ImageStack {
    /// Stack `paths` in row-major order over a grid of shape `dims`.
    ///
    /// The first image is loaded to learn the image shape and type.
    pub fn from_files(paths: Vec<PathBuf>, dims: &[usize], loader: Arc<dyn ImageLoader>) -> Result<Self> {
        if dims.is_empty() || dims.len() > 2 {
            return Err(Error::InvalidSlice(format!(
                "stack grid must have 1 or 2 axes, got {}",
                dims.len()
            )));
        }
        let cells: usize = dims.iter().product();
        if cells != paths.len() || cells == 0 {
            return Err(Error::ShapeMismatch {
                expected: dims.to_vec(),
                actual: vec![paths.len()],
            });
        }
        let first = loader.load(&paths[0])?;
        let stack = Self {
            dims: dims.to_vec(),
            image_shape: first.shape(),
            dtype: first.dtype(),
            backing: Backing::Files {
                paths,
                loader,
                last: Mutex::new(Some((0, first))),
                loads: AtomicUsize::new(1),
            },
        };
        Ok(stack)
    }

    /// A stack whose first axis indexes the images of one dataset.
    pub fn from_source(source: Arc<dyn LazySource>) -> Self {
        let shape = source.shape();
        let split = shape.len().min(1);
        Self {
            dims: shape[..split].to_vec(),
            image_shape: shape[split..].to_vec(),
            dtype: source.dtype(),
            backing: Backing::Single(source),
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn image_shape(&self) -> &[usize] {
        &self.image_shape
    }

    /// Number of image files loaded so far.
    pub fn load_count(&self) -> usize {
        match &self.backing {
            Backing::Files { loads, .. } => loads.load(Ordering::Relaxed),
            Backing::Single(_) => 0,
        }
    }

    fn image(&self, index: usize) -> Result<Arc<dyn LazySource>> {
        let Backing::Files {
            paths,
            loader,
            last,
            loads,
        } = &self.backing
        else {
            return Err(Error::Unsupported("single-source stack has no image files".to_string()));
        };
        let mut last = last.lock();
        if let Some((cached, image)) = last.as_ref() {
            if *cached == index {
                return Ok(Arc::clone(image));
            }
        }
        let path = &paths[index];
        let image = Reshaped::wrap(loader.load(path)?, &self.image_shape)?;
        loads.fetch_add(1, Ordering::Relaxed);
        if image.dtype() != self.dtype {
            return Err(Error::Unsupported(format!(
                "{} holds {} elements, stack holds {}",
                path.display(),
                image.dtype(),
                self.dtype
            )));
        }
        debug!(index, path = %path.display(), "stack image loaded");
        *last = Some((index, Arc::clone(&image)));
        Ok(image)
    }

    /// Flat indices of the selected grid positions, in step order.
    fn positions(&self, stack: &[ResolvedSlice]) -> Vec<usize> {
        match stack {
            [axis] => (0..axis.count).map(|i| axis.index(i)).collect(),
            [rows, cols] => (0..rows.count)
                .flat_map(|r| (0..cols.count).map(move |c| rows.index(r) * self.dims[1] + cols.index(c)))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl LazySource for ImageStack {
    fn is_readable(&self) -> bool {
        match &self.backing {
            Backing::Files { paths, .. } => paths.iter().all(|p| p.is_file()),
            Backing::Single(source) => source.is_readable(),
        }
    }

    fn shape(&self) -> Vec<usize> {
        self.dims.iter().chain(&self.image_shape).copied().collect()
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn read_slice(&self, spec: &SliceSpec) -> Result<Array> {
        let paths = match &self.backing {
            Backing::Single(source) => return source.read_slice(spec),
            Backing::Files { paths, .. } => paths,
        };
        let shape = self.shape();

        if spec.is_everything(&shape) {
            let mut data = Vec::with_capacity(byte_len(&shape, self.dtype.size())?);
            for index in 0..paths.len() {
                data.extend_from_slice(self.image(index)?.read()?.as_bytes());
            }
            return Array::new(self.dtype, shape, data);
        }

        let sel = spec.resolve(&shape)?;
        let out_shape = output_shape(&sel);
        let (stack_sel, image_sel) = sel.split_at(self.dims.len());
        if out_shape.contains(&0) {
            return Array::zeros(self.dtype, &out_shape);
        }
        let image_spec = SliceSpec::from_resolved(image_sel);
        let mut data = Vec::with_capacity(byte_len(&out_shape, self.dtype.size())?);
        for index in self.positions(stack_sel) {
            let part = self.image(index)?.read_slice(&image_spec)?;
            data.extend_from_slice(part.as_bytes());
        }
        Array::new(self.dtype, out_shape, data)
    }
}

impl fmt::Debug for ImageStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageStack")
            .field("dims", &self.dims)
            .field("image_shape", &self.image_shape)
            .field("dtype", &self.dtype)
            .field("loads", &self.load_count())
            .finish()
    }
}
