//! Lazy, deduplicating node trees over HDF5 files.
//!
//! Opening a file builds a tree of groups, datasets and attributes without
//! reading any dataset payload beyond scalars. Objects reached through
//! several links (hard, soft, external or legacy mount links) become one
//! shared node. Payloads are decoded only when a slice is requested.
//!
//! ```no_run
//! use hdftree::{SliceSpec, TreeLoader};
//!
//! let loader = TreeLoader::default();
//! let tree = loader.open("scan.h5").unwrap();
//! let frame = tree
//!     .read_slice("/entry/data/data", &SliceSpec::all().start(&[10]).stop(&[11]))
//!     .unwrap();
//! println!("{:?} {}", frame.shape(), frame.dtype());
//! ```
//!
//! Large files can be opened in the background; the call returns once
//! enough nodes exist and loading continues level by level:
//!
//! ```no_run
//! use hdftree::TreeLoader;
//!
//! let tree = TreeLoader::default().open_async("scan.h5", 100).unwrap();
//! tree.wait_ready().unwrap();
//! ```

pub mod array;
pub mod cache;
pub mod error;
pub mod gate;
pub mod lazy;
pub mod link;
mod materialize;
pub mod node;
pub mod options;
pub mod pool;
pub mod slice;
pub mod stack;
pub mod token;
mod tree;
pub mod types;

pub use array::{Array, Element};
pub use cache::{CacheKey, TreeCache};
pub use error::{Error, Result};
pub use gate::LoadState;
pub use lazy::{ArraySource, DatasetSource, LazySource, Reshaped};
pub use materialize::{LoadWarning, WarningKind};
pub use node::{DataNode, DataValue, Node, NodeId, NodeKind, SymbolicNode};
pub use options::LoadOptions;
pub use slice::SliceSpec;
pub use stack::{ImageLoader, ImageStack, RawImageLoader};
pub use token::ObjectToken;
pub use tree::{Tree, TreeLoader};
pub use types::{AttrValue, Attribute, DType};

pub use hdftree_io::{FileHandleTable, ReadMode};
