//! Slice properties of the lazy sources.

use std::path::PathBuf;
use std::sync::Arc;

use hdftree::{Array, ArraySource, DType, DatasetSource, ImageStack, LazySource, RawImageLoader, Reshaped, SliceSpec};
use hdftree_fixtures::{DatasetSpec, FileBuilder, Storage};
use hdftree_format::link_message::LinkTarget;
use hdftree_io::{FileHandle, MemoryReader};
use proptest::prelude::*;

fn dataset(shape: &[usize], storage: Storage) -> DatasetSource {
    let n: usize = shape.iter().product();
    let values: Vec<f64> = (0..n).map(|v| v as f64).collect();
    let dims: Vec<u64> = shape.iter().map(|&d| d as u64).collect();
    let mut fb = FileBuilder::new();
    fb.dataset("d", DatasetSpec::f64(&dims, &values).storage(storage));
    let file = Arc::new(
        FileHandle::from_reader(1, PathBuf::from("mem.h5"), Box::new(MemoryReader::new(fb.build())))
            .unwrap(),
    );
    let address = match file.member(file.root_address(), "d").unwrap() {
        Some(LinkTarget::Hard { address }) => address,
        other => panic!("unexpected {other:?}"),
    };
    DatasetSource::open(file, address).unwrap()
}

/// Shape plus an explicit in-bounds slice over it.
fn shape_and_slice() -> impl Strategy<Value = (Vec<usize>, Vec<(usize, usize, usize)>)> {
    prop::collection::vec(1usize..6, 1..=3).prop_flat_map(|shape| {
        let axes: Vec<_> = shape
            .iter()
            .map(|&len| {
                (0..=len).prop_flat_map(move |start| (Just(start), start..=len, 1usize..4))
            })
            .collect();
        (Just(shape), axes)
    })
}

fn spec(axes: &[(usize, usize, usize)]) -> SliceSpec {
    SliceSpec::all()
        .start(&axes.iter().map(|a| a.0).collect::<Vec<_>>())
        .stop(&axes.iter().map(|a| a.1).collect::<Vec<_>>())
        .step(&axes.iter().map(|a| a.2).collect::<Vec<_>>())
}

/// Flat indices selected by `axes` over `shape`, in row-major order.
fn reference(shape: &[usize], axes: &[(usize, usize, usize)]) -> Vec<f64> {
    let picks: Vec<Vec<usize>> = axes
        .iter()
        .map(|&(start, stop, step)| (start..stop).step_by(step).collect())
        .collect();
    let mut out = vec![0usize];
    for (axis, pick) in picks.iter().enumerate() {
        out = out
            .iter()
            .flat_map(|&base| pick.iter().map(move |&i| base * shape[axis] + i))
            .collect();
    }
    out.into_iter().map(|v| v as f64).collect()
}

proptest! {
    #[test]
    fn slice_matches_reference((shape, axes) in shape_and_slice()) {
        let src = dataset(&shape, Storage::Contiguous);
        let a = src.read_slice(&spec(&axes)).unwrap();
        let expected_shape: Vec<usize> = axes
            .iter()
            .map(|&(start, stop, step)| (stop - start).div_ceil(step))
            .collect();
        prop_assert_eq!(a.shape(), expected_shape.as_slice());
        prop_assert_eq!(a.to_vec::<f64>().unwrap(), reference(&shape, &axes));
    }

    #[test]
    fn split_then_concatenate((shape, axes) in shape_and_slice(), cut in 0usize..6) {
        let src = dataset(&shape, Storage::Compact);
        let len = shape[0];
        let cut = cut.min(len);

        let mut whole_axes = axes.clone();
        whole_axes[0] = (0, len, 1);
        let whole = src.read_slice(&spec(&whole_axes)).unwrap();

        let mut head_axes = whole_axes.clone();
        head_axes[0] = (0, cut, 1);
        let mut tail_axes = whole_axes.clone();
        tail_axes[0] = (cut, len, 1);
        let head = src.read_slice(&spec(&head_axes)).unwrap();
        let tail = src.read_slice(&spec(&tail_axes)).unwrap();

        let mut joined = head.as_bytes().to_vec();
        joined.extend_from_slice(tail.as_bytes());
        prop_assert_eq!(joined.as_slice(), whole.as_bytes());
        prop_assert_eq!(head.shape()[0] + tail.shape()[0], whole.shape()[0]);
    }

    #[test]
    fn whole_read_equals_general_path(shape in prop::collection::vec(1usize..6, 1..=3)) {
        let src = dataset(&shape, Storage::Contiguous);
        let rank = shape.len();
        let general = src
            .read_slice(&SliceSpec::all().start(&vec![0; rank]).step(&vec![1; rank]))
            .unwrap();
        prop_assert_eq!(src.read().unwrap(), general);
    }

    #[test]
    fn reshaped_view_agrees((shape, axes) in shape_and_slice()) {
        let n: usize = shape.iter().product();
        let mut padded = vec![1];
        padded.extend(&shape);
        let base = Array::from_vec(&padded, (0..n).map(|v| v as f64).collect()).unwrap();
        let view = Reshaped::new(Arc::new(ArraySource::new(base)), &shape).unwrap();
        let a = view.read_slice(&spec(&axes)).unwrap();
        prop_assert_eq!(a.to_vec::<f64>().unwrap(), reference(&shape, &axes));
    }

    #[test]
    fn empty_axes_read_whole(shape in prop::collection::vec(0usize..4, 1..=3)) {
        let n: usize = shape.iter().product();
        let base = Array::from_vec(&shape, vec![0u16; n]).unwrap();
        let src: Arc<dyn LazySource> = Arc::new(ArraySource::new(base));
        let rank = shape.len();
        let fast = src.read().unwrap();
        let general = src.read_slice(&SliceSpec::all().step(&vec![1; rank])).unwrap();
        prop_assert_eq!(&fast, &general);

        let mut padded = vec![1];
        padded.extend(&shape);
        let view = Reshaped::new(src, &padded).unwrap();
        let a = view.read().unwrap();
        prop_assert_eq!(a.shape(), padded.as_slice());
        prop_assert_eq!(a.as_bytes(), fast.as_bytes());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn stack_agrees_with_dense_array(
        (shape, axes) in prop::collection::vec(1usize..5, 3..=3)
            .prop_flat_map(|shape| {
                let axes: Vec<_> = shape
                    .iter()
                    .map(|&len| (0..len).prop_flat_map(move |start| (Just(start), start + 1..=len, 1usize..3)))
                    .collect();
                (Just(shape), axes)
            })
    ) {
        let dir = tempfile::tempdir().unwrap();
        let per_image = shape[1] * shape[2];
        let paths: Vec<PathBuf> = (0..shape[0])
            .map(|i| {
                let path = dir.path().join(format!("{i}.raw"));
                let bytes: Vec<u8> = (0..per_image)
                    .flat_map(|v| ((i * per_image + v) as f64).to_le_bytes())
                    .collect();
                std::fs::write(&path, bytes).unwrap();
                path
            })
            .collect();
        let loader = Arc::new(RawImageLoader::new(DType::F64, &shape[1..]));
        let stack = ImageStack::from_files(paths, &shape[..1], loader).unwrap();
        let a = stack.read_slice(&spec(&axes)).unwrap();
        prop_assert_eq!(a.to_vec::<f64>().unwrap(), reference(&shape, &axes));
    }
}

#[test]
fn implicit_empty_range_is_rejected() {
    let src = dataset(&[4, 3], Storage::Contiguous);
    assert!(src.read_slice(&SliceSpec::all().start(&[4])).is_err());
    let empty = src
        .read_slice(&SliceSpec::all().start(&[4]).stop(&[4]))
        .unwrap();
    assert_eq!(empty.shape(), &[0, 3]);
}
