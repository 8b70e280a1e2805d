mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hdftree::{
    DType, Error, ImageLoader, ImageStack, LazySource, RawImageLoader, Result, SliceSpec, Tree,
    TreeLoader,
};
use hdftree_fixtures::{DatasetSpec, FileBuilder};
use parking_lot::Mutex;

const SIDE: usize = 10;

fn pixel(image: usize, offset: usize) -> u16 {
    (image * 1000 + offset) as u16
}

fn raw_images(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("frame_{i:04}.raw"));
            let bytes: Vec<u8> = (0..SIDE * SIDE)
                .flat_map(|o| pixel(i, o).to_le_bytes())
                .collect();
            std::fs::write(&path, bytes).unwrap();
            path
        })
        .collect()
}

fn image_values(i: usize) -> Vec<u16> {
    (0..SIDE * SIDE).map(|o| pixel(i, o)).collect()
}

fn raw_stack(dir: &Path, count: usize) -> ImageStack {
    let loader = Arc::new(RawImageLoader::new(DType::U16, &[SIDE, SIDE]));
    ImageStack::from_files(raw_images(dir, count), &[count], loader).unwrap()
}

#[test]
fn middle_frames_match_whole_files() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let stack = raw_stack(dir.path(), 10);
    assert_eq!(stack.shape(), vec![10, SIDE, SIDE]);

    let a = stack
        .read_slice(
            &SliceSpec::all()
                .start(&[2, 0, 0])
                .stop(&[5, 10, 10])
                .step(&[1, 1, 1]),
        )
        .unwrap();
    assert_eq!(a.shape(), &[3, SIDE, SIDE]);

    let loader = RawImageLoader::new(DType::U16, &[SIDE, SIDE]);
    let mut expected = Vec::new();
    for i in 2..5 {
        let path = dir.path().join(format!("frame_{i:04}.raw"));
        let whole = loader.load(&path).unwrap().read().unwrap();
        expected.extend(whole.to_vec::<u16>().unwrap());
    }
    assert_eq!(a.to_vec::<u16>().unwrap(), expected);
}

#[test]
fn full_read_loads_each_file_once() {
    let dir = tempfile::tempdir().unwrap();
    let stack = raw_stack(dir.path(), 10);
    let a = stack.read().unwrap();
    assert_eq!(a.shape(), &[10, SIDE, SIDE]);
    let expected: Vec<u16> = (0..10).flat_map(image_values).collect();
    assert_eq!(a.to_vec::<u16>().unwrap(), expected);
    // image 0 stays cached from construction
    assert_eq!(stack.load_count(), 10);
}

#[test]
fn stepped_selection_visits_only_selected_files() {
    let dir = tempfile::tempdir().unwrap();
    let stack = raw_stack(dir.path(), 10);
    let a = stack
        .read_slice(&SliceSpec::all().start(&[1, 4, 7]).stop(&[10, 5, 8]).step(&[3]))
        .unwrap();
    assert_eq!(a.shape(), &[3, 1, 1]);
    assert_eq!(
        a.to_vec::<u16>().unwrap(),
        vec![pixel(1, 47), pixel(4, 47), pixel(7, 47)]
    );
    assert_eq!(stack.load_count(), 4);
}

#[test]
fn missing_frame_fails_only_when_touched() {
    let dir = tempfile::tempdir().unwrap();
    let stack = raw_stack(dir.path(), 5);
    std::fs::remove_file(dir.path().join("frame_0003.raw")).unwrap();
    assert!(!stack.is_readable());

    let ok = stack.read_slice(&SliceSpec::all().start(&[0]).stop(&[2])).unwrap();
    assert_eq!(ok.shape(), &[2, SIDE, SIDE]);
    let err = stack
        .read_slice(&SliceSpec::all().start(&[3]).stop(&[4]))
        .unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
}

#[test]
fn grid_stack_over_rows_and_columns() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(RawImageLoader::new(DType::U16, &[SIDE, SIDE]));
    let stack = ImageStack::from_files(raw_images(dir.path(), 6), &[2, 3], loader).unwrap();
    assert_eq!(stack.shape(), vec![2, 3, SIDE, SIDE]);

    let a = stack
        .read_slice(
            &SliceSpec::all()
                .start(&[0, 0, 9, 0])
                .stop(&[2, 3, 10, 10])
                .step(&[1, 2, 1, 9]),
        )
        .unwrap();
    assert_eq!(a.shape(), &[2, 2, 1, 2]);
    let expected: Vec<u16> = [0, 2, 3, 5]
        .iter()
        .flat_map(|&i| [pixel(i, 90), pixel(i, 99)])
        .collect();
    assert_eq!(a.to_vec::<u16>().unwrap(), expected);
}

#[test]
fn bad_slices_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let stack = raw_stack(dir.path(), 4);
    assert!(stack.read_slice(&SliceSpec::all().stop(&[5])).is_err());
    assert!(stack.read_slice(&SliceSpec::all().step(&[0])).is_err());
    assert!(stack
        .read_slice(&SliceSpec::all().start(&[0, 0, 0, 0]))
        .is_err());
}

/// Loads `/entry/image` from one HDF5 file per frame.
#[derive(Debug)]
struct Hdf5FrameLoader {
    loader: TreeLoader,
    trees: Mutex<Vec<Tree>>,
}

impl ImageLoader for Hdf5FrameLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn LazySource>> {
        let tree = self.loader.open(path)?;
        let source = tree
            .lazy_source("/entry/image")
            .ok_or_else(|| Error::Unsupported(format!("{} has no frame", path.display())))?;
        self.trees.lock().push(tree);
        Ok(source)
    }
}

#[test]
fn hdf5_frames_with_extra_unit_axis() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<PathBuf> = (0..4)
        .map(|i| {
            // every frame but the first carries a leading length-1 axis
            let dims: &[u64] = if i == 0 { &[10, 10] } else { &[1, 10, 10] };
            let mut fb = FileBuilder::new();
            fb.group("/entry")
                .dataset("/entry/image", DatasetSpec::u16(dims, &image_values(i)));
            common::write(dir.path(), &format!("frame_{i}.h5"), &fb)
        })
        .collect();

    let frames = Arc::new(Hdf5FrameLoader {
        loader: TreeLoader::default(),
        trees: Mutex::new(Vec::new()),
    });
    let stack = ImageStack::from_files(paths, &[4], frames.clone()).unwrap();
    assert_eq!(stack.image_shape(), &[SIDE, SIDE]);

    let a = stack
        .read_slice(&SliceSpec::all().start(&[1, 2]).stop(&[4, 3]))
        .unwrap();
    assert_eq!(a.shape(), &[3, 1, SIDE]);
    let expected: Vec<u16> = (1..4).flat_map(|i| (20..30).map(move |o| pixel(i, o))).collect();
    assert_eq!(a.to_vec::<u16>().unwrap(), expected);

    frames.trees.lock().clear();
    assert!(frames.loader.handles().is_empty());
}

#[test]
fn dataset_backed_stack_delegates() {
    let dir = tempfile::tempdir().unwrap();
    let values: Vec<u16> = (0..3).flat_map(image_values).collect();
    let mut fb = FileBuilder::new();
    fb.dataset_u16("/frames", &[3, 10, 10], &values);
    let path = common::write(dir.path(), "frames.h5", &fb);

    let tree = TreeLoader::default().open(&path).unwrap();
    let stack = ImageStack::from_source(tree.lazy_source("/frames").unwrap());
    assert_eq!(stack.dims(), &[3]);
    assert_eq!(stack.image_shape(), &[SIDE, SIDE]);

    let a = stack.read_slice(&SliceSpec::all().start(&[2])).unwrap();
    assert_eq!(a.to_vec::<u16>().unwrap(), image_values(2));
}
