//! Manifest sources skip the header and yield the path column in row order.

use annlink::ImageSource;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn header_skipped_two_rows_in_order() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("reverse_image_search.csv");
    std::fs::write(&manifest, "id,path\n0,./train/b.JPEG\n1,./train/a.JPEG\n").unwrap();

    let source = ImageSource::from_spec(manifest.to_str().unwrap());
    assert_eq!(
        source.collect_paths().unwrap(),
        vec![PathBuf::from("./train/b.JPEG"), PathBuf::from("./train/a.JPEG")]
    );
}
