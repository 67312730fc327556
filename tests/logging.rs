use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn writes_log_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("courtside-markup.log");

    courtside_markup::logging::init(true, Some(path.clone()));
    tracing::info!(asset_id = "clip-1", "annotation committed");

    sleep(Duration::from_millis(100));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("annotation committed"));
    assert!(contents.contains("clip-1"));
}
