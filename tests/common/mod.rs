#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch project root that cleans up automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn root_arg(&self) -> String {
        self.path().to_str().expect("utf-8 temp path").to_string()
    }

    /// Writes `contents` to `name` (relative to the root), creating parents.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Copies the bundled raw fixtures into `data/raw`.
    pub fn with_raw_fixtures(self) -> Self {
        for name in ["orders.csv", "users.csv"] {
            let contents = fs::read_to_string(fixture_path(name)).expect("read fixture");
            self.write(&format!("data/raw/{name}"), &contents);
        }
        self
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(name)).expect("read workspace file")
    }
}
