use std::path::{Path, PathBuf};

use hashkv_storage::{Backend, StorageConfig};

/// Random data directory under /tmp, removed on drop
pub struct TestDir {
    path: PathBuf,
}

impl TestDir {
    pub fn new(prefix: &str) -> Self {
        let path = PathBuf::from(format!("/tmp/{}_{}", prefix, rand::random::<u64>()));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// RocksDB configuration rooted at this directory
    pub fn config(&self) -> StorageConfig {
        StorageConfig {
            data_dir: self.path.clone(),
            backend: Backend::Rocksdb,
            ..Default::default()
        }
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
