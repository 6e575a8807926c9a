use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{ObjectStore, StoreError};

// An `ObjectStore` backed by a local directory, for development and replay.
#[derive(Debug)]
pub struct LocalObjectStore {
    dir: PathBuf,
}

impl LocalObjectStore {
    pub fn new(dir: impl AsRef<Path>) -> LocalObjectStore {
        LocalObjectStore {
            dir: dir.as_ref().to_owned(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are bucket-relative; never let them climb out of the root.
        let relative: PathBuf = Path::new(key)
            .components()
            .filter(|c| matches!(c, std::path::Component::Normal(_)))
            .collect();
        self.dir.join(relative)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await?)
    }

    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        Ok(())
    }
}
