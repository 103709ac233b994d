//! Local license file store

use async_trait::async_trait;
use std::path::PathBuf;

use super::{LocalFileStore, StoreError};

pub struct FsFileStore {
    path: PathBuf,
}

impl FsFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LocalFileStore for FsFileStore {
    async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    async fn read(&self) -> Result<String, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(self.location()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn write(&self, content: &str) -> Result<(), StoreError> {
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFileStore::new(dir.path().join("licenses.json"));

        assert!(!store.exists().await);
        assert!(matches!(store.read().await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFileStore::new(dir.path().join("licenses.json"));

        store.write("[]").await.unwrap();
        assert!(store.exists().await);
        assert_eq!(store.read().await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFileStore::new(dir.path().join("nope").join("licenses.json"));

        assert!(matches!(store.write("[]").await, Err(StoreError::Io(_))));
    }
}
