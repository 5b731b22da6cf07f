//! Filesystem-backed blob store for gallery images.
//!
//! The rest of the service only reasons about storage keys; where the bytes
//! actually live is this module's concern alone.

use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Clone, Debug)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are service-generated (see gallery::storage_key_for); reject
        // anything that would escape the media root regardless.
        let sanitized: PathBuf = Path::new(key)
            .components()
            .filter(|c| matches!(c, std::path::Component::Normal(_)))
            .collect();
        self.root.join(sanitized)
    }

    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(self.url_for(key))
    }

    /// Removes the blob if present. Returns whether a file was deleted.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("/media/{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_components_are_stripped() {
        let store = BlobStore::new("/srv/media");
        assert_eq!(
            store.path_for("../../etc/passwd"),
            PathBuf::from("/srv/media/etc/passwd")
        );
        assert_eq!(
            store.path_for("products/p/1"),
            PathBuf::from("/srv/media/products/p/1")
        );
    }

    #[tokio::test]
    async fn put_then_delete_round_trip() {
        let dir = std::env::temp_dir().join(format!("blobstore-{}", uuid::Uuid::new_v4()));
        let store = BlobStore::new(&dir);
        let url = store.put("products/x/1", b"bytes").await.unwrap();
        assert_eq!(url, "/media/products/x/1");
        assert!(store.delete("products/x/1").await.unwrap());
        assert!(!store.delete("products/x/1").await.unwrap());
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
