use sha2::{Digest, Sha256};
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{ImageKind, Result, StoredImage, ValidatedFile};

/// Persists uploaded images into a flat directory served as static files
#[derive(Debug, Clone)]
pub struct LocalImageStorage {
    root: PathBuf,
    public_route: String,
}

impl LocalImageStorage {
    /// Creates the upload directory if it does not exist yet
    pub async fn new(config: &Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.upload_dir).await?;
        Ok(Self {
            root: config.upload_dir.clone(),
            public_route: config.uploads_route.trim_end_matches('/').to_string(),
        })
    }

    /// Generates an on-disk name unrelated to the client-supplied one
    pub fn generate_filename(kind: ImageKind) -> String {
        format!("{}.{}", Uuid::new_v4().simple(), kind.extension())
    }

    pub fn public_url(&self, filename: &str) -> String {
        format!("{}/{}", self.public_route, filename)
    }

    pub fn hash_bytes_sha256_hex(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    /// Writes a whole batch. Either every file lands on disk or none does:
    /// a failed write removes the files already written for this batch.
    pub async fn store_batch(&self, files: Vec<ValidatedFile>) -> Result<Vec<StoredImage>> {
        let mut stored: Vec<StoredImage> = Vec::with_capacity(files.len());

        for file in files {
            match self.store_one(file).await {
                Ok(image) => stored.push(image),
                Err(e) => {
                    tracing::error!(error = %e, written = stored.len(), "Failed to persist upload batch; rolling back");
                    self.delete_images(&stored).await;
                    return Err(e);
                }
            }
        }

        tracing::debug!(count = stored.len(), root = %self.root.display(), "Stored upload batch");
        Ok(stored)
    }

    async fn store_one(&self, file: ValidatedFile) -> Result<StoredImage> {
        let filename = Self::generate_filename(file.kind);
        let path = self.root.join(&filename);
        let sha256 = Self::hash_bytes_sha256_hex(&file.data);
        let size_bytes = file.data.len() as u64;

        tokio::fs::write(&path, &file.data).await?;

        Ok(StoredImage {
            url: self.public_url(&filename),
            filename,
            original_name: file.original_name,
            content_type: file.kind.mime_type().to_string(),
            size_bytes,
            sha256,
            path,
        })
    }

    /// Best-effort removal; missing files are not an error
    pub async fn delete_images(&self, images: &[StoredImage]) -> usize {
        let mut removed = 0;
        for image in images {
            match tokio::fs::remove_file(&image.path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(error = %e, filename = %image.filename, "Failed to delete stored image");
                }
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::test_images::png_bytes;

    async fn storage_in(dir: &std::path::Path) -> LocalImageStorage {
        let cfg = Config { upload_dir: dir.to_path_buf(), ..Config::default() };
        LocalImageStorage::new(&cfg).await.unwrap()
    }

    fn png(name: &str) -> ValidatedFile {
        ValidatedFile { original_name: name.to_string(), kind: ImageKind::Png, data: png_bytes(4, 4) }
    }

    #[tokio::test]
    async fn stores_under_generated_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let stored = storage.store_batch(vec![png("a.png"), png("a.png")]).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_ne!(stored[0].filename, stored[1].filename);
        for img in &stored {
            assert_ne!(img.filename, "a.png");
            assert!(img.filename.ends_with(".png"));
            assert_eq!(img.url, format!("/uploads/{}", img.filename));
            assert!(img.path.exists());
            assert_eq!(img.sha256.len(), 64);
        }
        assert_eq!(tokio::fs::read(&stored[0].path).await.unwrap(), png_bytes(4, 4));
    }

    #[tokio::test]
    async fn write_failure_fails_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        let stored = storage.store_batch(vec![png("a.png")]).await.unwrap();

        // Removing the directory makes the next write fail mid-batch
        std::fs::remove_dir_all(dir.path()).unwrap();
        let err = storage.store_batch(vec![png("b.png"), png("c.png")]).await;
        assert!(matches!(err, Err(crate::models::ProcessingError::Storage(_))));
        assert_eq!(storage.delete_images(&stored).await, 0);
    }

    #[tokio::test]
    async fn delete_images_counts_removed_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        let stored = storage.store_batch(vec![png("a.png"), png("b.png")]).await.unwrap();
        assert_eq!(storage.delete_images(&stored).await, 2);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn hashes_are_stable() {
        assert_eq!(
            LocalImageStorage::hash_bytes_sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
