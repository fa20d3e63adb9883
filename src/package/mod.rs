//! Problem package manager.

mod extract;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};

use crate::error::PackageError;
use crate::types::ObjectId;

pub use extract::extract_zip;

/// External collaborator that fetches one package's archive to `dest`. The transport is out of
/// scope here; this crate owns the caching/single-flight/extraction logic around it.
#[async_trait]
pub trait PackageDownloader: Send + Sync {
    async fn download(&self, package_id: ObjectId, dest: &Path) -> Result<(), PackageError>;
}

type Slot = Arc<OnceCell<PathBuf>>;

/// Keeps at most one in-flight download+extraction per `package_id`: concurrent callers for the
/// same id share the same future instead of racing duplicate downloads.
pub struct PackageManager<D: PackageDownloader> {
    cache_dir: PathBuf,
    downloader: D,
    slots: Mutex<HashMap<ObjectId, Slot>>,
}

impl<D: PackageDownloader> PackageManager<D> {
    pub fn new(cache_dir: impl Into<PathBuf>, downloader: D) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            downloader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Source archive path: `cache_dir/package-<id>.zip`.
    pub fn archive_path(&self, package_id: ObjectId) -> PathBuf {
        self.cache_dir.join(format!("package-{package_id}.zip"))
    }

    /// Extracted directory: `cache_dir/package-<id>/`.
    pub fn extracted_dir(&self, package_id: ObjectId) -> PathBuf {
        self.cache_dir.join(format!("package-{package_id}"))
    }

    /// Resolves `package_id` to its extracted directory, downloading and extracting it at most
    /// once across all concurrent callers. On failure the slot is evicted so a later call starts
    /// a fresh attempt; on success later lookups resolve immediately from the same slot.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, package_id: ObjectId) -> Result<PathBuf, PackageError> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(package_id).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let result = slot.get_or_try_init(|| self.download_and_extract(package_id)).await;

        match result {
            Ok(path) => Ok(path.clone()),
            Err(err) => {
                self.slots.lock().await.remove(&package_id);
                Err(err)
            }
        }
    }

    async fn download_and_extract(&self, package_id: ObjectId) -> Result<PathBuf, PackageError> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        let archive_path = self.archive_path(package_id);
        self.downloader.download(package_id, &archive_path).await?;

        let extracted_dir = self.extracted_dir(package_id);
        let extract_archive_path = archive_path.clone();
        let extract_dest = extracted_dir.clone();
        tokio::task::spawn_blocking(move || extract_zip(&extract_archive_path, &extract_dest))
            .await
            .map_err(|err| PackageError::Download(err.to_string()))??;

        Ok(extracted_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingDownloader {
        calls: Arc<AtomicUsize>,
        zip_bytes: Vec<u8>,
    }

    #[async_trait]
    impl PackageDownloader for CountingDownloader {
        async fn download(&self, _package_id: ObjectId, dest: &Path) -> Result<(), PackageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Simulate network latency so concurrent callers actually overlap.
            tokio::time::sleep(Duration::from_millis(20)).await;
            tokio::fs::write(dest, &self.zip_bytes).await?;
            Ok(())
        }
    }

    fn make_test_zip() -> Vec<u8> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer.start_file("statement.txt", zip::write::FileOptions::default()).unwrap();
            std::io::Write::write_all(&mut writer, b"hello").unwrap();
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[tokio::test]
    async fn concurrent_gets_for_the_same_package_download_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let manager = Arc::new(PackageManager::new(
            dir.path().to_path_buf(),
            CountingDownloader {
                calls: calls.clone(),
                zip_bytes: make_test_zip(),
            },
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.get(1).await }));
        }

        for handle in handles {
            let path = handle.await.unwrap().unwrap();
            assert!(path.join("statement.txt").exists());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_package_ids_download_independently() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let manager = PackageManager::new(
            dir.path().to_path_buf(),
            CountingDownloader {
                calls: calls.clone(),
                zip_bytes: make_test_zip(),
            },
        );

        manager.get(1).await.unwrap();
        manager.get(2).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct FailingDownloader;

    #[async_trait]
    impl PackageDownloader for FailingDownloader {
        async fn download(&self, _package_id: ObjectId, _dest: &Path) -> Result<(), PackageError> {
            Err(PackageError::Download("upstream unavailable".into()))
        }
    }

    #[tokio::test]
    async fn a_failed_download_evicts_the_slot_so_retry_is_possible() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PackageManager::new(dir.path().to_path_buf(), FailingDownloader);

        assert!(manager.get(1).await.is_err());
        assert!(manager.slots.lock().await.is_empty());
    }
}
