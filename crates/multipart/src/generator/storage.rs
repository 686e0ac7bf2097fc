//! Temporary files for parts that outgrow their memory budget.

use std::io;
use std::path::PathBuf;

use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::ensure;
use crate::protocol::MultipartError;

const FILE_PREFIX: &str = "part-";
const FILE_SUFFIX: &str = ".multipart";

/// A temporary file receiving one part's body.
///
/// Until [`finish`](SpillFile::finish) hands the path over to the part, the
/// file is owned here and removed when this value is dropped.
#[derive(Debug)]
pub(crate) struct SpillFile {
    file: File,
    path: TempPath,
    size: u64,
    max_size: Option<u64>,
}

impl SpillFile {
    /// Creates a uniquely named file in `dir`, creating `dir` first if needed.
    pub(crate) async fn create(dir: PathBuf, max_size: Option<u64>) -> Result<Self, MultipartError> {
        let named = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir)?;
            tempfile::Builder::new().prefix(FILE_PREFIX).suffix(FILE_SUFFIX).tempfile_in(&dir)
        })
        .await
        .map_err(|e| MultipartError::io(io::Error::other(e)))?
        .map_err(MultipartError::io)?;

        let (file, path) = named.into_parts();
        debug!(path = %path.display(), "created part file");
        Ok(Self { file: File::from_std(file), path, size: 0, max_size })
    }

    pub(crate) async fn write(&mut self, bytes: &[u8]) -> Result<(), MultipartError> {
        let size = self.size + bytes.len() as u64;
        if let Some(max_size) = self.max_size {
            ensure!(size <= max_size, MultipartError::too_large_on_disk(max_size));
        }
        self.file.write_all(bytes).await.map_err(MultipartError::io)?;
        self.size = size;
        Ok(())
    }

    /// Flushes and closes the file, giving up ownership of its path.
    pub(crate) async fn finish(mut self) -> Result<PathBuf, MultipartError> {
        self.file.flush().await.map_err(MultipartError::io)?;
        let Self { file, path, size, .. } = self;
        drop(file);
        debug!(path = %path.display(), size, "finished part file");
        path.keep().map_err(|e| MultipartError::io(e.error))
    }

    /// Closes and removes the file, logging instead of failing.
    pub(crate) async fn discard(self) {
        let Self { file, path, .. } = self;
        drop(file);
        let shown = path.display().to_string();
        match tokio::task::spawn_blocking(move || path.close()).await {
            Ok(Ok(())) => debug!(path = %shown, "removed part file"),
            Ok(Err(e)) => warn!(path = %shown, "failed to remove part file, {}", e),
            Err(e) => warn!(path = %shown, "failed to remove part file, {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finish_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("nested");

        let mut file = SpillFile::create(storage.clone(), None).await.unwrap();
        file.write(b"hello ").await.unwrap();
        file.write(b"world").await.unwrap();
        let path = file.finish().await.unwrap();

        assert!(path.starts_with(&storage));
        assert_eq!(path.extension().unwrap(), "multipart");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn write_beyond_limit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = SpillFile::create(dir.path().to_path_buf(), Some(8)).await.unwrap();
        file.write(b"12345678").await.unwrap();
        let result = file.write(b"9").await;
        assert!(matches!(result, Err(MultipartError::TooLargeOnDisk { max_size: 8 })));

        file.discard().await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn dropped_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let file = SpillFile::create(dir.path().to_path_buf(), None).await.unwrap();
        drop(file);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
