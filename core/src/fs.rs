//! Authorized filesystem (§4.D): wraps a backing filesystem, enforcing
//! read-before-write and tracking every read/write into the session.

use crate::session::Session;
use async_trait::async_trait;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("{path} must be read before it can be written")]
    NotReadBeforeWrite { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The raw backing filesystem `AuthorizedFs` wraps. A real implementation
/// delegates to `tokio::fs`; tests substitute an in-memory double.
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn read_file(&self, path: &Path) -> std::io::Result<String>;
    async fn read_file_lines(&self, path: &Path, from: usize, to: usize) -> std::io::Result<String>;
    async fn write_file(&self, path: &Path, content: &str) -> std::io::Result<()>;
    async fn exists(&self, path: &Path) -> bool;
    async fn list_dir(&self, path: &Path) -> std::io::Result<Vec<PathBuf>>;
    async fn delete(&self, path: &Path) -> std::io::Result<()>;
    async fn delete_all(&self, path: &Path) -> std::io::Result<()>;
    async fn mkdir_all(&self, path: &Path) -> std::io::Result<()>;
    async fn mv(&self, src: &Path, dst: &Path) -> std::io::Result<()>;
    async fn is_dir(&self, path: &Path) -> bool;
}

pub struct TokioFilesystem;

#[async_trait]
impl Filesystem for TokioFilesystem {
    async fn read_file(&self, path: &Path) -> std::io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn read_file_lines(&self, path: &Path, from: usize, to: usize) -> std::io::Result<String> {
        let content = tokio::fs::read_to_string(path).await?;
        if from == 0 && to == 0 {
            return Ok(content);
        }
        let selected: Vec<&str> = content
            .lines()
            .enumerate()
            .filter(|(i, _)| *i + 1 >= from.max(1) && *i + 1 <= to.max(from))
            .map(|(_, line)| line)
            .collect();
        Ok(selected.join("\n"))
    }

    async fn write_file(&self, path: &Path, content: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn list_dir(&self, path: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut result = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            result.push(entry.path());
        }
        Ok(result)
    }

    async fn delete(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn delete_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_dir_all(path).await
    }

    async fn mkdir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn mv(&self, src: &Path, dst: &Path) -> std::io::Result<()> {
        tokio::fs::rename(src, dst).await
    }

    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
    }
}

pub struct AuthorizedFs {
    backing: Arc<dyn Filesystem>,
    session: Arc<Session>,
}

impl AuthorizedFs {
    pub fn new(backing: Arc<dyn Filesystem>, session: Arc<Session>) -> Self {
        Self { backing, session }
    }

    /// Reads are never denied here; denials happen earlier in the
    /// authorization core. Every read records path and content into the
    /// session.
    pub async fn read_file(&self, path: &Path) -> Result<String, FsError> {
        let content = self.backing.read_file(path).await?;
        self.session.track_read(path, content.clone()).await;
        Ok(content)
    }

    pub async fn read_file_lines(&self, path: &Path, from: usize, to: usize) -> Result<String, FsError> {
        let content = self.backing.read_file_lines(path, from, to).await?;
        self.session.track_read(path, content.clone()).await;
        Ok(content)
    }

    /// Writes to an existing path require the path was previously read;
    /// writes to a non-existing path are allowed. Every write marks the
    /// path modified and re-tracks it as read so chained edits succeed.
    pub async fn write_file(&self, path: &Path, content: &str) -> Result<(), FsError> {
        if self.backing.exists(path).await && !self.session.was_file_read(path).await {
            return Err(FsError::NotReadBeforeWrite { path: path.to_path_buf() });
        }
        self.backing.write_file(path, content).await?;
        self.session.mark_modified(path).await;
        self.session.track_read(path, content).await;
        Ok(())
    }

    pub async fn exists(&self, path: &Path) -> bool {
        self.backing.exists(path).await
    }

    pub async fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, FsError> {
        Ok(self.backing.list_dir(path).await?)
    }

    /// `Delete` on a file requires a prior read; on a directory it does
    /// not (evaluated at higher layers).
    pub async fn delete(&self, path: &Path) -> Result<(), FsError> {
        if self.backing.is_dir(path).await {
            self.backing.delete_all(path).await?;
        } else {
            if !self.session.was_file_read(path).await {
                return Err(FsError::NotReadBeforeWrite { path: path.to_path_buf() });
            }
            self.backing.delete(path).await?;
        }
        self.session.mark_modified(path).await;
        Ok(())
    }

    pub async fn mkdir_all(&self, path: &Path) -> Result<(), FsError> {
        self.backing.mkdir_all(path).await?;
        self.session.mark_modified(path).await;
        Ok(())
    }

    /// `Move` on a file requires a prior read on the source; on a
    /// directory it does not.
    pub async fn mv(&self, src: &Path, dst: &Path) -> Result<(), FsError> {
        if !self.backing.is_dir(src).await && !self.session.was_file_read(src).await {
            return Err(FsError::NotReadBeforeWrite { path: src.to_path_buf() });
        }
        self.backing.mv(src, dst).await?;
        self.session.mark_modified(src).await;
        self.session.mark_modified(dst).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[tokio::test]
    async fn write_to_existing_unread_path_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "old").unwrap();

        let session = Arc::new(Session::new(dir.path().to_path_buf()));
        let fs = AuthorizedFs::new(Arc::new(TokioFilesystem), session);

        let result = fs.write_file(&file, "new").await;
        assert!(matches!(result, Err(FsError::NotReadBeforeWrite { .. })));
    }

    #[tokio::test]
    async fn write_to_new_path_is_allowed_and_marks_modified() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("new.txt");

        let session = Arc::new(Session::new(dir.path().to_path_buf()));
        let fs = AuthorizedFs::new(Arc::new(TokioFilesystem), session.clone());

        fs.write_file(&file, "hello").await.unwrap();
        assert!(session.was_file_modified(&file).await);
        assert!(session.was_file_read(&file).await);
    }

    #[tokio::test]
    async fn read_then_write_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "old").unwrap();

        let session = Arc::new(Session::new(dir.path().to_path_buf()));
        let fs = AuthorizedFs::new(Arc::new(TokioFilesystem), session);

        fs.read_file(&file).await.unwrap();
        fs.write_file(&file, "new").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&file).await.unwrap(), "new");
    }
}
