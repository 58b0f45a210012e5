//! Atomic file replacement
//!
//! Content is written to a uniquely named sibling and renamed over the
//! target, so readers see either the old or the new file, never a partial one.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ConfigError, ConfigResult, IoOperation};

/// Suffix given to legacy files once the unified file replaces them
pub const RETIRED_SUFFIX: &str = "old";

/// Suffix for a unified file moved aside by a rollback
pub const ROLLED_BACK_SUFFIX: &str = "rolled-back";

/// Writes files through a temporary sibling and a rename
#[derive(Debug, Clone, Default)]
pub struct AtomicWriter;

impl AtomicWriter {
    pub fn new() -> Self {
        AtomicWriter
    }

    /// Write `content` to a temporary file next to `target`
    ///
    /// The caller finishes the write with [`AtomicWriter::commit`].
    pub async fn stage(&self, target: &Path, content: &[u8]) -> ConfigResult<PathBuf> {
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ConfigError::io_error(parent, IoOperation::Write, e))?;
            }
        }

        let temp = temp_path(target);
        fs::write(&temp, content)
            .await
            .map_err(|e| ConfigError::io_error(&temp, IoOperation::Write, e))?;
        Ok(temp)
    }

    /// Rename a staged file onto its target
    pub async fn commit(&self, staged: &Path, target: &Path) -> ConfigResult<()> {
        fs::rename(staged, target)
            .await
            .map_err(|e| ConfigError::io_error(target, IoOperation::Move, e))?;
        debug!(path = %target.display(), "Atomically replaced file");
        Ok(())
    }

    /// Remove a staged file that will not be committed
    pub async fn discard(&self, staged: &Path) {
        if let Err(e) = fs::remove_file(staged).await {
            debug!(path = %staged.display(), "Could not remove staged file: {}", e);
        }
    }

    /// Stage and commit in one step
    pub async fn write(&self, target: &Path, content: &[u8]) -> ConfigResult<()> {
        let staged = self.stage(target, content).await?;
        if let Err(e) = self.commit(&staged, target).await {
            self.discard(&staged).await;
            return Err(e);
        }
        Ok(())
    }

    /// Rename `path` to `<name>.<suffix>`, returning the new path
    pub async fn set_aside(&self, path: &Path, suffix: &str) -> ConfigResult<PathBuf> {
        let aside = with_suffix(path, suffix);
        fs::rename(path, &aside)
            .await
            .map_err(|e| ConfigError::io_error(path, IoOperation::Move, e))?;
        debug!(from = %path.display(), to = %aside.display(), "Moved file aside");
        Ok(aside)
    }
}

/// `config.yaml` becomes `config.yaml.<suffix>`
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = format!(
        ".tmp-{}-{}",
        Uuid::new_v4(),
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file")
    );
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix(Path::new("/config/aicleaner/config.json"), RETIRED_SUFFIX),
            PathBuf::from("/config/aicleaner/config.json.old")
        );
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let temp = temp_path(Path::new("/config/aicleaner/config.yaml"));
        assert_eq!(temp.parent(), Some(Path::new("/config/aicleaner")));
        let name = temp.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".tmp-"));
        assert!(name.ends_with("-config.yaml"));
    }

    #[tokio::test]
    async fn test_write_replaces_content_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("config.yaml");
        let writer = AtomicWriter::new();

        writer.write(&target, b"first").await.unwrap();
        writer.write(&target, b"second").await.unwrap();

        assert_eq!(fs::read(&target).await.unwrap(), b"second");
        let mut entries = fs::read_dir(target.parent().unwrap()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["config.yaml".to_string()]);
    }

    #[tokio::test]
    async fn test_set_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{}").await.unwrap();

        let aside = AtomicWriter::new().set_aside(&path, RETIRED_SUFFIX).await.unwrap();
        assert!(!path.exists());
        assert_eq!(aside, dir.path().join("config.json.old"));
        assert_eq!(fs::read_to_string(&aside).await.unwrap(), "{}");
    }
}
