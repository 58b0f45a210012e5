//! Content checksums for backups and restored files

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{ConfigError, ConfigResult, IoOperation};

/// Computes SHA-256 of content as lowercase hex
pub fn compute_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Checksum of a file on disk
pub async fn file_checksum(path: &Path) -> ConfigResult<String> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| ConfigError::io_error(path, IoOperation::Read, e))?;
    Ok(compute_checksum(&content))
}

/// Fail with an integrity error unless the file matches `expected`
pub async fn verify_file(path: &Path, expected: &str) -> ConfigResult<()> {
    let actual = file_checksum(path).await?;
    if actual == expected {
        Ok(())
    } else {
        Err(ConfigError::RollbackIntegrity {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            compute_checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_verify_file_detects_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        tokio::fs::write(&path, "name: a\n").await.unwrap();
        let checksum = file_checksum(&path).await.unwrap();
        assert!(verify_file(&path, &checksum).await.is_ok());

        tokio::fs::write(&path, "name: b\n").await.unwrap();
        let err = verify_file(&path, &checksum).await.unwrap_err();
        assert!(matches!(err, ConfigError::RollbackIntegrity { .. }));
    }
}
