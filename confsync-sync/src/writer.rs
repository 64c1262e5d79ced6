//! Atomic file replacement.
//!
//! Content goes to `<path>.sync-configs.tmp` first and is renamed over the
//! final path, so an interrupted run never leaves a half-written config in
//! the mirror. Bytes are written exactly as given.

use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};

/// Outcome of a single file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Written { path: PathBuf },
    /// On-disk content already matched.
    Unchanged { path: PathBuf },
}

fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.sync-configs.tmp", path.display()))
}

pub fn write_atomic(path: &Path, content: &str) -> Result<WriteResult, SyncError> {
    write_atomic_with_tmp(path, content, &tmp_path(path))
}

fn write_atomic_with_tmp(path: &Path, content: &str, tmp: &Path) -> Result<WriteResult, SyncError> {
    if let Ok(existing) = std::fs::read(path) {
        if existing == content.as_bytes() {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::debug!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_write_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".github").join("config.yml");
        let result = write_atomic(&path, "a: 1\n").unwrap();
        assert_eq!(result, WriteResult::Written { path: path.clone() });
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a: 1\n");
    }

    #[test]
    fn identical_content_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yml");
        std::fs::write(&path, "a: 1\r\n").unwrap();
        assert!(matches!(
            write_atomic(&path, "a: 1\r\n").unwrap(),
            WriteResult::Unchanged { .. }
        ));
    }

    #[test]
    fn crlf_is_written_verbatim() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yml");
        write_atomic(&path, "a: 1\r\nb: 2\r\n").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"a: 1\r\nb: 2\r\n");
    }

    #[test]
    fn line_ending_change_is_a_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yml");
        std::fs::write(&path, "a: 1\r\n").unwrap();
        assert!(matches!(
            write_atomic(&path, "a: 1\n").unwrap(),
            WriteResult::Written { .. }
        ));
        assert_eq!(std::fs::read(&path).unwrap(), b"a: 1\n");
    }

    #[test]
    fn tmp_file_removed_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yml");
        write_atomic(&path, "a: 2\n").unwrap();
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn failed_rename_cleans_up_tmp() {
        let tmp = TempDir::new().unwrap();
        // A directory at the destination makes the rename fail.
        let path = tmp.path().join("taken");
        std::fs::create_dir_all(path.join("child")).unwrap();
        let tmp_file = tmp.path().join("taken.tmp");
        assert!(write_atomic_with_tmp(&path, "x", &tmp_file).is_err());
        assert!(!tmp_file.exists());
    }
}
