//! Per-run scratch space
//!
//! Every identification run works inside its own temporary directory. The
//! directory (uploaded buffer, normalized WAV, segment files, concat list) is
//! removed when the [`ScratchSpace`] is dropped, so every exit path of the
//! run reclaims its disk usage. Individual intermediates are also removed as
//! soon as the step that consumed them finishes.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

/// Temporary directory owned by one pipeline run
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a fresh directory under `parent` (created if missing)
    pub fn create(parent: &Path, run_id: Uuid) -> io::Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("run-{}-", run_id.simple()))
            .tempdir_in(parent)?;
        tracing::debug!(run_id = %run_id, scratch = %dir.path().display(), "Scratch space created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a file inside the scratch directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory now, logging instead of failing
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(scratch = %path.display(), error = %e, "Failed to remove scratch space");
        }
    }
}

/// Delete a file, logging failures instead of returning them
///
/// Used for cleanup on paths where an earlier error must stay the one that
/// is reported.
pub async fn remove_file_best_effort(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
        }
    }
}

/// Reduce an uploaded file name to a safe single path component
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_removed_on_drop() {
        let parent = TempDir::new().unwrap();
        let path = {
            let scratch = ScratchSpace::create(parent.path(), Uuid::new_v4()).unwrap();
            std::fs::write(scratch.file("input.bin"), b"data").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_release_removes_directory() {
        let parent = TempDir::new().unwrap();
        let scratch = ScratchSpace::create(&parent.path().join("nested"), Uuid::new_v4()).unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        scratch.release();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_silent() {
        let parent = TempDir::new().unwrap();
        remove_file_best_effort(&parent.path().join("never-created.wav")).await;
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\media\\show 01.mxf"), "show_01.mxf");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload.bin");
    }
}
