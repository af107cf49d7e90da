//! Request-scoped scratch files
//!
//! A [`ScratchFile`] owns a path on local disk and removes it when dropped, so
//! every exit path of a request cleans up after itself.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Prefix for uploaded input files
pub const INPUT_PREFIX: &str = "nft_src_";

#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Reserve a unique path under `dir`. Nothing is created on disk yet.
    pub fn new_in(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{}{}", INPUT_PREFIX, Uuid::new_v4().simple())),
        }
    }

    /// Sibling path with `.<ext>` appended, owned by its own guard
    pub fn sibling(&self, ext: &str) -> Self {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        Self {
            path: PathBuf::from(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "Removed scratch file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove scratch file"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchFile::new_in(dir.path());
        std::fs::write(scratch.path(), b"data").unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_without_file_is_silent() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchFile::new_in(dir.path());
        drop(scratch);
    }

    #[test]
    fn test_sibling_and_unique_names() {
        let dir = TempDir::new().unwrap();
        let a = ScratchFile::new_in(dir.path());
        let b = ScratchFile::new_in(dir.path());
        assert_ne!(a.path(), b.path());

        let car = a.sibling("car");
        assert_eq!(car.path().to_string_lossy(), format!("{}.car", a.path().display()));
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(INPUT_PREFIX));
    }
}
