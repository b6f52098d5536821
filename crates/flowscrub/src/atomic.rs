//! Whole-file writes that never leave a partial file behind.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Create `dir` and any missing parents. An existing directory is fine.
///
/// # Errors
///
/// Returns [`Error::DirectoryCreate`] if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write `contents` to `path` through a uniquely named temporary file in
/// the same directory, then rename it into place.
///
/// Parent directories are created as needed. Readers see either the old
/// file, nothing, or the complete new content.
///
/// # Errors
///
/// Returns an error if the parent cannot be created or the write or rename
/// fails. The temporary file is removed on failure.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let write_error = |source| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut temp = NamedTempFile::new_in(parent).map_err(write_error)?;
    temp.write_all(contents).map_err(write_error)?;
    temp.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    fn names(dir: &Path) -> Vec<OsString> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.json");

        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");

        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        write_atomic(&dir.path().join("c.json"), b"x").unwrap();

        assert_eq!(names(dir.path()), vec![OsString::from("c.json")]);
    }

    #[test]
    fn test_write_atomic_leaves_lookalike_siblings_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        let lookalike = dir.path().join(".a.json.partial");

        write_atomic(&lookalike, b"hidden").unwrap();
        write_atomic(&path, b"visible").unwrap();

        assert_eq!(fs::read_to_string(&lookalike).unwrap(), "hidden");
        assert_eq!(fs::read_to_string(&path).unwrap(), "visible");
        assert_eq!(
            names(dir.path()),
            vec![OsString::from(".a.json.partial"), OsString::from("a.json")]
        );
    }

    #[test]
    fn test_write_atomic_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        // The destination is a non-empty directory, so the rename fails
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("inner"), b"x").unwrap();

        let err = write_atomic(&path, b"x").unwrap_err();
        assert!(matches!(err, Error::FileWrite { .. }));
        assert_eq!(names(dir.path()), vec![OsString::from("taken")]);
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("x/y");
        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
