use crate::{Error, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::debug;

#[derive(Clone, Copy, Debug)]
pub struct AtomicWriteOptions {
    pub permissions: Option<u32>,
    pub sync: bool,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self {
        Self {
            permissions: None,
            sync: true,
        }
    }
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permissions(mut self, mode: u32) -> Self {
        self.permissions = Some(mode);
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

/// Replace `path` with `content` via a synced sibling temp file and a rename.
pub fn atomic_write(
    path: impl AsRef<Path>,
    content: &[u8],
    options: AtomicWriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => {
            return Err(Error::NoParent {
                path: path.to_path_buf(),
            });
        }
    };

    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let write_err = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(write_err)?;

    tmp.write_all(content).map_err(write_err)?;

    #[cfg(unix)]
    if let Some(mode) = options.permissions {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode)).map_err(write_err)?;
    }

    if options.sync {
        tmp.as_file().sync_all().map_err(write_err)?;
    }

    // a failed persist drops the temp file, which unlinks it
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    #[cfg(unix)]
    if options.sync {
        sync_dir(parent);
    }

    Ok(())
}

/// Flush a directory entry after a rename. The data is already durable in the
/// file itself, so a failure is logged and reported but not fatal.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> bool {
    match fs::File::open(dir).and_then(|handle| handle.sync_all()) {
        Ok(()) => true,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "directory fsync failed");
            false
        }
    }
}

pub fn atomic_read(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Like [`atomic_read`] but maps a missing file to `None`.
pub fn read_if_exists(path: impl AsRef<Path>) -> Result<Option<Vec<u8>>> {
    let path = path.as_ref();
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Read {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Create the directory that will hold `path`, if any.
pub fn ensure_parent_dir(path: impl AsRef<Path>) -> Result<()> {
    let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    fs::create_dir_all(parent).map_err(|e| Error::CreateDir {
        path: parent.to_path_buf(),
        source: e,
    })
}

/// Returns whether a file was actually removed.
pub fn remove_if_exists(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        atomic_write(&path, b"hello world", AtomicWriteOptions::new()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello world");
    }

    #[test]
    fn test_atomic_write_replaces_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        atomic_write(&path, b"first", AtomicWriteOptions::new()).unwrap();
        atomic_write(&path, b"second", AtomicWriteOptions::new().sync(false)).unwrap();

        assert_eq!(atomic_read(&path).unwrap(), b"second");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_with_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("test.txt");
        atomic_write(&path, b"data", AtomicWriteOptions::new().permissions(0o600)).unwrap();
        let metadata = fs::metadata(&path).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_sync_dir_reports_failure() {
        let dir = tempdir().unwrap();
        assert!(sync_dir(dir.path()));
        assert!(!sync_dir(&dir.path().join("gone")));
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("state.json");
        let err = atomic_write(&path, b"x", AtomicWriteOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
    }

    #[test]
    fn test_ensure_parent_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runs").join("calgary").join("state.json");
        ensure_parent_dir(&path).unwrap();
        atomic_write(&path, b"x", AtomicWriteOptions::new()).unwrap();

        ensure_parent_dir("bare.json").unwrap();
    }

    #[test]
    fn test_read_and_remove_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(read_if_exists(&path).unwrap().is_none());
        assert!(!remove_if_exists(&path).unwrap());

        fs::write(&path, b"x").unwrap();
        assert_eq!(read_if_exists(&path).unwrap().as_deref(), Some(&b"x"[..]));
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}
