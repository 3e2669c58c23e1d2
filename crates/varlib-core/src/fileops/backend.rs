//! Primitive filesystem calls used by the safe file operator.

use std::io;
use std::path::Path;

/// The handful of filesystem primitives the file operator relies on.
///
/// The production backend is [`StdFileSystem`]. Tests swap in backends
/// that fail on demand to drive the retry and fallback paths.
pub trait FileSystem: Send + Sync {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Copy a file, keeping the source's timestamps on the copy.
    fn copy_preserving_times(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn copy_preserving_times(&self, from: &Path, to: &Path) -> io::Result<()> {
        let metadata = std::fs::metadata(from)?;
        std::fs::copy(from, to)?;

        let atime = filetime::FileTime::from_last_access_time(&metadata);
        let mtime = filetime::FileTime::from_last_modification_time(&metadata);
        filetime::set_file_times(to, atime, mtime)?;

        preserve_creation_time(&metadata, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }
}

#[cfg(windows)]
fn preserve_creation_time(metadata: &std::fs::Metadata, to: &Path) -> io::Result<()> {
    use std::os::windows::fs::FileTimesExt;

    let Ok(created) = metadata.created() else {
        return Ok(());
    };
    let file = std::fs::OpenOptions::new().write(true).open(to)?;
    file.set_times(std::fs::FileTimes::new().set_created(created))
}

// Unix filesystems do not expose a settable creation time.
#[cfg(not(windows))]
fn preserve_creation_time(_metadata: &std::fs::Metadata, _to: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::TempDir;

    #[test]
    fn test_copy_preserves_modification_time() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("A.Foo.1.var");
        let dst = temp.path().join("copy.var");
        std::fs::write(&src, b"payload").unwrap();
        let stamp = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, stamp).unwrap();

        StdFileSystem.copy_preserving_times(&src, &dst).unwrap();

        let copied = std::fs::metadata(&dst).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&copied), stamp);
        assert_eq!(std::fs::read(&dst).unwrap(), b"payload");
        assert!(StdFileSystem.exists(&src));
    }

    #[test]
    fn test_rename_and_remove() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.var");
        let dst = temp.path().join("sub/a.var");
        std::fs::write(&src, b"x").unwrap();

        let fs = StdFileSystem;
        fs.create_dir_all(dst.parent().unwrap()).unwrap();
        fs.rename(&src, &dst).unwrap();
        assert!(!fs.exists(&src));
        fs.remove_file(&dst).unwrap();
        assert!(!fs.exists(&dst));
    }
}
