use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Error types for file system operations
#[derive(Error, Debug)]
pub enum FsError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io { path: path.to_path_buf(), source: error },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(path) | Self::Io { path, .. } => path,
        }
    }
}

/// File access used by the compile workers
pub trait FileSystem: Send + Sync {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FsError>;

    /// Replace `path` with `contents` so that readers see either the old
    /// file or the complete new one, never a partial write
    fn write_file_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), FsError>;
}

/// The local disk
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        fs::read(path).map_err(|e| FsError::from_io(path, e))
    }

    fn write_file_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), FsError> {
        write_file_atomic(path, contents).map_err(|e| FsError::Io { path: path.to_path_buf(), source: e })
    }
}

/// Write `contents` into a temporary file next to `path` and rename it over
/// `path`. Missing parent directories are created.
pub fn write_file_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
