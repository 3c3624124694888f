//! Physical storage backend abstraction.
//!
//! The storage core never touches `std::fs` directly; every physical operation goes through a
//! [`StorageBackend`]. Paths handed to a backend are absolute physical paths produced by the
//! core from a repository `basedir`.

use crate::{FilesError, FilesResult};
use std::fmt;
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Capability set the storage core requires from physical storage.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Opens a file for reading.
    ///
    /// Fails with [`FilesError::NotFound`] when absent and [`FilesError::IsDirectory`] when the
    /// path is a directory.
    fn open_read(&self, path: &Path) -> FilesResult<Box<dyn Read + Send>>;

    /// Creates or truncates a file for writing. The parent directory must exist.
    fn open_write(&self, path: &Path) -> FilesResult<Box<dyn Write + Send>>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Creates a directory and all missing parents.
    fn create_dirs(&self, path: &Path) -> FilesResult<()>;

    /// Deletes a file, or a directory and everything below it.
    fn delete(&self, path: &Path) -> FilesResult<()>;

    /// Direct children of a directory, sorted by path.
    fn list_children(&self, path: &Path) -> FilesResult<Vec<PathBuf>>;

    /// Moves a file or directory, replacing an existing file at `to` and creating missing
    /// parents of `to`.
    fn move_path(&self, from: &Path, to: &Path) -> FilesResult<()>;

    /// Copies a file or directory tree, creating missing parents of `to`.
    fn copy_path(&self, from: &Path, to: &Path) -> FilesResult<()>;

    /// Size of a file in bytes.
    fn size(&self, path: &Path) -> FilesResult<u64>;
}

/// [`StorageBackend`] over the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorageBackend;

impl LocalStorageBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Recursively copies a directory and its contents to a destination.
fn copy_dir_recursive(src: &Path, dst: &Path) -> FilesResult<()> {
    if !dst.exists() {
        fs::create_dir_all(dst).map_err(|e| FilesError::io(dst, e))?;
    }

    for entry in fs::read_dir(src).map_err(|e| FilesError::io(src, e))? {
        let entry = entry.map_err(|e| FilesError::io(src, e))?;
        let ty = entry.file_type().map_err(|e| FilesError::io(entry.path(), e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).map_err(|e| FilesError::io(&src_path, e))?;
        }
    }

    Ok(())
}

fn ensure_parent(path: &Path) -> FilesResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FilesError::io(parent, e))?;
    }
    Ok(())
}

impl StorageBackend for LocalStorageBackend {
    fn open_read(&self, path: &Path) -> FilesResult<Box<dyn Read + Send>> {
        if path.is_dir() {
            return Err(FilesError::IsDirectory(path.to_path_buf()));
        }
        let file = fs::File::open(path).map_err(|e| FilesError::io(path, e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self, path: &Path) -> FilesResult<Box<dyn Write + Send>> {
        if path.is_dir() {
            return Err(FilesError::IsDirectory(path.to_path_buf()));
        }
        let file = fs::File::create(path).map_err(|e| FilesError::io(path, e))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dirs(&self, path: &Path) -> FilesResult<()> {
        fs::create_dir_all(path).map_err(|e| FilesError::io(path, e))
    }

    fn delete(&self, path: &Path) -> FilesResult<()> {
        let metadata = fs::symlink_metadata(path).map_err(|e| FilesError::io(path, e))?;
        if metadata.is_dir() {
            fs::remove_dir_all(path).map_err(|e| FilesError::io(path, e))
        } else {
            fs::remove_file(path).map_err(|e| FilesError::io(path, e))
        }
    }

    fn list_children(&self, path: &Path) -> FilesResult<Vec<PathBuf>> {
        if !path.is_dir() {
            if path.exists() {
                return Err(FilesError::InvalidPath(format!(
                    "not a directory: {}",
                    path.display()
                )));
            }
            return Err(FilesError::NotFound(path.to_path_buf()));
        }

        let mut children = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| FilesError::io(path, e))? {
            let entry = entry.map_err(|e| FilesError::io(path, e))?;
            children.push(entry.path());
        }
        children.sort();
        Ok(children)
    }

    fn move_path(&self, from: &Path, to: &Path) -> FilesResult<()> {
        if !from.exists() {
            return Err(FilesError::NotFound(from.to_path_buf()));
        }
        ensure_parent(to)?;

        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(rename_error) => {
                // Rename cannot cross filesystems; fall back to copy and delete.
                tracing::debug!(
                    from = %from.display(),
                    to = %to.display(),
                    error = %rename_error,
                    "rename failed, falling back to copy"
                );
                self.copy_path(from, to)?;
                self.delete(from)
            }
        }
    }

    fn copy_path(&self, from: &Path, to: &Path) -> FilesResult<()> {
        if from.is_dir() {
            return copy_dir_recursive(from, to);
        }
        ensure_parent(to)?;
        fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| FilesError::io(from, e))
    }

    fn size(&self, path: &Path) -> FilesResult<u64> {
        let metadata = fs::metadata(path).map_err(|e| FilesError::io(path, e))?;
        if metadata.is_dir() {
            return Err(FilesError::IsDirectory(path.to_path_buf()));
        }
        Ok(metadata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let backend = LocalStorageBackend::new();
        let path = temp.path().join("a.txt");

        let mut writer = backend.open_write(&path).unwrap();
        writer.write_all(b"hello").unwrap();
        writer.flush().unwrap();
        drop(writer);

        let mut content = String::new();
        backend
            .open_read(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello");
        assert_eq!(backend.size(&path).unwrap(), 5);
    }

    #[test]
    fn test_open_read_missing_and_directory() {
        let temp = TempDir::new().unwrap();
        let backend = LocalStorageBackend::new();

        assert!(matches!(
            backend.open_read(&temp.path().join("missing")),
            Err(FilesError::NotFound(_))
        ));
        assert!(matches!(
            backend.open_read(temp.path()),
            Err(FilesError::IsDirectory(_))
        ));
    }

    #[test]
    fn test_list_children_sorted() {
        let temp = TempDir::new().unwrap();
        let backend = LocalStorageBackend::new();
        fs::write(temp.path().join("b"), "").unwrap();
        fs::write(temp.path().join("a"), "").unwrap();
        fs::create_dir(temp.path().join("c")).unwrap();

        let names: Vec<String> = backend
            .list_children(temp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_move_creates_parents_and_replaces() {
        let temp = TempDir::new().unwrap();
        let backend = LocalStorageBackend::new();
        let from = temp.path().join("from.txt");
        let to = temp.path().join("x/y/to.txt");
        fs::write(&from, "new").unwrap();
        fs::create_dir_all(to.parent().unwrap()).unwrap();
        fs::write(&to, "old").unwrap();

        backend.move_path(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "new");
    }

    #[test]
    fn test_copy_and_delete_directory_tree() {
        let temp = TempDir::new().unwrap();
        let backend = LocalStorageBackend::new();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested/file"), "data").unwrap();

        let dst = temp.path().join("dst");
        backend.copy_path(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("nested/file")).unwrap(), "data");

        backend.delete(&src).unwrap();
        assert!(!src.exists());
        assert!(matches!(backend.delete(&src), Err(FilesError::NotFound(_))));
    }
}
