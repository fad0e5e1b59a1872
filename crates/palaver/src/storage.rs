//! Path addressed file storage confined to a sandbox
//!
//! Every path is relative to the sandbox root; a leading `/` is ignored. Paths are checked
//! syntactically by [`check_path`] before a backend touches anything, and the filesystem
//! backend additionally resolves symlinks to keep every access under its base directory.
pub mod filesystem;
pub mod memory;

use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("File not found")]
    FileNotFound,

    #[error("File already exists")]
    FileExists,

    #[error("A directory exists at this path")]
    DirectoryExists,

    #[error("A file exists at this path")]
    FileInTheWay,

    #[error("Directory already exists")]
    DirectoryAlreadyExists,

    #[error("Directory is not empty")]
    DirectoryNotEmpty,

    #[error("Directory not found")]
    DirectoryNotFound,

    #[error("Cannot delete root directory")]
    DeleteRoot,

    #[error("Cannot rename root directory")]
    RenameRoot,

    #[error("Cannot move a directory into itself")]
    IntoItself,

    #[error("Source file not found")]
    SourceNotFound,

    #[error("Destination file already exists")]
    DestinationFileExists,

    #[error("Destination already exists")]
    DestinationExists,

    #[error("Path contains null bytes")]
    NullByte,

    #[error("Path contains dangerous sequence")]
    DangerousPath,

    #[error("Path is not in base directory or contains invalid characters")]
    OutsideBase,

    #[error("Invalid base directory: {0}")]
    InvalidBase(String),

    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        StorageError::Io(error.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub is_directory: bool,
}

impl Entry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
        }
    }
}

/// A sandboxed file store. Callers serialize mutations against one instance.
pub trait Storage: Send + Sync {
    fn get_file(&self, path: &str) -> StorageResult<String>;

    /// Overwrite an existing file
    fn set_file(&self, path: &str, content: &str) -> StorageResult<()>;

    /// Write a new file, creating missing parent directories
    fn create_file(&self, path: &str, content: &str) -> StorageResult<()>;

    fn delete_file(&self, path: &str) -> StorageResult<()>;

    fn rename_file(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Entries directly under a directory, sorted by name
    fn list_directory(&self, path: &str) -> StorageResult<Vec<Entry>>;

    fn create_directory(&self, path: &str) -> StorageResult<()>;

    /// Remove an empty directory
    fn delete_directory(&self, path: &str) -> StorageResult<()>;

    /// Move a directory with everything below it
    fn rename_directory(&self, from: &str, to: &str) -> StorageResult<()>;

    fn is_file(&self, path: &str) -> bool;

    fn is_directory(&self, path: &str) -> bool;
}

/// Reject unsafe paths and normalize the rest to a root relative form, `""` being the root
pub fn check_path(path: &str) -> StorageResult<String> {
    if path.contains('\0') {
        return Err(StorageError::NullByte);
    }
    let relative = path.trim_start_matches('/');
    if relative.starts_with("./")
        || relative == "."
        || relative.contains("../")
        || relative.split('/').any(|segment| segment == "..")
    {
        return Err(StorageError::DangerousPath);
    }
    Ok(relative.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_path() {
        assert_eq!(check_path("/notes/a.txt").unwrap(), "notes/a.txt");
        assert_eq!(check_path("notes/").unwrap(), "notes");
        assert_eq!(check_path("/").unwrap(), "");
        assert_eq!(check_path("").unwrap(), "");
        assert_eq!(check_path("a/.hidden").unwrap(), "a/.hidden");
    }

    #[test]
    fn test_check_path_rejects() {
        assert_eq!(check_path("a\0b"), Err(StorageError::NullByte));
        for path in ["./a", ".", "/.", "../etc/passwd", "a/../../b", "a/..", "..", "/./a"] {
            assert_eq!(check_path(path), Err(StorageError::DangerousPath), "{}", path);
        }
    }
}
