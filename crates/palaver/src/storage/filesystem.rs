use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{check_path, Entry, Storage, StorageError, StorageResult};

/// A sandbox rooted in a real directory
///
/// The base is canonicalized once at construction. Every access resolves its target, or the
/// nearest existing ancestor when the target does not exist yet, and requires the canonical
/// result to stay under the base. This covers symlinks pointing outside the sandbox as well as
/// textual traversal.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    base: PathBuf,
}

impl FilesystemStorage {
    pub fn new(base: impl AsRef<Path>) -> StorageResult<Self> {
        let base = base.as_ref();
        if !base.is_absolute() {
            return Err(StorageError::InvalidBase(format!(
                "{} is not an absolute path",
                base.display()
            )));
        }
        let base = base.canonicalize().map_err(|e| {
            StorageError::InvalidBase(format!("{}: {}", base.display(), e))
        })?;
        if !base.is_dir() {
            return Err(StorageError::InvalidBase(format!(
                "{} is not a directory",
                base.display()
            )));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let relative = check_path(path)?;
        let full = if relative.is_empty() {
            self.base.clone()
        } else {
            self.base.join(&relative)
        };

        if fs::symlink_metadata(&full).is_ok() {
            // Dangling links land here too and fail to canonicalize
            let canonical = full.canonicalize().map_err(|_| StorageError::OutsideBase)?;
            return self.contained(canonical);
        }

        let mut ancestor = full.parent();
        while let Some(current) = ancestor {
            if fs::symlink_metadata(current).is_ok() {
                let canonical = current
                    .canonicalize()
                    .map_err(|_| StorageError::OutsideBase)?;
                self.contained(canonical)?;
                return Ok(full);
            }
            ancestor = current.parent();
        }
        Err(StorageError::OutsideBase)
    }

    fn contained(&self, canonical: PathBuf) -> StorageResult<PathBuf> {
        if canonical.starts_with(&self.base) {
            Ok(canonical)
        } else {
            debug!(path = %canonical.display(), "rejected path outside sandbox");
            Err(StorageError::OutsideBase)
        }
    }

    fn create_parents(&self, path: &Path) -> StorageResult<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        if parent
            .ancestors()
            .take_while(|dir| dir.starts_with(&self.base))
            .any(Path::is_file)
        {
            return Err(StorageError::FileInTheWay);
        }
        fs::create_dir_all(parent)?;
        Ok(())
    }
}

impl Storage for FilesystemStorage {
    fn get_file(&self, path: &str) -> StorageResult<String> {
        let resolved = self.resolve(path)?;
        if resolved.is_dir() {
            return Err(StorageError::DirectoryExists);
        }
        if !resolved.is_file() {
            return Err(StorageError::FileNotFound);
        }
        Ok(fs::read_to_string(resolved)?)
    }

    fn set_file(&self, path: &str, content: &str) -> StorageResult<()> {
        let resolved = self.resolve(path)?;
        if resolved.is_dir() {
            return Err(StorageError::DirectoryExists);
        }
        if !resolved.is_file() {
            return Err(StorageError::FileNotFound);
        }
        Ok(fs::write(resolved, content)?)
    }

    fn create_file(&self, path: &str, content: &str) -> StorageResult<()> {
        let resolved = self.resolve(path)?;
        if resolved.is_dir() {
            return Err(StorageError::DirectoryExists);
        }
        if resolved.exists() {
            return Err(StorageError::FileExists);
        }
        self.create_parents(&resolved)?;
        Ok(fs::write(resolved, content)?)
    }

    fn delete_file(&self, path: &str) -> StorageResult<()> {
        let resolved = self.resolve(path)?;
        if resolved.is_dir() {
            return Err(StorageError::DirectoryExists);
        }
        if !resolved.is_file() {
            return Err(StorageError::FileNotFound);
        }
        Ok(fs::remove_file(resolved)?)
    }

    fn rename_file(&self, from: &str, to: &str) -> StorageResult<()> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        if !from.is_file() {
            return Err(StorageError::SourceNotFound);
        }
        if to.is_file() {
            return Err(StorageError::DestinationFileExists);
        }
        if to.is_dir() {
            return Err(StorageError::DirectoryExists);
        }
        self.create_parents(&to)?;
        Ok(fs::rename(from, to)?)
    }

    fn list_directory(&self, path: &str) -> StorageResult<Vec<Entry>> {
        let resolved = self.resolve(path)?;
        if !resolved.is_dir() {
            return Err(StorageError::DirectoryNotFound);
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(resolved)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(Entry {
                name,
                is_directory: entry.path().is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_directory(&self, path: &str) -> StorageResult<()> {
        let resolved = self.resolve(path)?;
        if resolved.is_dir() {
            return Err(StorageError::DirectoryAlreadyExists);
        }
        if resolved.is_file() {
            return Err(StorageError::FileInTheWay);
        }
        self.create_parents(&resolved)?;
        Ok(fs::create_dir(resolved)?)
    }

    fn delete_directory(&self, path: &str) -> StorageResult<()> {
        let resolved = self.resolve(path)?;
        if resolved == self.base {
            return Err(StorageError::DeleteRoot);
        }
        if !resolved.is_dir() {
            return Err(StorageError::DirectoryNotFound);
        }
        if fs::read_dir(&resolved)?.next().is_some() {
            return Err(StorageError::DirectoryNotEmpty);
        }
        Ok(fs::remove_dir(resolved)?)
    }

    fn rename_directory(&self, from: &str, to: &str) -> StorageResult<()> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        if from == self.base {
            return Err(StorageError::RenameRoot);
        }
        if !from.is_dir() {
            return Err(StorageError::DirectoryNotFound);
        }
        if to.exists() {
            return Err(StorageError::DestinationExists);
        }
        if to.starts_with(&from) {
            return Err(StorageError::IntoItself);
        }
        self.create_parents(&to)?;
        Ok(fs::rename(from, to)?)
    }

    fn is_file(&self, path: &str) -> bool {
        self.resolve(path).map_or(false, |resolved| resolved.is_file())
    }

    fn is_directory(&self, path: &str) -> bool {
        self.resolve(path).map_or(false, |resolved| resolved.is_dir())
    }
}
