use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use super::{check_path, Entry, Storage, StorageError, StorageResult};

#[derive(Debug)]
struct Tree {
    files: BTreeMap<String, String>,
    /// Always contains the root, `""`
    directories: BTreeSet<String>,
}

impl Tree {
    fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            directories: BTreeSet::from([String::new()]),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path) || self.directories.contains(path)
    }

    fn create_parents(&mut self, path: &str) -> StorageResult<()> {
        let mut ancestors = Vec::new();
        let mut current = parent(path);
        while !current.is_empty() {
            ancestors.push(current);
            current = parent(current);
        }
        if ancestors.iter().any(|dir| self.files.contains_key(*dir)) {
            return Err(StorageError::FileInTheWay);
        }
        for dir in ancestors {
            self.directories.insert(dir.to_string());
        }
        Ok(())
    }
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

fn is_below(path: &str, dir: &str) -> bool {
    dir.is_empty() || path.strip_prefix(dir).map_or(false, |rest| rest.starts_with('/'))
}

fn moved(path: &str, from: &str, to: &str) -> String {
    format!("{}{}", to, &path[from.len()..])
}

/// A sandbox held entirely in memory
pub struct MemoryStorage {
    tree: Mutex<Tree>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            tree: Mutex::new(Tree::new()),
        }
    }

    fn tree(&self) -> StorageResult<MutexGuard<'_, Tree>> {
        self.tree
            .lock()
            .map_err(|_| StorageError::Io("storage lock poisoned".to_string()))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get_file(&self, path: &str) -> StorageResult<String> {
        let path = check_path(path)?;
        self.tree()?
            .files
            .get(&path)
            .cloned()
            .ok_or(StorageError::FileNotFound)
    }

    fn set_file(&self, path: &str, content: &str) -> StorageResult<()> {
        let path = check_path(path)?;
        let mut tree = self.tree()?;
        match tree.files.get_mut(&path) {
            Some(existing) => {
                *existing = content.to_string();
                Ok(())
            }
            None => Err(StorageError::FileNotFound),
        }
    }

    fn create_file(&self, path: &str, content: &str) -> StorageResult<()> {
        let path = check_path(path)?;
        let mut tree = self.tree()?;
        if tree.directories.contains(&path) {
            return Err(StorageError::DirectoryExists);
        }
        if tree.files.contains_key(&path) {
            return Err(StorageError::FileExists);
        }
        tree.create_parents(&path)?;
        tree.files.insert(path, content.to_string());
        Ok(())
    }

    fn delete_file(&self, path: &str) -> StorageResult<()> {
        let path = check_path(path)?;
        self.tree()?
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or(StorageError::FileNotFound)
    }

    fn rename_file(&self, from: &str, to: &str) -> StorageResult<()> {
        let from = check_path(from)?;
        let to = check_path(to)?;
        let mut tree = self.tree()?;
        if !tree.files.contains_key(&from) {
            return Err(StorageError::SourceNotFound);
        }
        if tree.files.contains_key(&to) {
            return Err(StorageError::DestinationFileExists);
        }
        if tree.directories.contains(&to) {
            return Err(StorageError::DirectoryExists);
        }
        tree.create_parents(&to)?;
        if let Some(content) = tree.files.remove(&from) {
            tree.files.insert(to, content);
        }
        Ok(())
    }

    fn list_directory(&self, path: &str) -> StorageResult<Vec<Entry>> {
        let path = check_path(path)?;
        let tree = self.tree()?;
        if !tree.directories.contains(&path) {
            return Err(StorageError::DirectoryNotFound);
        }

        let directories = tree
            .directories
            .iter()
            .filter(|dir| !dir.is_empty() && parent(dir) == path)
            .map(|dir| Entry::directory(name(dir)));
        let files = tree
            .files
            .keys()
            .filter(|file| parent(file) == path)
            .map(|file| Entry::file(name(file)));

        let mut entries: Vec<Entry> = directories.chain(files).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_directory(&self, path: &str) -> StorageResult<()> {
        let path = check_path(path)?;
        let mut tree = self.tree()?;
        if tree.directories.contains(&path) {
            return Err(StorageError::DirectoryAlreadyExists);
        }
        if tree.files.contains_key(&path) {
            return Err(StorageError::FileInTheWay);
        }
        tree.create_parents(&path)?;
        tree.directories.insert(path);
        Ok(())
    }

    fn delete_directory(&self, path: &str) -> StorageResult<()> {
        let path = check_path(path)?;
        if path.is_empty() {
            return Err(StorageError::DeleteRoot);
        }
        let mut tree = self.tree()?;
        if !tree.directories.contains(&path) {
            return Err(StorageError::DirectoryNotFound);
        }
        let has_children = tree.files.keys().any(|file| is_below(file, &path))
            || tree.directories.iter().any(|dir| is_below(dir, &path));
        if has_children {
            return Err(StorageError::DirectoryNotEmpty);
        }
        tree.directories.remove(&path);
        Ok(())
    }

    fn rename_directory(&self, from: &str, to: &str) -> StorageResult<()> {
        let from = check_path(from)?;
        let to = check_path(to)?;
        if from.is_empty() {
            return Err(StorageError::RenameRoot);
        }
        let mut tree = self.tree()?;
        if !tree.directories.contains(&from) {
            return Err(StorageError::DirectoryNotFound);
        }
        if tree.exists(&to) {
            return Err(StorageError::DestinationExists);
        }
        if is_below(&to, &from) {
            return Err(StorageError::IntoItself);
        }
        tree.create_parents(&to)?;

        let directories: Vec<String> = tree
            .directories
            .iter()
            .filter(|dir| **dir == from || is_below(dir, &from))
            .cloned()
            .collect();
        for dir in directories {
            tree.directories.remove(&dir);
            tree.directories.insert(moved(&dir, &from, &to));
        }

        let files: Vec<String> = tree
            .files
            .keys()
            .filter(|file| is_below(file, &from))
            .cloned()
            .collect();
        for file in files {
            if let Some(content) = tree.files.remove(&file) {
                tree.files.insert(moved(&file, &from, &to), content);
            }
        }
        Ok(())
    }

    fn is_file(&self, path: &str) -> bool {
        match (check_path(path), self.tree()) {
            (Ok(path), Ok(tree)) => tree.files.contains_key(&path),
            _ => false,
        }
    }

    fn is_directory(&self, path: &str) -> bool {
        match (check_path(path), self.tree()) {
            (Ok(path), Ok(tree)) => tree.directories.contains(&path),
            _ => false,
        }
    }
}
