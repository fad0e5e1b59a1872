use palaver::storage::{
    filesystem::FilesystemStorage, memory::MemoryStorage, Entry, Storage, StorageError,
};
use tempfile::TempDir;

fn backends() -> Vec<(Box<dyn Storage>, Option<TempDir>)> {
    let dir = tempfile::tempdir().unwrap();
    let memory: Box<dyn Storage> = Box::new(MemoryStorage::new());
    let filesystem: Box<dyn Storage> = Box::new(FilesystemStorage::new(dir.path()).unwrap());
    vec![(memory, None), (filesystem, Some(dir))]
}

#[test]
fn test_unsafe_paths_rejected_by_every_backend() {
    for (storage, _dir) in backends() {
        storage.create_file("keep.txt", "original").unwrap();
        for path in ["../x", "./x", ".", "a/../x", "a/../../x", "x\0y"] {
            assert!(storage.create_file(path, "bad").is_err(), "{}", path);
            assert!(storage.set_file(path, "bad").is_err(), "{}", path);
            assert!(storage.create_directory(path).is_err(), "{}", path);
            assert!(!storage.is_file(path), "{}", path);
        }
        assert_eq!(
            storage.list_directory("").unwrap(),
            vec![Entry::file("keep.txt")]
        );
        assert_eq!(storage.get_file("keep.txt").unwrap(), "original");
    }
}

#[test]
fn test_backends_agree_on_lifecycle() {
    for (storage, _dir) in backends() {
        storage.create_file("/docs/guide/intro.md", "# Intro").unwrap();
        assert!(storage.is_directory("docs"));
        assert!(storage.is_directory("docs/guide"));
        assert!(storage.is_file("docs/guide/intro.md"));

        assert_eq!(
            storage.create_file("docs/guide", "x"),
            Err(StorageError::DirectoryExists)
        );
        assert_eq!(
            storage.create_directory("docs/guide/intro.md"),
            Err(StorageError::FileInTheWay)
        );
        assert_eq!(
            storage.create_directory("docs/guide"),
            Err(StorageError::DirectoryAlreadyExists)
        );
        assert_eq!(
            storage.create_directory("/"),
            Err(StorageError::DirectoryAlreadyExists)
        );

        storage.rename_file("docs/guide/intro.md", "docs/intro.md").unwrap();
        assert_eq!(
            storage.list_directory("docs").unwrap(),
            vec![Entry::directory("guide"), Entry::file("intro.md")]
        );

        storage.delete_directory("docs/guide").unwrap();
        assert_eq!(
            storage.delete_directory("docs"),
            Err(StorageError::DirectoryNotEmpty)
        );

        storage.rename_directory("docs", "archive/docs").unwrap();
        assert_eq!(storage.get_file("archive/docs/intro.md").unwrap(), "# Intro");
        assert!(!storage.is_directory("docs"));

        assert_eq!(storage.delete_directory(""), Err(StorageError::DeleteRoot));
        assert_eq!(
            storage.rename_directory("missing", "other"),
            Err(StorageError::DirectoryNotFound)
        );
    }
}
