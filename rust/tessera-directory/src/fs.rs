use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

use tessera_io::{
    ReadAt, SealingWrite,
    file::{FileReader, FileWriter},
};

use crate::{Directory, validate_name};

/// A `Directory` backed by a single local filesystem folder.
///
/// File names map one-to-one onto entries of the folder; nested paths are
/// rejected. Renames are followed by a sync of the folder itself, so a
/// published index generation survives a crash.
pub struct FsDirectory {
    path: PathBuf,
}

impl FsDirectory {
    /// Opens a directory at `path`, creating the folder if it does not exist.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<FsDirectory> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        Ok(FsDirectory { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_path(&self, name: &str) -> std::io::Result<PathBuf> {
        validate_name(name)?;
        Ok(self.path.join(name))
    }

    #[cfg(unix)]
    fn sync_dir(&self) -> std::io::Result<()> {
        File::open(&self.path)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Directory for FsDirectory {
    fn create(&self, name: &str) -> std::io::Result<Box<dyn SealingWrite>> {
        let path = self.file_path(name)?;
        Ok(Box::new(FileWriter::create(path)?))
    }

    fn open(&self, name: &str) -> std::io::Result<Arc<dyn ReadAt>> {
        let file = File::open(self.file_path(name)?)?;
        Ok(Arc::new(FileReader::new(file)?))
    }

    fn exists(&self, name: &str) -> std::io::Result<bool> {
        self.file_path(name)?.try_exists()
    }

    fn list(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => log::debug!("skipping non-UTF-8 file name {name:?}"),
            }
        }
        Ok(names)
    }

    fn remove(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.file_path(name)?)
    }

    fn rename(&self, from: &str, to: &str) -> std::io::Result<()> {
        std::fs::rename(self.file_path(from)?, self.file_path(to)?)?;
        self.sync_dir()
    }

    fn len(&self, name: &str) -> std::io::Result<u64> {
        Ok(std::fs::metadata(self.file_path(name)?)?.len())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn create_temp_dir() -> (FsDirectory, TempDir) {
        let temp = TempDir::new().unwrap();
        let dir = FsDirectory::new(temp.path().join("index")).unwrap();
        (dir, temp)
    }

    #[test]
    fn test_create_open_list() {
        let (dir, _temp) = create_temp_dir();
        let mut writer = dir.create("_1.tm").unwrap();
        writer.write_all(b"abcdefg").unwrap();
        writer.seal().unwrap();

        assert!(dir.exists("_1.tm").unwrap());
        assert!(!dir.exists("_2.tm").unwrap());
        assert_eq!(dir.len("_1.tm").unwrap(), 7);
        assert_eq!(dir.list().unwrap(), vec!["_1.tm".to_string()]);

        let reader = dir.open("_1.tm").unwrap();
        assert_eq!(reader.read_at(2..5).unwrap().as_ref(), b"cde");
    }

    #[test]
    fn test_create_existing_fails() {
        let (dir, _temp) = create_temp_dir();
        dir.create("a").unwrap().seal().unwrap();
        assert_eq!(
            dir.create("a").err().unwrap().kind(),
            std::io::ErrorKind::AlreadyExists
        );
    }

    #[test]
    fn test_rename_replaces_and_remove() {
        let (dir, _temp) = create_temp_dir();
        for (name, content) in [("pending", b"new"), ("current", b"old")] {
            let mut writer = dir.create(name).unwrap();
            writer.write_all(content).unwrap();
            writer.seal().unwrap();
        }
        dir.rename("pending", "current").unwrap();
        assert!(!dir.exists("pending").unwrap());
        let reader = dir.open("current").unwrap();
        assert_eq!(reader.read_at(0..3).unwrap().as_ref(), b"new");

        dir.remove("current").unwrap();
        assert!(dir.list().unwrap().is_empty());
        assert_eq!(
            dir.remove("current").unwrap_err().kind(),
            std::io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_rejects_nested_names() {
        let (dir, _temp) = create_temp_dir();
        assert!(dir.create("../escape").is_err());
        assert!(dir.open("sub/file").is_err());
        assert!(dir.exists("..").is_err());
    }
}
