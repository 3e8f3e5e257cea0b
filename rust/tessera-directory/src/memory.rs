use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::HashMap;
use bytes::Bytes;
use tessera_io::{ReadAt, SealingWrite, StorageProfile};

use crate::{Directory, validate_name};

/// In-memory directory.
///
/// A created file becomes visible under its name only when its writer is
/// sealed. Readers hold an immutable snapshot of the content, so removing or
/// renaming a file never affects readers that are already open.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    files: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryDirectory {
    pub fn new() -> MemoryDirectory {
        Default::default()
    }

    /// Total number of bytes held by all files.
    pub fn total_size(&self) -> u64 {
        self.read_files().values().map(|b| b.len() as u64).sum()
    }

    fn read_files(&self) -> RwLockReadGuard<'_, HashMap<String, Bytes>> {
        self.files.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_files(&self) -> RwLockWriteGuard<'_, HashMap<String, Bytes>> {
        self.files.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn not_found(name: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("file '{name}' not found"),
    )
}

impl Directory for MemoryDirectory {
    fn create(&self, name: &str) -> std::io::Result<Box<dyn SealingWrite>> {
        validate_name(name)?;
        if self.read_files().contains_key(name) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("file '{name}' already exists"),
            ));
        }
        Ok(Box::new(MemoryFileWriter {
            dir: self.clone(),
            name: name.to_string(),
            buf: Some(Vec::new()),
        }))
    }

    fn open(&self, name: &str) -> std::io::Result<Arc<dyn ReadAt>> {
        let content = self
            .read_files()
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))?;
        Ok(Arc::new(content))
    }

    fn exists(&self, name: &str) -> std::io::Result<bool> {
        Ok(self.read_files().contains_key(name))
    }

    fn list(&self) -> std::io::Result<Vec<String>> {
        Ok(self.read_files().keys().cloned().collect())
    }

    fn remove(&self, name: &str) -> std::io::Result<()> {
        self.write_files()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    fn rename(&self, from: &str, to: &str) -> std::io::Result<()> {
        validate_name(to)?;
        let mut files = self.write_files();
        let content = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_string(), content);
        Ok(())
    }

    fn len(&self, name: &str) -> std::io::Result<u64> {
        self.read_files()
            .get(name)
            .map(|b| b.len() as u64)
            .ok_or_else(|| not_found(name))
    }
}

struct MemoryFileWriter {
    dir: MemoryDirectory,
    name: String,
    buf: Option<Vec<u8>>,
}

impl SealingWrite for MemoryFileWriter {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.buf
            .as_mut()
            .ok_or_else(|| std::io::Error::other("write after seal"))?
            .extend_from_slice(buf);
        Ok(())
    }

    fn seal(&mut self) -> std::io::Result<()> {
        let buf = self
            .buf
            .take()
            .ok_or_else(|| std::io::Error::other("already sealed"))?;
        let mut files = self.dir.write_files();
        if files.contains_key(&self.name) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("file '{}' was created concurrently", self.name),
            ));
        }
        files.insert(std::mem::take(&mut self.name), Bytes::from(buf));
        Ok(())
    }

    fn storage_profile(&self) -> StorageProfile {
        StorageProfile {
            min_io_size: 1,
            ..Default::default()
        }
    }
}
