//! *Directory* abstraction: a flat namespace of immutable files that the
//! codecs create, open, rename and remove by name.
//!
//! Files are write-once: `create` refuses to overwrite an existing name and
//! the content is complete once the returned writer is sealed. `rename` is the
//! only mutation of the namespace that must be atomic, since it publishes a
//! pending index generation.

pub mod fs;
pub mod memory;

use std::sync::Arc;

use tessera_io::{ReadAt, SealingWrite};

pub use fs::FsDirectory;
pub use memory::MemoryDirectory;

pub trait Directory: Send + Sync + 'static {
    /// Creates a writer for a new file. Fails with `AlreadyExists` if the name is taken.
    fn create(&self, name: &str) -> std::io::Result<Box<dyn SealingWrite>>;

    /// Opens a reader for an existing file.
    fn open(&self, name: &str) -> std::io::Result<Arc<dyn ReadAt>>;

    fn exists(&self, name: &str) -> std::io::Result<bool>;

    /// Lists the names of all files in the directory, in no particular order.
    fn list(&self) -> std::io::Result<Vec<String>>;

    fn remove(&self, name: &str) -> std::io::Result<()>;

    /// Atomically renames `from` to `to`, replacing `to` if it exists.
    fn rename(&self, from: &str, to: &str) -> std::io::Result<()>;

    /// Returns the size of an existing file.
    fn len(&self, name: &str) -> std::io::Result<u64> {
        self.open(name)?.size()
    }
}

impl<T> Directory for Arc<T>
where
    T: Directory + ?Sized,
{
    fn create(&self, name: &str) -> std::io::Result<Box<dyn SealingWrite>> {
        self.as_ref().create(name)
    }

    fn open(&self, name: &str) -> std::io::Result<Arc<dyn ReadAt>> {
        self.as_ref().open(name)
    }

    fn exists(&self, name: &str) -> std::io::Result<bool> {
        self.as_ref().exists(name)
    }

    fn list(&self) -> std::io::Result<Vec<String>> {
        self.as_ref().list()
    }

    fn remove(&self, name: &str) -> std::io::Result<()> {
        self.as_ref().remove(name)
    }

    fn rename(&self, from: &str, to: &str) -> std::io::Result<()> {
        self.as_ref().rename(from, to)
    }

    fn len(&self, name: &str) -> std::io::Result<u64> {
        self.as_ref().len(name)
    }
}

/// Rejects names that are empty, relative path components, or contain separators.
pub fn validate_name(name: &str) -> std::io::Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid file name '{name}'"),
        ))
    }
}
