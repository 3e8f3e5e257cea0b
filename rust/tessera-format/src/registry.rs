//! Name-keyed registry of formats.
//!
//! Callers select a format by name when creating an index; readers resolve
//! the format persisted in each segment's metadata through the same registry.
//!
//! # Thread Safety
//!
//! The registry uses a `RwLock`, allowing concurrent lookups while ensuring
//! exclusive access during registration.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::Format;

#[derive(Default)]
pub struct FormatRegistry {
    formats: RwLock<ahash::HashMap<String, Arc<dyn Format>>>,
}

impl FormatRegistry {
    pub fn new() -> FormatRegistry {
        Default::default()
    }

    /// Registers a format under its type name.
    ///
    /// Registering a name twice replaces the earlier format (last write wins);
    /// the replaced format is returned.
    pub fn add(&self, format: impl Into<Arc<dyn Format>>) -> Option<Arc<dyn Format>> {
        let format = format.into();
        let name = format.type_name().to_string();
        let replaced = self.write_formats().insert(name.clone(), format);
        if replaced.is_some() {
            log::info!("format '{name}' re-registered, replacing the previous one");
        } else {
            log::debug!("format '{name}' registered");
        }
        replaced
    }

    /// Looks up a format by type name.
    pub fn get(&self, name: impl AsRef<str>) -> Option<Arc<dyn Format>> {
        self.read_formats().get(name.as_ref()).cloned()
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.read_formats().contains_key(name.as_ref())
    }

    /// Calls `visitor` with each registered name until it returns `false`.
    /// Returns `false` if the enumeration was stopped early.
    ///
    /// Names are visited in sorted order; the registry is not locked while
    /// the visitor runs.
    pub fn visit(&self, visitor: &mut dyn FnMut(&str) -> bool) -> bool {
        self.names().iter().all(|name| visitor(name.as_str()))
    }

    /// Sorted list of registered names.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.read_formats().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read_formats().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_formats().is_empty()
    }

    fn read_formats(&self) -> RwLockReadGuard<'_, ahash::HashMap<String, Arc<dyn Format>>> {
        self.formats.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_formats(&self) -> RwLockWriteGuard<'_, ahash::HashMap<String, Arc<dyn Format>>> {
        self.formats.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.names())
            .finish()
    }
}
