use std::collections::BTreeSet;

use tessera_common::Result;
use tessera_directory::Directory;

use crate::Features;

/// Identity and content descriptor of a sealed segment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentMeta {
    /// Unique within an index.
    pub name: String,
    /// Per-segment generation tag; bumped when a new document mask is written.
    pub version: u64,
    pub docs_count: u32,
    pub features: Features,
    /// Type name of the format that wrote the segment.
    pub codec: String,
    /// Files that belong to the segment.
    pub files: BTreeSet<String>,
}

impl SegmentMeta {
    pub fn new(name: impl Into<String>, codec: impl Into<String>) -> SegmentMeta {
        SegmentMeta {
            name: name.into(),
            codec: codec.into(),
            ..Default::default()
        }
    }

    pub fn add_file(&mut self, file: impl Into<String>) {
        self.files.insert(file.into());
    }
}

pub trait SegmentMetaWriter: Send {
    /// Name of the descriptor file of `meta`, derived from its name and version.
    fn filename(&self, meta: &SegmentMeta) -> String;

    /// Persists `meta`, first registering the descriptor file in `meta.files`.
    fn write(&mut self, dir: &dyn Directory, meta: &mut SegmentMeta) -> Result<()>;
}

pub trait SegmentMetaReader: Send {
    /// Loads a descriptor into `meta`. Without an explicit `filename`, the name
    /// is derived from `meta.name` and `meta.version`.
    fn read(&mut self, dir: &dyn Directory, meta: &mut SegmentMeta, filename: Option<&str>)
    -> Result<()>;
}
