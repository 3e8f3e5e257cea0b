//! Transient context handed to writers and readers for the duration of a
//! single `prepare` call.

use tessera_directory::Directory;

use crate::{DocumentMask, Features, FieldsMeta, Format, SegmentMeta};

/// Context for flushing one segment.
#[derive(Clone, Copy)]
pub struct FlushState<'a> {
    pub dir: &'a dyn Directory,
    /// Segment name.
    pub name: &'a str,
    /// Union of the features of all fields in the segment.
    pub features: Features,
    pub fields_count: usize,
    /// Number of documents in the segment; every document id is below it.
    pub docs_count: u32,
    pub version: u64,
}

impl<'a> FlushState<'a> {
    pub fn new(dir: &'a dyn Directory, name: &'a str, docs_count: u32) -> FlushState<'a> {
        FlushState {
            dir,
            name,
            features: Features::all(),
            fields_count: 0,
            docs_count,
            version: 0,
        }
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_fields_count(mut self, fields_count: usize) -> Self {
        self.fields_count = fields_count;
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}

/// Context for opening the readers of one sealed segment.
#[derive(Clone, Copy)]
pub struct ReaderState<'a> {
    pub codec: &'a dyn Format,
    pub dir: &'a dyn Directory,
    /// Deleted documents, if the segment has any.
    pub docs_mask: Option<&'a DocumentMask>,
    pub fields: &'a FieldsMeta,
    pub meta: &'a SegmentMeta,
}

impl ReaderState<'_> {
    pub fn segment_name(&self) -> &str {
        &self.meta.name
    }
}
