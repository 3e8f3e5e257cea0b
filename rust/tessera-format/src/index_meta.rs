//! Index metadata and the two-phase commit protocol.
//!
//! An [`IndexMeta`] describes one generation of the index: the live segments
//! and the counter used to name new segments. Generations are published by an
//! [`IndexMetaWriter`]:
//!
//! ```text
//! idle --prepare--> prepared --commit--> committed
//!                       |
//!                       +----rollback--> rolled_back
//! ```
//!
//! `prepare` persists the candidate generation where readers do not look for
//! it, `commit` publishes it atomically and `rollback` discards it. A failed
//! `prepare` leaves nothing behind and may be retried.

use std::sync::Arc;

use tessera_common::Result;
use tessera_directory::Directory;

use crate::SegmentMeta;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexSegment {
    /// Descriptor file of the segment.
    pub filename: String,
    pub meta: SegmentMeta,
}

impl IndexSegment {
    pub fn new(filename: impl Into<String>, meta: SegmentMeta) -> IndexSegment {
        IndexSegment {
            filename: filename.into(),
            meta,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexMeta {
    /// Generation this descriptor stands for: the staged candidate while a
    /// commit is in flight, otherwise the last committed one.
    generation: Option<u64>,
    last_generation: Option<u64>,
    counter: u64,
    segments: Vec<IndexSegment>,
}

impl IndexMeta {
    pub fn new() -> IndexMeta {
        Default::default()
    }

    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    /// Last generation known to be committed.
    pub fn last_generation(&self) -> Option<u64> {
        self.last_generation
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Allocates a unique segment name.
    pub fn next_segment_name(&mut self) -> String {
        self.counter += 1;
        format!("_{}", self.counter)
    }

    /// Generation a new commit would produce.
    pub fn next_generation(&self) -> u64 {
        self.last_generation.map_or(1, |g| g + 1)
    }

    pub fn add(&mut self, segment: IndexSegment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[IndexSegment] {
        &self.segments
    }

    pub fn retain_segments(&mut self, f: impl FnMut(&IndexSegment) -> bool) {
        self.segments.retain(f);
    }

    pub fn clear_segments(&mut self) {
        self.segments.clear();
    }

    pub fn docs_count(&self) -> u64 {
        self.segments.iter().map(|s| s.meta.docs_count as u64).sum()
    }

    /// Marks the next generation as the candidate and returns it.
    pub fn stage(&mut self) -> u64 {
        let candidate = self.next_generation();
        self.generation = Some(candidate);
        candidate
    }

    /// Records the staged candidate as committed.
    pub fn complete(&mut self) {
        self.last_generation = self.generation;
    }

    /// Drops the staged candidate, reverting to the last committed generation.
    pub fn discard(&mut self) {
        self.generation = self.last_generation;
    }

    /// Replaces the content with a generation loaded from storage.
    pub fn reset(&mut self, generation: u64, counter: u64, segments: Vec<IndexSegment>) {
        self.generation = Some(generation);
        self.last_generation = Some(generation);
        self.counter = counter;
        self.segments = segments;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitState {
    Idle,
    Prepared,
    Committed,
    RolledBack,
}

pub trait IndexMetaWriter: Send {
    /// Descriptor file of the generation `meta` currently stands for, if any.
    fn filename(&self, meta: &IndexMeta) -> Option<String>;

    /// Stages the next generation of `meta` and persists it as a candidate.
    fn prepare(&mut self, dir: Arc<dyn Directory>, meta: &mut IndexMeta) -> Result<()>;

    /// Publishes the prepared candidate.
    fn commit(&mut self, meta: &mut IndexMeta) -> Result<()>;

    /// Discards the prepared candidate. Never fails; cleanup problems are logged.
    fn rollback(&mut self, meta: &mut IndexMeta);

    fn state(&self) -> CommitState;
}

pub trait IndexMetaReader: Send {
    /// Returns `true` if the listing contains a committed generation.
    fn index_exists(&self, files: &[String]) -> bool;

    /// Descriptor file of the newest committed generation in the listing.
    fn last_segments_file<'a>(&self, files: &'a [String]) -> Option<&'a str>;

    /// Loads a generation into `meta`. Without an explicit `filename`, the
    /// generation `meta` stands for is read.
    fn read(&mut self, dir: &dyn Directory, meta: &mut IndexMeta, filename: Option<&str>)
    -> Result<()>;
}
