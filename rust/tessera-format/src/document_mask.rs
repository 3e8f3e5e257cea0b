use roaring::RoaringBitmap;
use tessera_common::{Error, Result};
use tessera_directory::Directory;

use crate::{DocId, SegmentMeta};

/// Logically deleted documents of a segment.
pub type DocumentMask = RoaringBitmap;

/// Persists a segment's deletions. A new mask is written under a new segment
/// version; an existing mask file is never modified.
pub trait DocumentMaskWriter: Send {
    fn filename(&self, meta: &SegmentMeta) -> String;

    fn prepare(&mut self, dir: &dyn Directory, meta: &SegmentMeta) -> Result<()>;

    /// Declares the number of ids that follow.
    fn begin(&mut self, count: u32) -> Result<()>;

    /// Adds one id. Ids must be unique; order is free.
    fn write(&mut self, doc: DocId) -> Result<()>;

    fn end(&mut self) -> Result<()>;
}

pub trait DocumentMaskReader: Send {
    /// Returns `false` if the segment has no mask file, i.e. no deletions.
    fn prepare(&mut self, dir: &dyn Directory, meta: &SegmentMeta) -> Result<bool>;

    /// Returns the number of ids.
    fn begin(&mut self) -> Result<u32>;

    fn read(&mut self) -> Result<DocId>;

    fn end(&mut self) -> Result<()>;
}

/// Writes a complete mask through `writer`.
pub fn write_document_mask(
    writer: &mut dyn DocumentMaskWriter,
    dir: &dyn Directory,
    meta: &SegmentMeta,
    mask: &DocumentMask,
) -> Result<()> {
    let count = u32::try_from(mask.len())
        .map_err(|_| Error::invalid_arg("mask", "too many deleted documents"))?;
    writer.prepare(dir, meta)?;
    writer.begin(count)?;
    for doc in mask {
        writer.write(doc)?;
    }
    writer.end()
}

/// Loads the mask of a segment; empty if the segment has no deletions.
pub fn read_document_mask(
    reader: &mut dyn DocumentMaskReader,
    dir: &dyn Directory,
    meta: &SegmentMeta,
) -> Result<DocumentMask> {
    let mut mask = DocumentMask::new();
    if !reader.prepare(dir, meta)? {
        return Ok(mask);
    }
    let count = reader.begin()?;
    for _ in 0..count {
        if !mask.insert(reader.read()?) {
            return Err(Error::invalid_format("document mask", "duplicate document id"));
        }
    }
    reader.end()?;
    Ok(mask)
}
