//! Postings codec: the per-term list of documents and their attributes.

use std::sync::Arc;

use tessera_common::Result;
use tessera_io::{DataInput, DataOutput, ReadAt, SealingWrite};

use crate::{DocId, Features, FlushState, Posting, PostingAttributes, ReaderState};

/// Pointer from a term to its postings, plus the term's aggregate statistics.
///
/// The meaning of the offsets is private to the codec that produced them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TermMeta {
    pub docs_count: u32,
    /// Sum of frequencies over all documents; zero for fields without frequencies.
    pub total_freq: u64,
    pub doc_start: u64,
    pub skip_start: u64,
}

/// Writes the postings of every term of a segment into a single stream.
///
/// Call order: `prepare`, then per field `begin_field`, per term block
/// `begin_block`, per term `write` followed by `encode`, then `end` for the
/// field. `finish` seals the stream once all fields are written.
pub trait PostingsWriter: Send {
    /// Binds the writer to the segment's postings stream.
    fn prepare(&mut self, out: Box<dyn SealingWrite>, state: &FlushState) -> Result<()>;

    /// Declares the attribute kinds encoded for the terms that follow.
    fn begin_field(&mut self, features: Features) -> Result<()>;

    /// Resets the base that `encode` delta-encodes term pointers against.
    fn begin_block(&mut self) -> Result<()>;

    /// Consumes one term's postings in strictly increasing document order and
    /// fills `meta` with the resulting pointer and statistics.
    fn write(&mut self, postings: &mut dyn Iterator<Item = Posting>, meta: &mut TermMeta)
    -> Result<()>;

    /// Serializes a term pointer produced by `write` into the term dictionary.
    fn encode(&mut self, out: &mut dyn DataOutput, meta: &TermMeta) -> Result<()>;

    /// Finalizes the current field.
    fn end(&mut self) -> Result<()>;

    /// Seals the postings stream.
    fn finish(&mut self) -> Result<()>;
}

pub trait PostingsReader: Send + Sync {
    fn prepare(&mut self, input: Arc<dyn ReadAt>, state: &ReaderState) -> Result<()>;

    /// Inverse of [`PostingsWriter::encode`].
    ///
    /// `meta` carries the previously decoded term of the same block (or the
    /// default value at a block start) and is overwritten with the result.
    fn decode(&self, input: &mut DataInput, features: Features, meta: &mut TermMeta) -> Result<()>;

    /// Opens the postings of one term.
    ///
    /// `field_features` are the features the field was written with;
    /// `requested` selects which of them the iterator exposes.
    fn iterator(
        &self,
        field_features: Features,
        meta: &TermMeta,
        requested: Features,
    ) -> Result<Box<dyn DocIterator>>;
}

/// Forward-only cursor over a postings list.
pub trait DocIterator: Send {
    /// Current document, or `doc_limits::EOF` if the iterator is not
    /// positioned yet or is exhausted.
    fn doc(&self) -> DocId;

    /// Advances to the next document.
    fn next(&mut self) -> Result<Option<DocId>>;

    /// Advances to the first document `>= target`. Never moves backwards: if
    /// the iterator is already at or past `target`, the current document is
    /// returned.
    fn seek(&mut self, target: DocId) -> Result<Option<DocId>>;

    /// Attributes of the current document, restricted to the requested features.
    fn attributes(&self) -> &PostingAttributes;

    /// Upper bound of the number of documents the iterator yields.
    fn cost(&self) -> u64;
}

/// Iterator over an empty postings list.
#[derive(Default)]
pub struct EmptyDocIterator {
    attributes: PostingAttributes,
}

impl DocIterator for EmptyDocIterator {
    fn doc(&self) -> DocId {
        crate::doc_limits::EOF
    }

    fn next(&mut self) -> Result<Option<DocId>> {
        Ok(None)
    }

    fn seek(&mut self, _target: DocId) -> Result<Option<DocId>> {
        Ok(None)
    }

    fn attributes(&self) -> &PostingAttributes {
        &self.attributes
    }

    fn cost(&self) -> u64 {
        0
    }
}

/// Drains an iterator into a vector of postings, for bulk consumers.
pub fn collect_postings(it: &mut dyn DocIterator) -> Result<Vec<Posting>> {
    let mut postings = Vec::with_capacity(it.cost() as usize);
    while let Some(doc) = it.next()? {
        postings.push(Posting::with_attributes(doc, it.attributes().clone()));
    }
    Ok(postings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_iterator() {
        let mut it = EmptyDocIterator::default();
        assert_eq!(it.next().unwrap(), None);
        assert_eq!(it.seek(10).unwrap(), None);
        assert_eq!(it.doc(), crate::doc_limits::EOF);
        assert!(collect_postings(&mut it).unwrap().is_empty());
    }
}
