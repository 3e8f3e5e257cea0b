//! Term dictionary codec: per-field mapping from term bytes to postings.

use std::collections::BTreeMap;

use tessera_common::Result;

use crate::{DocIterator, Features, FieldId, FlushState, Posting, ReaderState, TermMeta};

/// Writer-side input: the terms of one field in strictly increasing byte
/// order, each exposing its postings.
pub trait TermIterator {
    /// Advances to the next term. Returns `false` when exhausted.
    fn next(&mut self) -> Result<bool>;

    /// Current term.
    fn value(&self) -> &[u8];

    /// Postings of the current term.
    fn postings(&mut self) -> Box<dyn Iterator<Item = Posting> + '_>;
}

/// `TermIterator` over in-memory terms.
pub struct MemoryTermIterator {
    terms: Vec<(Vec<u8>, Vec<Posting>)>,
    current: Option<usize>,
}

impl MemoryTermIterator {
    pub fn new(terms: BTreeMap<Vec<u8>, Vec<Posting>>) -> MemoryTermIterator {
        Self::from_vec(terms.into_iter().collect())
    }

    /// Keeps the given order, sorted or not.
    pub fn from_vec(terms: Vec<(Vec<u8>, Vec<Posting>)>) -> MemoryTermIterator {
        MemoryTermIterator {
            terms,
            current: None,
        }
    }
}

impl TermIterator for MemoryTermIterator {
    fn next(&mut self) -> Result<bool> {
        let next = self.current.map_or(0, |i| i + 1);
        self.current = Some(next.min(self.terms.len()));
        Ok(next < self.terms.len())
    }

    fn value(&self) -> &[u8] {
        match self.current.and_then(|i| self.terms.get(i)) {
            Some((term, _)) => term,
            None => &[],
        }
    }

    fn postings(&mut self) -> Box<dyn Iterator<Item = Posting> + '_> {
        match self.current.and_then(|i| self.terms.get(i)) {
            Some((_, postings)) => Box::new(postings.iter().cloned()),
            None => Box::new(std::iter::empty()),
        }
    }
}

/// Builds the term dictionary of a segment and drives the postings writer.
pub trait FieldWriter: Send {
    fn prepare(&mut self, state: &FlushState) -> Result<()>;

    /// Writes one field. Fields come in increasing id order; terms in strictly
    /// increasing byte order.
    fn write(&mut self, field: FieldId, features: Features, terms: &mut dyn TermIterator)
    -> Result<()>;

    /// Finalizes all fields and seals the underlying streams.
    fn end(&mut self) -> Result<()>;
}

pub trait FieldReader: Send + Sync {
    fn prepare(&mut self, state: &ReaderState) -> Result<()>;

    /// Term dictionary of a field, or `None` if the field has no terms.
    fn terms(&self, field: FieldId) -> Option<&dyn TermReader>;

    /// Number of fields with a term dictionary.
    fn size(&self) -> usize;
}

/// Read-only view of one field's term dictionary. All statistics are
/// persisted at write time.
pub trait TermReader: Send + Sync {
    fn field(&self) -> FieldId;

    /// Fresh iterator positioned before the first term.
    fn iterator(&self) -> Result<Box<dyn SeekTermIterator + '_>>;

    fn features(&self) -> Features;

    /// Number of terms.
    fn size(&self) -> u64;

    /// Number of distinct documents with at least one term in the field.
    fn docs_count(&self) -> u64;

    /// Smallest term.
    fn min(&self) -> &[u8];

    /// Largest term.
    fn max(&self) -> &[u8];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekResult {
    /// Positioned at the target term.
    Found,
    /// Positioned at the smallest term greater than the target.
    NotFound,
    /// Every term is smaller than the target.
    End,
}

pub trait SeekTermIterator {
    /// Current term; empty if unpositioned.
    fn value(&self) -> &[u8];

    fn next(&mut self) -> Result<bool>;

    fn seek(&mut self, target: &[u8]) -> Result<SeekResult>;

    fn seek_exact(&mut self, target: &[u8]) -> Result<bool> {
        Ok(self.seek(target)? == SeekResult::Found)
    }

    /// Postings pointer and statistics of the current term.
    fn meta(&self) -> &TermMeta;

    /// Opens the current term's postings exposing the `requested` features
    /// (intersected with the field's features).
    fn postings(&self, requested: Features) -> Result<Box<dyn DocIterator>>;
}

/// Collects the remaining terms of an iterator.
pub fn collect_terms(it: &mut dyn SeekTermIterator) -> Result<Vec<Vec<u8>>> {
    let mut terms = Vec::new();
    while it.next()? {
        terms.push(it.value().to_vec());
    }
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_term_iterator() {
        let mut map = BTreeMap::new();
        map.insert(b"beta".to_vec(), vec![Posting::new(2)]);
        map.insert(b"alpha".to_vec(), vec![Posting::new(0), Posting::new(5)]);

        let mut it = MemoryTermIterator::new(map);
        assert!(it.value().is_empty());
        assert!(it.next().unwrap());
        assert_eq!(it.value(), b"alpha");
        assert_eq!(it.postings().map(|p| p.doc).collect::<Vec<_>>(), vec![0, 5]);
        assert!(it.next().unwrap());
        assert_eq!(it.value(), b"beta");
        assert!(!it.next().unwrap());
        assert!(!it.next().unwrap());
        assert_eq!(it.postings().count(), 0);
    }
}
