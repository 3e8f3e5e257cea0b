//! The abstract index format layer.
//!
//! A *format* is a family of codecs that together serialize one immutable
//! index segment (postings, term dictionary, field metadata, stored fields,
//! column store, deletions) and publish generations of the whole index with a
//! two-phase commit. This crate defines the data model and the writer/reader
//! traits every format implements; concrete encodings live in their own
//! crates and are selected by name through a [`FormatRegistry`].
//!
//! # Flush order
//!
//! field meta → term dictionary (driving postings) → stored fields →
//! column store and column meta → document mask → segment meta → index meta
//! `prepare`/`commit`.
//!
//! Writers are single-threaded by contract. Readers of sealed segments are
//! `Sync` and share the immutable segment bytes.

pub mod attributes;
pub mod columnstore;
pub mod document_mask;
pub mod features;
pub mod field_meta;
pub mod filename;
pub mod format;
pub mod index_meta;
pub mod postings;
pub mod registry;
pub mod segment_meta;
pub mod state;
pub mod stored_fields;
pub mod terms;
pub mod types;

pub use attributes::{Position, Posting, PostingAttributes};
pub use columnstore::{
    ColumnMeta, ColumnMetaReader, ColumnMetaWriter, ColumnValuesReader, ColumnValuesWriter,
    ColumnsMeta, ColumnstoreReader, ColumnstoreWriter, EmptyColumnValues,
};
pub use document_mask::{
    DocumentMask, DocumentMaskReader, DocumentMaskWriter, read_document_mask,
    write_document_mask,
};
pub use features::Features;
pub use field_meta::{FieldMeta, FieldMetaReader, FieldMetaWriter, FieldsMeta};
pub use format::Format;
pub use index_meta::{CommitState, IndexMeta, IndexMetaReader, IndexMetaWriter, IndexSegment};
pub use postings::{
    DocIterator, EmptyDocIterator, PostingsReader, PostingsWriter, TermMeta, collect_postings,
};
pub use registry::FormatRegistry;
pub use segment_meta::{SegmentMeta, SegmentMetaReader, SegmentMetaWriter};
pub use state::{FlushState, ReaderState};
pub use stored_fields::{Serializer, StoredFieldsReader, StoredFieldsWriter};
pub use terms::{
    FieldReader, FieldWriter, MemoryTermIterator, SeekResult, SeekTermIterator, TermIterator,
    TermReader, collect_terms,
};
pub use types::{DocId, FieldId, doc_limits, field_limits};
