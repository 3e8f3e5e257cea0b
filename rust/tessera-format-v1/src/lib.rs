//! Reference format `1_0`.
//!
//! Every artifact shares one envelope (see `artifact`): a versioned header,
//! an optional data region, a checksummed table message and a footer.
//! Segment artifacts are named after the segment (`_3.tm`, `_3.doc`, ...);
//! versioned ones (`_3.2.sm`, `_3.2.doc_mask`) also carry the segment
//! version, and index generations are `segments_<N>`.

mod artifact;
pub mod columnstore;
pub mod document_mask;
pub mod field_meta;
pub mod index_meta;
mod persisted;
pub mod postings;
pub mod segment_meta;
pub mod stored_fields;
pub mod terms;

use std::sync::Arc;

use tessera_common::{Result, verify_arg};
use tessera_format::{
    ColumnMetaReader, ColumnMetaWriter, ColumnstoreReader, ColumnstoreWriter, DocumentMaskReader,
    DocumentMaskWriter, FieldMetaReader, FieldMetaWriter, FieldReader, FieldWriter, Format,
    FormatRegistry, IndexMetaReader, IndexMetaWriter, PostingsReader, PostingsWriter,
    SegmentMetaReader, SegmentMetaWriter, StoredFieldsReader, StoredFieldsWriter,
};

pub use columnstore::{
    ColumnMetaReaderV1, ColumnMetaWriterV1, ColumnstoreReaderV1, ColumnstoreWriterV1,
};
pub use document_mask::{DocumentMaskReaderV1, DocumentMaskWriterV1};
pub use field_meta::{FieldMetaReaderV1, FieldMetaWriterV1};
pub use index_meta::{IndexMetaReaderV1, IndexMetaWriterV1};
pub use postings::{PostingsReaderV1, PostingsWriterV1};
pub use segment_meta::{SegmentMetaReaderV1, SegmentMetaWriterV1};
pub use stored_fields::{StoredFieldsReaderV1, StoredFieldsWriterV1};
pub use terms::{FieldReaderV1, FieldWriterV1, TermReaderV1};

pub const FORMAT_NAME: &str = "1_0";

pub const FIELD_META_EXT: &str = "fm";
pub const TERMS_EXT: &str = "tm";
pub const POSTINGS_EXT: &str = "doc";
pub const STORED_FIELDS_EXT: &str = "sf";
pub const COLUMNSTORE_EXT: &str = "cs";
pub const COLUMN_META_EXT: &str = "cm";
pub const SEGMENT_META_EXT: &str = "sm";
pub const DOCUMENT_MASK_EXT: &str = "doc_mask";

pub const SEGMENTS_PREFIX: &str = "segments_";
pub const PENDING_SEGMENTS_PREFIX: &str = "pending_segments_";

/// Tuning knobs of the `1_0` codecs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatV1Options {
    /// Postings per skip block.
    pub postings_block_size: u32,
    /// Terms per prefix-compressed dictionary block.
    pub terms_block_size: u32,
}

impl Default for FormatV1Options {
    fn default() -> Self {
        FormatV1Options {
            postings_block_size: 128,
            terms_block_size: 32,
        }
    }
}

impl FormatV1Options {
    pub fn validate(&self) -> Result<()> {
        verify_arg!(postings_block_size, self.postings_block_size >= 2);
        verify_arg!(terms_block_size, self.terms_block_size >= 2);
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct FormatV1 {
    options: FormatV1Options,
}

impl FormatV1 {
    pub fn new() -> FormatV1 {
        Default::default()
    }

    pub fn with_options(options: FormatV1Options) -> Result<FormatV1> {
        options.validate()?;
        Ok(FormatV1 { options })
    }

    pub fn options(&self) -> &FormatV1Options {
        &self.options
    }
}

impl Format for FormatV1 {
    fn type_name(&self) -> &str {
        FORMAT_NAME
    }

    fn index_meta_writer(&self) -> Box<dyn IndexMetaWriter> {
        Box::new(IndexMetaWriterV1::new())
    }

    fn index_meta_reader(&self) -> Box<dyn IndexMetaReader> {
        Box::new(IndexMetaReaderV1)
    }

    fn segment_meta_writer(&self) -> Box<dyn SegmentMetaWriter> {
        Box::new(SegmentMetaWriterV1)
    }

    fn segment_meta_reader(&self) -> Box<dyn SegmentMetaReader> {
        Box::new(SegmentMetaReaderV1)
    }

    fn document_mask_writer(&self) -> Box<dyn DocumentMaskWriter> {
        Box::new(DocumentMaskWriterV1::new())
    }

    fn document_mask_reader(&self) -> Box<dyn DocumentMaskReader> {
        Box::new(DocumentMaskReaderV1::new())
    }

    fn field_meta_writer(&self) -> Box<dyn FieldMetaWriter> {
        Box::new(FieldMetaWriterV1::new())
    }

    fn field_meta_reader(&self) -> Box<dyn FieldMetaReader> {
        Box::new(FieldMetaReaderV1::new())
    }

    fn field_writer(&self) -> Box<dyn FieldWriter> {
        Box::new(FieldWriterV1::new(
            self.postings_writer(),
            self.options.terms_block_size,
        ))
    }

    fn field_reader(&self) -> Box<dyn FieldReader> {
        Box::new(FieldReaderV1::new(self.postings_reader()))
    }

    fn postings_writer(&self) -> Box<dyn PostingsWriter> {
        Box::new(PostingsWriterV1::new(self.options.postings_block_size))
    }

    fn postings_reader(&self) -> Box<dyn PostingsReader> {
        Box::new(PostingsReaderV1::new())
    }

    fn stored_fields_writer(&self) -> Box<dyn StoredFieldsWriter> {
        Box::new(StoredFieldsWriterV1::new())
    }

    fn stored_fields_reader(&self) -> Box<dyn StoredFieldsReader> {
        Box::new(StoredFieldsReaderV1::new())
    }

    fn column_meta_writer(&self) -> Box<dyn ColumnMetaWriter> {
        Box::new(ColumnMetaWriterV1::new())
    }

    fn column_meta_reader(&self) -> Box<dyn ColumnMetaReader> {
        Box::new(ColumnMetaReaderV1::new())
    }

    fn columnstore_writer(&self) -> Box<dyn ColumnstoreWriter> {
        Box::new(ColumnstoreWriterV1::new())
    }

    fn columnstore_reader(&self) -> Box<dyn ColumnstoreReader> {
        Box::new(ColumnstoreReaderV1::new())
    }
}

/// Registers the default `1_0` format.
pub fn register(registry: &FormatRegistry) {
    registry.add(Arc::new(FormatV1::new()) as Arc<dyn Format>);
}
