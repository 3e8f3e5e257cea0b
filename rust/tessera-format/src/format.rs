use crate::{
    ColumnMetaReader, ColumnMetaWriter, ColumnstoreReader, ColumnstoreWriter, DocumentMaskReader,
    DocumentMaskWriter, FieldMetaReader, FieldMetaWriter, FieldReader, FieldWriter,
    IndexMetaReader, IndexMetaWriter, PostingsReader, PostingsWriter, SegmentMetaReader,
    SegmentMetaWriter, StoredFieldsReader, StoredFieldsWriter,
};

/// A self-consistent on-disk encoding: one factory per codec.
///
/// The type name identifies the format in a [`FormatRegistry`](crate::FormatRegistry)
/// and is persisted in every segment's metadata, so a segment is always read
/// back with the codec that wrote it.
///
/// Every factory returns a fresh, unprepared instance.
pub trait Format: Send + Sync + 'static {
    fn type_name(&self) -> &str;

    fn index_meta_writer(&self) -> Box<dyn IndexMetaWriter>;

    fn index_meta_reader(&self) -> Box<dyn IndexMetaReader>;

    fn segment_meta_writer(&self) -> Box<dyn SegmentMetaWriter>;

    fn segment_meta_reader(&self) -> Box<dyn SegmentMetaReader>;

    fn document_mask_writer(&self) -> Box<dyn DocumentMaskWriter>;

    fn document_mask_reader(&self) -> Box<dyn DocumentMaskReader>;

    fn field_meta_writer(&self) -> Box<dyn FieldMetaWriter>;

    fn field_meta_reader(&self) -> Box<dyn FieldMetaReader>;

    /// Term dictionary writer; drives a postings writer of the same format.
    fn field_writer(&self) -> Box<dyn FieldWriter>;

    fn field_reader(&self) -> Box<dyn FieldReader>;

    fn postings_writer(&self) -> Box<dyn PostingsWriter>;

    fn postings_reader(&self) -> Box<dyn PostingsReader>;

    fn stored_fields_writer(&self) -> Box<dyn StoredFieldsWriter>;

    fn stored_fields_reader(&self) -> Box<dyn StoredFieldsReader>;

    fn column_meta_writer(&self) -> Box<dyn ColumnMetaWriter>;

    fn column_meta_reader(&self) -> Box<dyn ColumnMetaReader>;

    fn columnstore_writer(&self) -> Box<dyn ColumnstoreWriter>;

    fn columnstore_reader(&self) -> Box<dyn ColumnstoreReader>;
}

impl std::fmt::Debug for dyn Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Format")
            .field("type_name", &self.type_name())
            .finish()
    }
}
