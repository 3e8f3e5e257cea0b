/// Segment-local document identifier.
pub type DocId = u32;

/// Segment-local field (or column) identifier.
pub type FieldId = u32;

pub mod doc_limits {
    use super::DocId;

    /// Sentinel for an exhausted document iterator. Never a valid document id.
    pub const EOF: DocId = DocId::MAX;

    pub const MIN: DocId = 0;

    /// Largest assignable document id.
    pub const MAX: DocId = EOF - 1;

    pub fn valid(doc: DocId) -> bool {
        doc != EOF
    }
}

pub mod field_limits {
    use super::FieldId;

    /// Field ids are dense and start here.
    pub const MIN: FieldId = 0;

    pub const INVALID: FieldId = FieldId::MAX;
}
