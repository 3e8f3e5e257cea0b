//! Column store: per-document values kept apart from the term index.

use ahash::HashMap;
use tessera_common::{Error, Result};
use tessera_directory::Directory;
use tessera_io::DataInput;

use crate::{DocId, FieldId, ReaderState, Serializer};

/// Binding of a column name to the id allocated by the column store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub id: FieldId,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, id: FieldId) -> ColumnMeta {
        ColumnMeta {
            name: name.into(),
            id,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ColumnsMeta {
    columns: Vec<ColumnMeta>,
    by_name: HashMap<String, usize>,
}

impl ColumnsMeta {
    pub fn new(columns: Vec<ColumnMeta>) -> Result<ColumnsMeta> {
        let mut by_name = HashMap::default();
        for (i, column) in columns.iter().enumerate() {
            if by_name.insert(column.name.clone(), i).is_some() {
                return Err(Error::invalid_arg(
                    "columns",
                    format!("duplicate column name '{}'", column.name),
                ));
            }
        }
        Ok(ColumnsMeta { columns, by_name })
    }

    /// Drains a prepared reader until it reports the end of the sequence.
    pub fn read_from(reader: &mut dyn ColumnMetaReader) -> Result<ColumnsMeta> {
        let mut columns = Vec::new();
        let mut column = ColumnMeta::default();
        while reader.read(&mut column)? {
            columns.push(std::mem::take(&mut column));
        }
        ColumnsMeta::new(columns).map_err(|e| Error::invalid_format("column meta", e.to_string()))
    }

    pub fn find(&self, name: &str) -> Option<&ColumnMeta> {
        self.by_name.get(name).map(|&i| &self.columns[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnMeta> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

pub trait ColumnMetaWriter: Send {
    fn prepare(&mut self, dir: &dyn Directory, segment: &str) -> Result<()>;

    fn write(&mut self, name: &str, id: FieldId) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

pub trait ColumnMetaReader: Send {
    /// Returns `false` if the segment has no column metadata.
    fn prepare(&mut self, dir: &dyn Directory, segment: &str) -> Result<bool>;

    /// Reads the next binding in registration order; `false` at the end.
    fn read(&mut self, column: &mut ColumnMeta) -> Result<bool>;
}

/// Handle to one column opened by [`ColumnstoreWriter::push_column`].
pub trait ColumnValuesWriter: Send {
    /// Stores the value of `doc`. Documents must come in strictly increasing order.
    ///
    /// Returns `false` if the serializer declined and the value was skipped.
    fn write(&mut self, doc: DocId, value: &dyn Serializer) -> Result<bool>;
}

pub trait ColumnstoreWriter: Send {
    fn prepare(&mut self, dir: &dyn Directory, segment: &str) -> Result<()>;

    /// Allocates a new column.
    fn push_column(&mut self) -> Result<(FieldId, Box<dyn ColumnValuesWriter>)>;

    /// Finalizes every column pushed since `prepare` and seals the stream.
    /// Value writers of flushed columns reject further writes, and the writer
    /// must be prepared again before the next `push_column`.
    fn flush(&mut self) -> Result<()>;
}

/// Random access to the values of one column.
pub trait ColumnValuesReader {
    /// Value of `doc`, or `None` if the document has no value.
    fn get(&self, doc: DocId) -> Result<Option<DataInput>>;
}

pub trait ColumnstoreReader: Send + Sync {
    /// Returns `false` if the segment has no column store.
    fn prepare(&mut self, state: &ReaderState) -> Result<bool>;

    /// Value lookup for a column. Unknown columns yield a reader that reports
    /// every document as absent.
    fn values(&self, column: FieldId) -> Box<dyn ColumnValuesReader + '_>;

    /// Visits every value of a column in increasing document order. Returns
    /// `false` if the visitor stopped early or the column is unknown.
    fn visit(
        &self,
        column: FieldId,
        visitor: &mut dyn FnMut(DocId, &mut DataInput) -> bool,
    ) -> Result<bool>;

    /// Number of columns.
    fn size(&self) -> usize;
}

/// `ColumnValuesReader` of a column without values.
pub struct EmptyColumnValues;

impl ColumnValuesReader for EmptyColumnValues {
    fn get(&self, _doc: DocId) -> Result<Option<DataInput>> {
        Ok(None)
    }
}
