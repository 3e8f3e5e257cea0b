//! Column store (`.cs`) and column name bindings (`.cm`).
//!
//! Column values are laid out column after column in the data region. The
//! table describes each column as `vint(id) vint(values) vint(data offset)`
//! followed by `vint(doc delta) vint(value len)` per value, which is loaded
//! into sorted doc id arrays for binary-search point lookup.

use std::{
    ops::Range,
    sync::{Arc, Mutex, MutexGuard},
};

use ahash::HashSet;
use bytes::Bytes;
use tessera_common::{Error, Result, verify_contract, verify_data};
use tessera_directory::Directory;
use tessera_format::{
    ColumnMeta, ColumnMetaReader, ColumnMetaWriter, ColumnValuesReader, ColumnValuesWriter,
    ColumnstoreReader, ColumnstoreWriter, DocId, DocumentMask, EmptyColumnValues, FieldId,
    ReaderState, Serializer, doc_limits, filename::file_name,
};
use tessera_io::{DataInput, DataOutput, StreamOutput};

use crate::{COLUMN_META_EXT, COLUMNSTORE_EXT, artifact};

const ELEMENT: &str = "columnstore";
const META_ELEMENT: &str = "column meta";

#[derive(Default)]
struct ColumnBuffer {
    docs: Vec<DocId>,
    /// End offset of each value in `data`.
    ends: Vec<usize>,
    data: Vec<u8>,
    closed: bool,
}

fn lock(column: &Mutex<ColumnBuffer>) -> MutexGuard<'_, ColumnBuffer> {
    column.lock().unwrap_or_else(|e| e.into_inner())
}

struct ColumnValuesWriterV1 {
    id: FieldId,
    column: Arc<Mutex<ColumnBuffer>>,
}

impl ColumnValuesWriter for ColumnValuesWriterV1 {
    fn write(&mut self, doc: DocId, value: &dyn Serializer) -> Result<bool> {
        const OPERATION: &str = "column_values_writer.write";
        let mut column = lock(&self.column);
        if column.closed {
            return Err(Error::contract(
                OPERATION,
                format!("column {} was already flushed", self.id),
            ));
        }
        verify_contract!(OPERATION, doc_limits::valid(doc));
        if let Some(&last) = column.docs.last() {
            if doc <= last {
                return Err(Error::contract(
                    OPERATION,
                    format!("doc {doc} follows doc {last} in column {}", self.id),
                ));
            }
        }
        let mark = column.data.len();
        match value.write(&mut column.data) {
            Ok(true) => {
                let end = column.data.len();
                column.docs.push(doc);
                column.ends.push(end);
                Ok(true)
            }
            Ok(false) => {
                column.data.truncate(mark);
                Ok(false)
            }
            Err(e) => {
                column.data.truncate(mark);
                Err(e)
            }
        }
    }
}

#[derive(Default)]
pub struct ColumnstoreWriterV1 {
    out: Option<StreamOutput>,
    columns: Vec<Arc<Mutex<ColumnBuffer>>>,
}

impl ColumnstoreWriterV1 {
    pub fn new() -> ColumnstoreWriterV1 {
        Default::default()
    }
}

impl ColumnstoreWriter for ColumnstoreWriterV1 {
    fn prepare(&mut self, dir: &dyn Directory, segment: &str) -> Result<()> {
        verify_contract!("columnstore_writer.prepare", self.out.is_none());
        self.out = Some(artifact::create(dir, &file_name(segment, COLUMNSTORE_EXT))?);
        self.columns.clear();
        Ok(())
    }

    fn push_column(&mut self) -> Result<(FieldId, Box<dyn ColumnValuesWriter>)> {
        verify_contract!("columnstore_writer.push_column", self.out.is_some());
        let id = self.columns.len() as FieldId;
        let column = Arc::new(Mutex::new(ColumnBuffer::default()));
        self.columns.push(column.clone());
        Ok((id, Box::new(ColumnValuesWriterV1 { id, column })))
    }

    fn flush(&mut self) -> Result<()> {
        let mut out = self.out.take().ok_or_else(|| {
            Error::contract("columnstore_writer.flush", "writer is not prepared")
        })?;
        let mut table = Vec::new();
        table.write_vint(self.columns.len() as u64)?;
        for (id, column) in self.columns.drain(..).enumerate() {
            let mut column = lock(&column);
            column.closed = true;
            table.write_vint(id as u64)?;
            table.write_vint(column.docs.len() as u64)?;
            table.write_vint(out.position())?;
            out.write_slice(&column.data)?;
            let (mut prev_doc, mut prev_end) = (0, 0);
            for (&doc, &end) in column.docs.iter().zip(&column.ends) {
                table.write_vint((doc - prev_doc) as u64)?;
                table.write_vint((end - prev_end) as u64)?;
                (prev_doc, prev_end) = (doc, end);
            }
            column.data = Vec::new();
        }
        artifact::seal_with_table(out, &table)
    }
}

struct ColumnData {
    docs: Vec<DocId>,
    /// Absolute offsets of the values; value `i` spans `offsets[i]..offsets[i + 1]`.
    offsets: Vec<usize>,
}

impl ColumnData {
    fn value_range(&self, index: usize) -> Range<usize> {
        self.offsets[index]..self.offsets[index + 1]
    }
}

#[derive(Default)]
pub struct ColumnstoreReaderV1 {
    data: Bytes,
    columns: Vec<ColumnData>,
    deleted: Option<DocumentMask>,
}

impl ColumnstoreReaderV1 {
    pub fn new() -> ColumnstoreReaderV1 {
        Default::default()
    }

    fn is_deleted(&self, doc: DocId) -> bool {
        self.deleted.as_ref().is_some_and(|mask| mask.contains(doc))
    }
}

impl ColumnstoreReader for ColumnstoreReaderV1 {
    fn prepare(&mut self, state: &ReaderState) -> Result<bool> {
        let name = file_name(state.segment_name(), COLUMNSTORE_EXT);
        self.columns.clear();
        if !artifact::exists(state.dir, &name)? {
            return Ok(false);
        }
        let data = artifact::open(state.dir, &name, ELEMENT)?;
        let mut table = artifact::read_table(&data, ELEMENT)?;
        let count = table.read_vint()? as usize;
        verify_data!(columns, count <= table.remaining());
        let mut columns = Vec::with_capacity(count);
        for i in 0..count {
            verify_data!(column_id, table.read_vint()? == i as u64);
            let values = table.read_vint()? as usize;
            verify_data!(values, values <= table.remaining());
            let start = table.read_vint()?;
            let mut docs = Vec::with_capacity(values);
            let mut lens = Vec::with_capacity(values);
            let mut doc = 0u32;
            for j in 0..values {
                let delta = table.read_vint_u32()?;
                verify_data!(doc_delta, j == 0 || delta > 0);
                doc = doc
                    .checked_add(delta)
                    .ok_or_else(|| Error::invalid_format(ELEMENT, "doc id overflow"))?;
                docs.push(doc);
                lens.push(table.read_vint()?);
            }
            let total = lens.iter().try_fold(0u64, |acc, &len| acc.checked_add(len));
            let total =
                total.ok_or_else(|| Error::invalid_format(ELEMENT, "column length overflow"))?;
            let range = artifact::data_range(&data, start, total, ELEMENT)?;
            let mut offsets = Vec::with_capacity(values + 1);
            let mut offset = range.start;
            offsets.push(offset);
            for len in lens {
                offset += len as usize;
                offsets.push(offset);
            }
            columns.push(ColumnData { docs, offsets });
        }
        verify_data!(table, table.is_eof());
        self.data = data;
        self.columns = columns;
        self.deleted = state.docs_mask.cloned();
        Ok(true)
    }

    fn values(&self, column: FieldId) -> Box<dyn ColumnValuesReader + '_> {
        match self.columns.get(column as usize) {
            Some(column) => Box::new(ColumnValuesV1 {
                reader: self,
                column,
            }),
            None => Box::new(EmptyColumnValues),
        }
    }

    fn visit(
        &self,
        column: FieldId,
        visitor: &mut dyn FnMut(DocId, &mut DataInput) -> bool,
    ) -> Result<bool> {
        let Some(column) = self.columns.get(column as usize) else {
            return Ok(false);
        };
        for (i, &doc) in column.docs.iter().enumerate() {
            if self.is_deleted(doc) {
                continue;
            }
            let mut value = DataInput::new(self.data.slice(column.value_range(i)), ELEMENT);
            if !visitor(doc, &mut value) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn size(&self) -> usize {
        self.columns.len()
    }
}

struct ColumnValuesV1<'a> {
    reader: &'a ColumnstoreReaderV1,
    column: &'a ColumnData,
}

impl ColumnValuesReader for ColumnValuesV1<'_> {
    fn get(&self, doc: DocId) -> Result<Option<DataInput>> {
        if self.reader.is_deleted(doc) {
            return Ok(None);
        }
        Ok(self.column.docs.binary_search(&doc).ok().map(|i| {
            DataInput::new(self.reader.data.slice(self.column.value_range(i)), ELEMENT)
        }))
    }
}

#[derive(Default)]
pub struct ColumnMetaWriterV1 {
    out: Option<StreamOutput>,
    names: HashSet<String>,
    entries: Vec<u8>,
}

impl ColumnMetaWriterV1 {
    pub fn new() -> ColumnMetaWriterV1 {
        Default::default()
    }
}

impl ColumnMetaWriter for ColumnMetaWriterV1 {
    fn prepare(&mut self, dir: &dyn Directory, segment: &str) -> Result<()> {
        verify_contract!("column_meta_writer.prepare", self.out.is_none());
        self.out = Some(artifact::create(dir, &file_name(segment, COLUMN_META_EXT))?);
        self.names.clear();
        self.entries.clear();
        Ok(())
    }

    fn write(&mut self, name: &str, id: FieldId) -> Result<()> {
        const OPERATION: &str = "column_meta_writer.write";
        verify_contract!(OPERATION, self.out.is_some());
        if !self.names.insert(name.to_string()) {
            return Err(Error::contract(
                OPERATION,
                format!("column '{name}' is already bound"),
            ));
        }
        self.entries.write_str(name)?;
        self.entries.write_vint(id as u64)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let out = self.out.take().ok_or_else(|| {
            Error::contract("column_meta_writer.flush", "writer is not prepared")
        })?;
        let mut table = Vec::with_capacity(self.entries.len() + 5);
        table.write_vint(self.names.len() as u64)?;
        table.write_slice(&self.entries)?;
        artifact::seal_with_table(out, &table)?;
        self.entries.clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct ColumnMetaReaderV1 {
    table: Option<DataInput>,
    left: u64,
}

impl ColumnMetaReaderV1 {
    pub fn new() -> ColumnMetaReaderV1 {
        Default::default()
    }
}

impl ColumnMetaReader for ColumnMetaReaderV1 {
    fn prepare(&mut self, dir: &dyn Directory, segment: &str) -> Result<bool> {
        let name = file_name(segment, COLUMN_META_EXT);
        self.table = None;
        self.left = 0;
        if !artifact::exists(dir, &name)? {
            return Ok(false);
        }
        let data = artifact::open(dir, &name, META_ELEMENT)?;
        let mut table = artifact::read_table(&data, META_ELEMENT)?;
        let count = table.read_vint()?;
        verify_data!(columns, count <= table.remaining() as u64);
        self.left = count;
        self.table = Some(table);
        Ok(true)
    }

    fn read(&mut self, column: &mut ColumnMeta) -> Result<bool> {
        let Some(table) = self.table.as_mut() else {
            return Ok(false);
        };
        if self.left == 0 {
            return Ok(false);
        }
        column.name = table.read_str()?;
        column.id = table.read_vint_u32()?;
        self.left -= 1;
        Ok(true)
    }
}
