//! Stored fields (`.sf`).
//!
//! Each document's body is followed by its header in the data region; the
//! table holds `vint(docs)` and per document `vint(start) vint(body len)
//! vint(header len)`. Documents are numbered in the order `end` is called.

use bytes::Bytes;
use tessera_common::{Error, Result, verify_contract, verify_data};
use tessera_directory::Directory;
use tessera_format::{
    DocId, DocumentMask, ReaderState, Serializer, StoredFieldsReader, StoredFieldsWriter,
    filename::file_name,
};
use tessera_io::{DataInput, DataOutput, StreamOutput};

use crate::{STORED_FIELDS_EXT, artifact};

const ELEMENT: &str = "stored fields";

#[derive(Default)]
pub struct StoredFieldsWriterV1 {
    out: Option<StreamOutput>,
    /// Bodies of the document in progress.
    body: Vec<u8>,
    header: Vec<u8>,
    index: Vec<u8>,
    docs: u32,
}

impl StoredFieldsWriterV1 {
    pub fn new() -> StoredFieldsWriterV1 {
        Default::default()
    }
}

/// Runs `serializer` into `buf`, rolling back whatever it appended when it
/// declines, fails or writes nothing.
fn append(buf: &mut Vec<u8>, serializer: &dyn Serializer) -> Result<bool> {
    let mark = buf.len();
    match serializer.write(buf) {
        Ok(true) if buf.len() > mark => Ok(true),
        Ok(_) => {
            buf.truncate(mark);
            Ok(false)
        }
        Err(e) => {
            buf.truncate(mark);
            Err(e)
        }
    }
}

impl StoredFieldsWriter for StoredFieldsWriterV1 {
    fn prepare(&mut self, dir: &dyn Directory, segment: &str) -> Result<()> {
        verify_contract!("stored_fields_writer.prepare", self.out.is_none());
        self.out = Some(artifact::create(dir, &file_name(segment, STORED_FIELDS_EXT))?);
        self.body.clear();
        self.index.clear();
        self.docs = 0;
        Ok(())
    }

    fn write(&mut self, body: &dyn Serializer) -> Result<bool> {
        verify_contract!("stored_fields_writer.write", self.out.is_some());
        append(&mut self.body, body)
    }

    fn end(&mut self, header: Option<&dyn Serializer>) -> Result<()> {
        const OPERATION: &str = "stored_fields_writer.end";
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| Error::contract(OPERATION, "writer is not prepared"))?;
        verify_contract!(OPERATION, self.docs < u32::MAX);
        self.header.clear();
        if let Some(header) = header {
            append(&mut self.header, header)?;
        }
        let start = out.position();
        out.write_slice(&self.body)?;
        out.write_slice(&self.header)?;
        self.index.write_vint(start)?;
        self.index.write_vint(self.body.len() as u64)?;
        self.index.write_vint(self.header.len() as u64)?;
        self.docs += 1;
        self.body.clear();
        Ok(())
    }

    fn reset(&mut self) {
        self.body.clear();
    }

    fn finish(&mut self) -> Result<()> {
        const OPERATION: &str = "stored_fields_writer.finish";
        if !self.body.is_empty() {
            return Err(Error::contract(
                OPERATION,
                "document in progress, call end or reset",
            ));
        }
        let out = self
            .out
            .take()
            .ok_or_else(|| Error::contract(OPERATION, "writer is not prepared"))?;
        let mut table = Vec::with_capacity(self.index.len() + 5);
        table.write_vint(self.docs as u64)?;
        table.write_slice(&self.index)?;
        artifact::seal_with_table(out, &table)?;
        log::debug!("stored fields sealed with {} documents", self.docs);
        self.index.clear();
        Ok(())
    }
}

#[derive(Clone, Copy)]
struct DocEntry {
    start: usize,
    body: usize,
    header: usize,
}

#[derive(Default)]
pub struct StoredFieldsReaderV1 {
    data: Bytes,
    docs: Vec<DocEntry>,
    deleted: Option<DocumentMask>,
}

impl StoredFieldsReaderV1 {
    pub fn new() -> StoredFieldsReaderV1 {
        Default::default()
    }
}

impl StoredFieldsReader for StoredFieldsReaderV1 {
    fn prepare(&mut self, state: &ReaderState) -> Result<()> {
        let name = file_name(state.segment_name(), STORED_FIELDS_EXT);
        let data = artifact::open(state.dir, &name, ELEMENT)?;
        let mut table = artifact::read_table(&data, ELEMENT)?;
        let count = table.read_vint()? as usize;
        verify_data!(docs, count <= table.remaining());
        let mut docs = Vec::with_capacity(count);
        for _ in 0..count {
            let start = table.read_vint()?;
            let body = table.read_vint()?;
            let header = table.read_vint()?;
            let len = body
                .checked_add(header)
                .ok_or_else(|| Error::invalid_format(ELEMENT, "document length overflow"))?;
            let range = artifact::data_range(&data, start, len, ELEMENT)?;
            docs.push(DocEntry {
                start: range.start,
                body: body as usize,
                header: header as usize,
            });
        }
        verify_data!(table, table.is_eof());
        self.data = data;
        self.docs = docs;
        self.deleted = state.docs_mask.cloned();
        Ok(())
    }

    fn visit(
        &self,
        doc: DocId,
        visitor: &mut dyn FnMut(&mut DataInput, &mut DataInput) -> bool,
    ) -> Result<bool> {
        let Some(entry) = self.docs.get(doc as usize).copied() else {
            return Ok(false);
        };
        if entry.body == 0 && entry.header == 0 {
            return Ok(false);
        }
        if self.deleted.as_ref().is_some_and(|mask| mask.contains(doc)) {
            return Ok(false);
        }
        let body_end = entry.start + entry.body;
        let mut body = DataInput::new(self.data.slice(entry.start..body_end), ELEMENT);
        let mut header = DataInput::new(
            self.data.slice(body_end..body_end + entry.header),
            ELEMENT,
        );
        Ok(visitor(&mut header, &mut body))
    }

    fn docs_count(&self) -> u32 {
        self.docs.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use tessera_directory::MemoryDirectory;
    use tessera_format::{FieldsMeta, SegmentMeta};

    use super::*;
    use crate::FormatV1;

    fn read_doc(reader: &StoredFieldsReaderV1, doc: DocId) -> Option<(Vec<u8>, Vec<u8>)> {
        let mut found = None;
        let visited = reader
            .visit(doc, &mut |header, body| {
                found = Some((header.peek_rest().to_vec(), body.peek_rest().to_vec()));
                true
            })
            .unwrap();
        assert_eq!(visited, found.is_some());
        found
    }

    fn open(dir: &MemoryDirectory, mask: Option<&DocumentMask>) -> StoredFieldsReaderV1 {
        let format = FormatV1::default();
        let fields = FieldsMeta::default();
        let meta = SegmentMeta::new("_1", "1_0");
        let state = ReaderState {
            codec: &format,
            dir,
            docs_mask: mask,
            fields: &fields,
            meta: &meta,
        };
        let mut reader = StoredFieldsReaderV1::new();
        reader.prepare(&state).unwrap();
        reader
    }

    #[test]
    fn test_documents_and_headers() {
        let dir = MemoryDirectory::new();
        let mut writer = StoredFieldsWriterV1::new();
        writer.prepare(&dir, "_1").unwrap();

        assert!(writer.write(&"hello ").unwrap());
        assert!(writer.write(&"world").unwrap());
        writer.end(Some(&"h0")).unwrap();

        // Rejected body: nothing appended, document continues.
        assert!(!writer.write(&"").unwrap());
        let decline = |_: &mut dyn DataOutput| -> Result<bool> { Ok(false) };
        assert!(!writer.write(&decline).unwrap());
        writer.end(None).unwrap();

        assert!(writer.write(&b"third".to_vec()).unwrap());
        writer.end(None).unwrap();
        writer.finish().unwrap();

        let reader = open(&dir, None);
        assert_eq!(reader.docs_count(), 3);
        assert_eq!(
            read_doc(&reader, 0),
            Some((b"h0".to_vec(), b"hello world".to_vec()))
        );
        assert_eq!(read_doc(&reader, 1), None);
        assert_eq!(read_doc(&reader, 2), Some((Vec::new(), b"third".to_vec())));
        assert_eq!(read_doc(&reader, 3), None);
        assert_eq!(read_doc(&reader, u32::MAX), None);

        let stop = reader.visit(0, &mut |_, _| false).unwrap();
        assert!(!stop);
    }

    #[test]
    fn test_reset_and_finish_contract() {
        let dir = MemoryDirectory::new();
        let mut writer = StoredFieldsWriterV1::new();
        assert!(writer.write(&"x").unwrap_err().is_contract_violation());
        writer.prepare(&dir, "_1").unwrap();
        writer.write(&"discarded").unwrap();
        writer.reset();
        writer.write(&"kept").unwrap();
        writer.end(None).unwrap();
        writer.write(&"open").unwrap();
        assert!(writer.finish().unwrap_err().is_contract_violation());
        writer.reset();
        writer.finish().unwrap();

        let reader = open(&dir, None);
        assert_eq!(read_doc(&reader, 0), Some((Vec::new(), b"kept".to_vec())));
        assert_eq!(reader.docs_count(), 1);
    }

    #[test]
    fn test_deleted_documents_are_hidden() {
        let dir = MemoryDirectory::new();
        let mut writer = StoredFieldsWriterV1::new();
        writer.prepare(&dir, "_1").unwrap();
        for i in 0..4 {
            writer.write(&format!("doc{i}")).unwrap();
            writer.end(None).unwrap();
        }
        writer.finish().unwrap();

        let mask = DocumentMask::from_iter([1u32, 3]);
        let reader = open(&dir, Some(&mask));
        assert!(read_doc(&reader, 0).is_some());
        assert!(read_doc(&reader, 1).is_none());
        assert!(read_doc(&reader, 2).is_some());
        assert!(read_doc(&reader, 3).is_none());
    }
}
