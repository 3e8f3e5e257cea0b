//! Deleted documents (`<segment>.<version>.doc_mask`): `u32 count` followed by
//! the serialized roaring bitmap, all in the table.

use roaring::RoaringBitmap;
use tessera_common::{Error, Result, verify_contract, verify_data};
use tessera_directory::Directory;
use tessera_format::{
    DocId, DocumentMaskReader, DocumentMaskWriter, SegmentMeta, doc_limits,
    filename::versioned_file_name,
};
use tessera_io::{DataOutput, StreamOutput};

use crate::{DOCUMENT_MASK_EXT, artifact};

const ELEMENT: &str = "document mask";

pub(crate) fn mask_file_name(meta: &SegmentMeta) -> String {
    versioned_file_name(&meta.name, meta.version, DOCUMENT_MASK_EXT)
}

#[derive(Default)]
pub struct DocumentMaskWriterV1 {
    out: Option<StreamOutput>,
    expected: Option<u32>,
    mask: RoaringBitmap,
}

impl DocumentMaskWriterV1 {
    pub fn new() -> DocumentMaskWriterV1 {
        Default::default()
    }
}

impl DocumentMaskWriter for DocumentMaskWriterV1 {
    fn filename(&self, meta: &SegmentMeta) -> String {
        mask_file_name(meta)
    }

    fn prepare(&mut self, dir: &dyn Directory, meta: &SegmentMeta) -> Result<()> {
        verify_contract!("document_mask_writer.prepare", self.out.is_none());
        self.out = Some(artifact::create(dir, &mask_file_name(meta))?);
        self.expected = None;
        self.mask.clear();
        Ok(())
    }

    fn begin(&mut self, count: u32) -> Result<()> {
        const OPERATION: &str = "document_mask_writer.begin";
        verify_contract!(OPERATION, self.out.is_some());
        verify_contract!(OPERATION, self.expected.is_none());
        self.expected = Some(count);
        Ok(())
    }

    fn write(&mut self, doc: DocId) -> Result<()> {
        const OPERATION: &str = "document_mask_writer.write";
        let expected = self
            .expected
            .ok_or_else(|| Error::contract(OPERATION, "begin was not called"))?;
        verify_contract!(OPERATION, doc_limits::valid(doc));
        if self.mask.len() >= expected as u64 {
            return Err(Error::contract(
                OPERATION,
                format!("more than the {expected} declared documents"),
            ));
        }
        if !self.mask.insert(doc) {
            return Err(Error::contract(
                OPERATION,
                format!("document {doc} written twice"),
            ));
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        const OPERATION: &str = "document_mask_writer.end";
        let expected = self
            .expected
            .ok_or_else(|| Error::contract(OPERATION, "begin was not called"))?;
        if self.mask.len() != expected as u64 {
            return Err(Error::contract(
                OPERATION,
                format!("{} documents written, {expected} declared", self.mask.len()),
            ));
        }
        let out = self
            .out
            .take()
            .ok_or_else(|| Error::contract(OPERATION, "writer is not prepared"))?;
        let mut table = Vec::with_capacity(4 + self.mask.serialized_size());
        table.write_u32(expected)?;
        self.mask
            .serialize_into(&mut table)
            .map_err(|e| Error::io(ELEMENT, e))?;
        artifact::seal_with_table(out, &table)?;
        self.expected = None;
        self.mask.clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct DocumentMaskReaderV1 {
    docs: Vec<DocId>,
    next: usize,
    begun: bool,
}

impl DocumentMaskReaderV1 {
    pub fn new() -> DocumentMaskReaderV1 {
        Default::default()
    }
}

impl DocumentMaskReader for DocumentMaskReaderV1 {
    fn prepare(&mut self, dir: &dyn Directory, meta: &SegmentMeta) -> Result<bool> {
        self.docs.clear();
        self.next = 0;
        self.begun = false;
        let name = mask_file_name(meta);
        if !artifact::exists(dir, &name)? {
            return Ok(false);
        }
        let data = artifact::open(dir, &name, ELEMENT)?;
        let mut table = artifact::read_table(&data, ELEMENT)?;
        let count = table.read_u32()?;
        let mask = RoaringBitmap::deserialize_from(table.peek_rest())
            .map_err(|e| Error::invalid_format(ELEMENT, e.to_string()))?;
        verify_data!(count, mask.len() == count as u64);
        if let Some(max) = mask.max() {
            verify_data!(doc, max < meta.docs_count || meta.docs_count == 0);
        }
        self.docs = mask.iter().collect();
        Ok(true)
    }

    fn begin(&mut self) -> Result<u32> {
        self.next = 0;
        self.begun = true;
        Ok(self.docs.len() as u32)
    }

    fn read(&mut self) -> Result<DocId> {
        const OPERATION: &str = "document_mask_reader.read";
        verify_contract!(OPERATION, self.begun);
        let doc = self
            .docs
            .get(self.next)
            .copied()
            .ok_or_else(|| Error::contract(OPERATION, "read past the declared count"))?;
        self.next += 1;
        Ok(doc)
    }

    fn end(&mut self) -> Result<()> {
        self.docs = Vec::new();
        self.begun = false;
        Ok(())
    }
}
