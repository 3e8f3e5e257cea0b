//! Term dictionary (`.tm`).
//!
//! Terms of a field are prefix-compressed in blocks; each entry is
//! `vint(shared prefix) bytes(suffix)` followed by the term's encoded
//! postings pointer. The table lists, per field, the persisted statistics and
//! a block index of `(first term, offset, len, terms)` used by `seek`.

use std::{cmp::Ordering, sync::Arc};

use bytes::Bytes;
use roaring::RoaringBitmap;
use tessera_common::{Error, Result, verify_contract, verify_data};
use tessera_format::{
    DocIterator, Features, FieldId, FieldReader, FieldWriter, FlushState, PostingsReader,
    PostingsWriter, ReaderState, SeekResult, SeekTermIterator, TermIterator, TermMeta, TermReader,
    filename::file_name,
};
use tessera_io::{DataInput, DataOutput, StreamOutput};

use crate::{POSTINGS_EXT, TERMS_EXT, artifact};

const ELEMENT: &str = "term dictionary";

#[derive(Clone, Debug)]
struct BlockEntry {
    first_term: Bytes,
    offset: u64,
    len: u64,
    terms: u32,
}

#[derive(Debug)]
struct FieldEntry {
    id: FieldId,
    features: Features,
    terms_count: u64,
    docs_count: u64,
    min: Bytes,
    max: Bytes,
    blocks: Vec<BlockEntry>,
}

impl FieldEntry {
    fn write(&self, out: &mut dyn DataOutput) -> Result<()> {
        out.write_vint(self.id as u64)?;
        out.write_u32(self.features.bits())?;
        out.write_vint(self.terms_count)?;
        out.write_vint(self.docs_count)?;
        out.write_bytes(&self.min)?;
        out.write_bytes(&self.max)?;
        out.write_vint(self.blocks.len() as u64)?;
        for block in &self.blocks {
            out.write_bytes(&block.first_term)?;
            out.write_vint(block.offset)?;
            out.write_vint(block.len)?;
            out.write_vint(block.terms as u64)?;
        }
        Ok(())
    }

    fn read(input: &mut DataInput, data: &Bytes) -> Result<FieldEntry> {
        let id = input.read_vint_u32()?;
        let features = Features::from_persisted(input.read_u32()?, ELEMENT)?;
        let terms_count = input.read_vint()?;
        let docs_count = input.read_vint()?;
        let min = input.read_bytes()?;
        let max = input.read_bytes()?;
        let count = input.read_vint()? as usize;
        verify_data!(blocks, count <= input.remaining());
        let mut blocks: Vec<BlockEntry> = Vec::with_capacity(count);
        let mut total = 0u64;
        for _ in 0..count {
            let block = BlockEntry {
                first_term: input.read_bytes()?,
                offset: input.read_vint()?,
                len: input.read_vint()?,
                terms: input.read_vint_u32()?,
            };
            artifact::data_range(data, block.offset, block.len, ELEMENT)?;
            verify_data!(block_terms, block.terms > 0);
            if let Some(prev) = blocks.last() {
                verify_data!(block_order, prev.first_term < block.first_term);
            }
            total += block.terms as u64;
            blocks.push(block);
        }
        verify_data!(terms_count, total == terms_count && terms_count > 0);
        verify_data!(bounds, min <= max);
        Ok(FieldEntry {
            id,
            features,
            terms_count,
            docs_count,
            min,
            max,
            blocks,
        })
    }
}

pub struct FieldWriterV1 {
    postings: Box<dyn PostingsWriter>,
    block_size: u32,
    out: Option<StreamOutput>,
    fields: Vec<FieldEntry>,
    last_field: Option<FieldId>,
}

impl FieldWriterV1 {
    pub fn new(postings: Box<dyn PostingsWriter>, block_size: u32) -> FieldWriterV1 {
        FieldWriterV1 {
            postings,
            block_size,
            out: None,
            fields: Vec::new(),
            last_field: None,
        }
    }
}

/// Accumulates one block of prefix-compressed entries.
struct BlockBuilder {
    buf: Vec<u8>,
    first_term: Vec<u8>,
    prev_term: Vec<u8>,
    terms: u32,
}

impl BlockBuilder {
    fn new() -> BlockBuilder {
        BlockBuilder {
            buf: Vec::new(),
            first_term: Vec::new(),
            prev_term: Vec::new(),
            terms: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.terms == 0
    }

    fn add_term(&mut self, term: &[u8]) -> Result<()> {
        let shared = if self.terms == 0 {
            self.first_term = term.to_vec();
            0
        } else {
            common_prefix(&self.prev_term, term)
        };
        self.buf.write_vint(shared as u64)?;
        self.buf.write_bytes(&term[shared..])?;
        self.prev_term.clear();
        self.prev_term.extend_from_slice(term);
        self.terms += 1;
        Ok(())
    }

    fn flush(&mut self, out: &mut StreamOutput) -> Result<BlockEntry> {
        let entry = BlockEntry {
            first_term: Bytes::from(std::mem::take(&mut self.first_term)),
            offset: out.position(),
            len: self.buf.len() as u64,
            terms: self.terms,
        };
        out.write_slice(&self.buf)?;
        self.buf.clear();
        self.terms = 0;
        Ok(entry)
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

impl FieldWriter for FieldWriterV1 {
    fn prepare(&mut self, state: &FlushState) -> Result<()> {
        verify_contract!("field_writer.prepare", self.out.is_none());
        let out = artifact::create(state.dir, &file_name(state.name, TERMS_EXT))?;
        let doc_name = file_name(state.name, POSTINGS_EXT);
        let postings = state
            .dir
            .create(&doc_name)
            .map_err(|e| Error::io(doc_name, e))?;
        self.postings.prepare(postings, state)?;
        self.out = Some(out);
        self.fields.clear();
        self.last_field = None;
        Ok(())
    }

    fn write(
        &mut self,
        field: FieldId,
        features: Features,
        terms: &mut dyn TermIterator,
    ) -> Result<()> {
        const OPERATION: &str = "field_writer.write";
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| Error::contract(OPERATION, "writer is not prepared"))?;
        if let Some(last) = self.last_field {
            if field <= last {
                return Err(Error::contract(
                    OPERATION,
                    format!("field {field} follows field {last}, ids must increase"),
                ));
            }
        }
        self.last_field = Some(field);
        self.postings.begin_field(features)?;

        let mut block = BlockBuilder::new();
        let mut blocks = Vec::new();
        let mut docs = RoaringBitmap::new();
        let mut prev: Option<Vec<u8>> = None;
        let mut min = None;
        let mut max = Vec::new();
        let mut terms_count = 0u64;
        while terms.next()? {
            let term = terms.value().to_vec();
            if let Some(prev) = &prev {
                if term <= *prev {
                    return Err(Error::contract(
                        OPERATION,
                        format!("terms of field {field} are not strictly increasing"),
                    ));
                }
            }

            let mut meta = TermMeta::default();
            let mut postings = terms.postings().inspect(|p| {
                docs.insert(p.doc);
            });
            self.postings.write(&mut postings, &mut meta)?;
            drop(postings);

            if meta.docs_count > 0 {
                if block.is_empty() {
                    self.postings.begin_block()?;
                }
                block.add_term(&term)?;
                self.postings.encode(&mut block.buf, &meta)?;
                if block.terms == self.block_size {
                    blocks.push(block.flush(out)?);
                }
                terms_count += 1;
                min.get_or_insert_with(|| term.clone());
                max.clone_from(&term);
            }
            prev = Some(term);
        }
        if !block.is_empty() {
            blocks.push(block.flush(out)?);
        }
        self.postings.end()?;

        if let Some(min) = min {
            self.fields.push(FieldEntry {
                id: field,
                features,
                terms_count,
                docs_count: docs.len(),
                min: Bytes::from(min),
                max: Bytes::from(max),
                blocks,
            });
        } else {
            log::debug!("field {field} has no postings, omitted from the term dictionary");
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let out = self
            .out
            .take()
            .ok_or_else(|| Error::contract("field_writer.end", "writer is not prepared"))?;
        let mut table = Vec::new();
        table.write_vint(self.fields.len() as u64)?;
        for field in &self.fields {
            field.write(&mut table)?;
        }
        artifact::seal_with_table(out, &table)?;
        self.postings.finish()?;
        self.fields.clear();
        Ok(())
    }
}

pub struct FieldReaderV1 {
    pending: Option<Box<dyn PostingsReader>>,
    fields: Vec<TermReaderV1>,
}

impl FieldReaderV1 {
    pub fn new(postings: Box<dyn PostingsReader>) -> FieldReaderV1 {
        FieldReaderV1 {
            pending: Some(postings),
            fields: Vec::new(),
        }
    }
}

impl FieldReader for FieldReaderV1 {
    fn prepare(&mut self, state: &ReaderState) -> Result<()> {
        let mut postings = self
            .pending
            .take()
            .ok_or_else(|| Error::contract("field_reader.prepare", "reader already prepared"))?;
        let segment = state.segment_name();
        let data = artifact::open(state.dir, &file_name(segment, TERMS_EXT), ELEMENT)?;
        let doc_name = file_name(segment, POSTINGS_EXT);
        let input = state.dir.open(&doc_name).map_err(|e| Error::io(doc_name, e))?;
        postings.prepare(input, state)?;
        let postings: Arc<dyn PostingsReader> = Arc::from(postings);

        let mut table = artifact::read_table(&data, ELEMENT)?;
        let count = table.read_vint()? as usize;
        verify_data!(fields, count <= table.remaining());
        let mut fields: Vec<TermReaderV1> = Vec::with_capacity(count);
        for _ in 0..count {
            let entry = FieldEntry::read(&mut table, &data)?;
            if let Some(prev) = fields.last() {
                verify_data!(field_order, prev.entry.id < entry.id);
            }
            match state.fields.get(entry.id) {
                Some(meta) if meta.features != entry.features => {
                    return Err(Error::invalid_format(
                        ELEMENT,
                        format!(
                            "field '{}' declares {:?} but was written with {:?}",
                            meta.name, meta.features, entry.features
                        ),
                    ));
                }
                None if !state.fields.is_empty() => {
                    return Err(Error::invalid_format(
                        ELEMENT,
                        format!("field {} is missing from the field metadata", entry.id),
                    ));
                }
                _ => {}
            }
            fields.push(TermReaderV1 {
                entry,
                data: data.clone(),
                postings: postings.clone(),
            });
        }
        verify_data!(table, table.is_eof());
        self.fields = fields;
        Ok(())
    }

    fn terms(&self, field: FieldId) -> Option<&dyn TermReader> {
        self.fields
            .binary_search_by_key(&field, |f| f.entry.id)
            .ok()
            .map(|i| &self.fields[i] as &dyn TermReader)
    }

    fn size(&self) -> usize {
        self.fields.len()
    }
}

pub struct TermReaderV1 {
    entry: FieldEntry,
    data: Bytes,
    postings: Arc<dyn PostingsReader>,
}

impl TermReader for TermReaderV1 {
    fn field(&self) -> FieldId {
        self.entry.id
    }

    fn iterator(&self) -> Result<Box<dyn SeekTermIterator + '_>> {
        Ok(Box::new(TermIteratorV1 {
            reader: self,
            block: None,
            input: DataInput::empty(),
            left: 0,
            term: Vec::new(),
            meta: TermMeta::default(),
            positioned: false,
        }))
    }

    fn features(&self) -> Features {
        self.entry.features
    }

    fn size(&self) -> u64 {
        self.entry.terms_count
    }

    fn docs_count(&self) -> u64 {
        self.entry.docs_count
    }

    fn min(&self) -> &[u8] {
        &self.entry.min
    }

    fn max(&self) -> &[u8] {
        &self.entry.max
    }
}

struct TermIteratorV1<'a> {
    reader: &'a TermReaderV1,
    block: Option<usize>,
    input: DataInput,
    /// Terms not yet read from the current block.
    left: u32,
    term: Vec<u8>,
    meta: TermMeta,
    positioned: bool,
}

impl TermIteratorV1<'_> {
    fn load_block(&mut self, index: usize) -> Result<()> {
        let block = &self.reader.entry.blocks[index];
        let range = artifact::data_range(&self.reader.data, block.offset, block.len, ELEMENT)?;
        self.input = DataInput::new(self.reader.data.slice(range), ELEMENT);
        self.block = Some(index);
        self.left = block.terms;
        self.term.clear();
        self.meta = TermMeta::default();
        Ok(())
    }

    /// Reads the next entry of the current block; `false` if it is exhausted.
    fn read_entry(&mut self) -> Result<bool> {
        if self.left == 0 {
            return Ok(false);
        }
        let shared = self.input.read_vint()? as usize;
        verify_data!(shared_prefix, shared <= self.term.len());
        let suffix = self.input.read_bytes()?;
        self.term.truncate(shared);
        self.term.extend_from_slice(&suffix);
        self.reader
            .postings
            .decode(&mut self.input, self.reader.entry.features, &mut self.meta)?;
        self.left -= 1;
        if self.left == 0 {
            verify_data!(block_len, self.input.is_eof());
        }
        self.positioned = true;
        Ok(true)
    }

    fn exhaust(&mut self) {
        self.block = Some(self.reader.entry.blocks.len());
        self.left = 0;
        self.term.clear();
        self.meta = TermMeta::default();
        self.positioned = false;
    }
}

impl SeekTermIterator for TermIteratorV1<'_> {
    fn value(&self) -> &[u8] {
        &self.term
    }

    fn next(&mut self) -> Result<bool> {
        loop {
            if self.read_entry()? {
                return Ok(true);
            }
            let next = self.block.map_or(0, |b| b + 1);
            if next >= self.reader.entry.blocks.len() {
                self.exhaust();
                return Ok(false);
            }
            self.load_block(next)?;
        }
    }

    fn seek(&mut self, target: &[u8]) -> Result<SeekResult> {
        let blocks = &self.reader.entry.blocks;
        let index = blocks.partition_point(|b| b.first_term.as_ref() <= target);
        self.load_block(index.saturating_sub(1))?;
        while self.next()? {
            match self.term.as_slice().cmp(target) {
                Ordering::Less => continue,
                Ordering::Equal => return Ok(SeekResult::Found),
                Ordering::Greater => return Ok(SeekResult::NotFound),
            }
        }
        Ok(SeekResult::End)
    }

    fn meta(&self) -> &TermMeta {
        &self.meta
    }

    fn postings(&self, requested: Features) -> Result<Box<dyn DocIterator>> {
        verify_contract!("term_iterator.postings", self.positioned);
        self.reader
            .postings
            .iterator(self.reader.entry.features, &self.meta, requested)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tessera_directory::MemoryDirectory;
    use tessera_format::{
        FieldMeta, FieldsMeta, MemoryTermIterator, Posting, SegmentMeta, collect_postings,
        collect_terms,
    };

    use super::*;
    use crate::{FormatV1, postings::{PostingsReaderV1, PostingsWriterV1}};

    fn terms(words: &[&str]) -> MemoryTermIterator {
        let mut map = BTreeMap::new();
        for (i, word) in words.iter().enumerate() {
            map.insert(
                word.as_bytes().to_vec(),
                vec![Posting::new(i as u32), Posting::new(i as u32 + 10)],
            );
        }
        MemoryTermIterator::new(map)
    }

    fn flush(dir: &MemoryDirectory, fields: &[(FieldId, &[&str])]) {
        let state = FlushState::new(dir, "_1", 100);
        let mut writer = FieldWriterV1::new(Box::new(PostingsWriterV1::new(4)), 3);
        writer.prepare(&state).unwrap();
        for &(id, words) in fields {
            writer.write(id, Features::FREQUENCY, &mut terms(words)).unwrap();
        }
        writer.end().unwrap();
    }

    fn open(dir: &MemoryDirectory, fields: &FieldsMeta) -> Result<FieldReaderV1> {
        let format = FormatV1::default();
        let meta = SegmentMeta::new("_1", "1_0");
        let state = ReaderState {
            codec: &format,
            dir,
            docs_mask: None,
            fields,
            meta: &meta,
        };
        let mut reader = FieldReaderV1::new(Box::new(PostingsReaderV1::new()));
        reader.prepare(&state)?;
        Ok(reader)
    }

    const WORDS: &[&str] = &[
        "apple", "apricot", "banana", "blueberry", "cherry", "date", "fig", "grape",
    ];

    #[test]
    fn test_iterate_and_stats() {
        let dir = MemoryDirectory::new();
        flush(&dir, &[(0, WORDS), (2, &["x"])]);
        let reader = open(&dir, &FieldsMeta::default()).unwrap();
        assert_eq!(reader.size(), 2);
        assert!(reader.terms(1).is_none());

        let field = reader.terms(0).unwrap();
        assert_eq!(field.field(), 0);
        assert_eq!(field.size(), WORDS.len() as u64);
        assert_eq!(field.docs_count(), 16);
        assert_eq!(field.min(), b"apple");
        assert_eq!(field.max(), b"grape");

        let mut it = field.iterator().unwrap();
        let all = collect_terms(it.as_mut()).unwrap();
        let expected = WORDS.iter().map(|w| w.as_bytes().to_vec()).collect::<Vec<_>>();
        assert_eq!(all, expected);
        assert!(it.value().is_empty());
        assert!(!it.next().unwrap());
    }

    #[test]
    fn test_seek() {
        let dir = MemoryDirectory::new();
        flush(&dir, &[(0, WORDS)]);
        let reader = open(&dir, &FieldsMeta::default()).unwrap();
        let field = reader.terms(0).unwrap();
        let mut it = field.iterator().unwrap();

        assert_eq!(it.seek(b"cherry").unwrap(), SeekResult::Found);
        assert_eq!(it.value(), b"cherry");
        assert_eq!(it.meta().docs_count, 2);
        let docs = collect_postings(it.postings(Features::all()).unwrap().as_mut()).unwrap();
        assert_eq!(docs, vec![Posting::new(4), Posting::new(14)]);

        assert_eq!(it.seek(b"aardvark").unwrap(), SeekResult::NotFound);
        assert_eq!(it.value(), b"apple");
        assert_eq!(it.seek(b"c").unwrap(), SeekResult::NotFound);
        assert_eq!(it.value(), b"cherry");
        assert!(it.next().unwrap());
        assert_eq!(it.value(), b"date");
        assert!(it.seek_exact(b"grape").unwrap());
        assert!(!it.seek_exact(b"guava").unwrap());
        assert_eq!(it.seek(b"zebra").unwrap(), SeekResult::End);
        assert!(it.postings(Features::empty()).err().unwrap().is_contract_violation());
    }

    #[test]
    fn test_writer_contract() {
        let dir = MemoryDirectory::new();
        let state = FlushState::new(&dir, "_1", 100);
        let mut writer = FieldWriterV1::new(Box::new(PostingsWriterV1::new(4)), 3);
        let e = writer.write(0, Features::empty(), &mut terms(&["a"])).unwrap_err();
        assert!(e.is_contract_violation());

        writer.prepare(&state).unwrap();
        writer.write(1, Features::empty(), &mut terms(&["a"])).unwrap();
        let e = writer.write(1, Features::empty(), &mut terms(&["b"])).unwrap_err();
        assert!(e.is_contract_violation());

        let mut unsorted = MemoryTermIterator::from_vec(vec![
            (b"b".to_vec(), vec![Posting::new(0)]),
            (b"a".to_vec(), vec![Posting::new(1)]),
        ]);
        let e = writer.write(5, Features::empty(), &mut unsorted).unwrap_err();
        assert!(e.is_contract_violation());
    }

    #[test]
    fn test_feature_mismatch_is_decode_error() {
        let dir = MemoryDirectory::new();
        flush(&dir, &[(0, WORDS)]);
        let fields = FieldsMeta::new(vec![FieldMeta::new(0, "body", Features::empty())]).unwrap();
        assert!(open(&dir, &fields).err().unwrap().is_decode_error());

        let fields = FieldsMeta::new(vec![FieldMeta::new(0, "body", Features::FREQUENCY)]).unwrap();
        assert!(open(&dir, &fields).is_ok());

        let fields = FieldsMeta::new(vec![FieldMeta::new(3, "tag", Features::empty())]).unwrap();
        assert!(open(&dir, &fields).err().unwrap().is_decode_error());
    }
}
