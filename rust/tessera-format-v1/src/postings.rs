//! Postings stream (`.doc`).
//!
//! ```text
//! [header][u32 block size]
//! per term:
//!   doc entries  vint(doc delta) [vint(freq) [per position: vint(pos delta)
//!                [vint(start) vint(len)] [vint(payload len) payload]]]
//!   skip table   vint(blocks) per block: vint(last doc delta) vint(byte len)
//!                (only when the term spans more than one block)
//! [footer]
//! ```
//!
//! The first doc of a term is stored as is; all following deltas are
//! relative to the previous doc and never zero.

use std::sync::Arc;

use bytes::Bytes;
use tessera_common::{Error, Result, verify_contract, verify_data};
use tessera_format::{
    DocId, DocIterator, Features, FlushState, Position, Posting, PostingAttributes,
    PostingsReader, PostingsWriter, ReaderState, TermMeta, doc_limits,
};
use tessera_io::{
    DataInput, DataOutput, ReadAt, SealingWrite, StreamOutput,
    framing::{self, FOOTER_SIZE, HEADER_SIZE},
    read_all,
};

const ELEMENT: &str = "postings";

/// Offset of the first term's postings.
const DATA_START: u64 = HEADER_SIZE as u64 + 4;

pub struct PostingsWriterV1 {
    block_size: u32,
    out: Option<StreamOutput>,
    docs_limit: u32,
    segment_features: Features,
    features: Option<Features>,
    /// Base for delta-encoding term pointers.
    last: TermMeta,
    skip: Vec<(DocId, u64)>,
}

impl PostingsWriterV1 {
    pub fn new(block_size: u32) -> PostingsWriterV1 {
        PostingsWriterV1 {
            block_size,
            out: None,
            docs_limit: 0,
            segment_features: Features::empty(),
            features: None,
            last: TermMeta::default(),
            skip: Vec::new(),
        }
    }

    fn field_features(&self, operation: &str) -> Result<Features> {
        self.features
            .ok_or_else(|| Error::contract(operation, "no field in progress, call begin_field"))
    }
}

impl PostingsWriter for PostingsWriterV1 {
    fn prepare(&mut self, out: Box<dyn SealingWrite>, state: &FlushState) -> Result<()> {
        verify_contract!("postings_writer.prepare", self.out.is_none());
        let mut out = StreamOutput::new(out);
        framing::write_header(&mut out)?;
        out.write_u32(self.block_size)?;
        self.out = Some(out);
        self.docs_limit = state.docs_count;
        self.segment_features = state.features;
        self.features = None;
        Ok(())
    }

    fn begin_field(&mut self, features: Features) -> Result<()> {
        verify_contract!("postings_writer.begin_field", self.out.is_some());
        verify_contract!("postings_writer.begin_field", self.features.is_none());
        features.validate()?;
        if !self.segment_features.contains(features) {
            return Err(Error::contract(
                "postings_writer.begin_field",
                format!("field features {features:?} exceed the segment features"),
            ));
        }
        self.features = Some(features);
        self.last = TermMeta::default();
        Ok(())
    }

    fn begin_block(&mut self) -> Result<()> {
        self.field_features("postings_writer.begin_block")?;
        self.last = TermMeta::default();
        Ok(())
    }

    fn write(
        &mut self,
        postings: &mut dyn Iterator<Item = Posting>,
        meta: &mut TermMeta,
    ) -> Result<()> {
        const OPERATION: &str = "postings_writer.write";
        let features = self.field_features(OPERATION)?;
        let block_size = self.block_size;
        let docs_limit = self.docs_limit;
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| Error::contract(OPERATION, "writer is not prepared"))?;

        *meta = TermMeta {
            doc_start: out.position(),
            ..Default::default()
        };
        self.skip.clear();

        let mut prev: Option<DocId> = None;
        let mut block_start = out.position();
        let mut in_block = 0;
        for posting in postings {
            let doc = posting.doc;
            if let Some(prev) = prev {
                if doc <= prev {
                    return Err(Error::contract(
                        OPERATION,
                        format!("doc {doc} follows doc {prev}, ids must strictly increase"),
                    ));
                }
            }
            if doc == doc_limits::EOF || doc >= docs_limit {
                return Err(Error::contract(
                    OPERATION,
                    format!("doc {doc} is outside the segment of {docs_limit} docs"),
                ));
            }
            out.write_vint((doc - prev.unwrap_or(0)) as u64)?;
            meta.total_freq += write_attributes(out, features, &posting.attributes)? as u64;
            meta.docs_count += 1;
            prev = Some(doc);

            in_block += 1;
            if in_block == block_size {
                self.skip.push((doc, out.position() - block_start));
                block_start = out.position();
                in_block = 0;
            }
        }
        if let (Some(last), true) = (prev, in_block > 0) {
            self.skip.push((last, out.position() - block_start));
        }

        meta.skip_start = out.position();
        if self.skip.len() > 1 {
            out.write_vint(self.skip.len() as u64)?;
            let mut prev_last = 0;
            for &(last_doc, len) in &self.skip {
                out.write_vint((last_doc - prev_last) as u64)?;
                out.write_vint(len)?;
                prev_last = last_doc;
            }
        }
        if !features.contains(Features::FREQUENCY) {
            meta.total_freq = 0;
        }
        Ok(())
    }

    fn encode(&mut self, out: &mut dyn DataOutput, meta: &TermMeta) -> Result<()> {
        const OPERATION: &str = "postings_writer.encode";
        let features = self.field_features(OPERATION)?;
        verify_contract!(OPERATION, meta.doc_start >= self.last.doc_start);
        verify_contract!(OPERATION, meta.skip_start >= meta.doc_start);
        out.write_vint(meta.docs_count as u64)?;
        if features.contains(Features::FREQUENCY) {
            out.write_vint(meta.total_freq)?;
        }
        out.write_vint(meta.doc_start - self.last.doc_start)?;
        out.write_vint(meta.skip_start - meta.doc_start)?;
        self.last = *meta;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.field_features("postings_writer.end")?;
        self.features = None;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        verify_contract!("postings_writer.finish", self.features.is_none());
        let mut out = self
            .out
            .take()
            .ok_or_else(|| Error::contract("postings_writer.finish", "writer is not prepared"))?;
        framing::write_footer(&mut out)?;
        out.seal()?;
        Ok(())
    }
}

/// Writes the non-document attributes of one posting; returns its frequency.
fn write_attributes(
    out: &mut dyn DataOutput,
    features: Features,
    attributes: &PostingAttributes,
) -> Result<u32> {
    const OPERATION: &str = "postings_writer.write";
    if !features.contains(Features::FREQUENCY) {
        return Ok(0);
    }
    let freq = attributes.freq;
    verify_contract!(OPERATION, freq > 0);
    out.write_vint(freq as u64)?;
    if !features.contains(Features::POSITION) {
        return Ok(freq);
    }
    if attributes.positions.len() != freq as usize {
        return Err(Error::contract(
            OPERATION,
            format!(
                "frequency {freq} disagrees with {} positions",
                attributes.positions.len()
            ),
        ));
    }
    let mut prev_pos = 0;
    for position in &attributes.positions {
        verify_contract!(OPERATION, position.pos >= prev_pos);
        out.write_vint((position.pos - prev_pos) as u64)?;
        prev_pos = position.pos;
        if features.contains(Features::OFFSET) {
            let (start, end) = position
                .offset
                .ok_or_else(|| Error::contract(OPERATION, "field stores offsets, none given"))?;
            verify_contract!(OPERATION, end >= start);
            out.write_vint(start as u64)?;
            out.write_vint((end - start) as u64)?;
        }
        if features.contains(Features::PAYLOAD) {
            out.write_bytes(position.payload.as_deref().unwrap_or_default())?;
        }
    }
    Ok(freq)
}

#[derive(Default)]
pub struct PostingsReaderV1 {
    data: Bytes,
    block_size: u32,
}

impl PostingsReaderV1 {
    pub fn new() -> PostingsReaderV1 {
        Default::default()
    }

    fn skip_table(&self, meta: &TermMeta) -> Result<Vec<SkipEntry>> {
        let blocks = meta.docs_count.div_ceil(self.block_size);
        if blocks <= 1 {
            return Ok(Vec::new());
        }
        let tail = self.data.len() - FOOTER_SIZE;
        let start = meta.skip_start as usize;
        let mut input = DataInput::new(self.data.slice(start..tail), ELEMENT);
        let count = input.read_vint()?;
        verify_data!(skip_table, count == blocks as u64);

        let mut entries = Vec::with_capacity(blocks as usize);
        let mut last_doc = 0u32;
        let mut end = 0usize;
        for i in 0..blocks {
            let delta = input.read_vint_u32()?;
            verify_data!(skip_table, i == 0 || delta > 0);
            last_doc = last_doc
                .checked_add(delta)
                .ok_or_else(|| Error::invalid_format(ELEMENT, "skip table doc overflow"))?;
            end += input.read_vint()? as usize;
            entries.push(SkipEntry { last_doc, end });
        }
        let docs_len = (meta.skip_start - meta.doc_start) as usize;
        verify_data!(skip_table, end == docs_len);
        Ok(entries)
    }
}

impl PostingsReader for PostingsReaderV1 {
    fn prepare(&mut self, input: Arc<dyn ReadAt>, _state: &ReaderState) -> Result<()> {
        let data = read_all(input.as_ref()).map_err(|e| Error::io(ELEMENT, e))?;
        framing::unwrap_artifact(&data, ELEMENT)?;
        verify_data!(postings, data.len() as u64 >= DATA_START + FOOTER_SIZE as u64);
        let block_size = DataInput::new(data.slice(HEADER_SIZE..), ELEMENT).read_u32()?;
        verify_data!(block_size, block_size >= 2);
        self.data = data;
        self.block_size = block_size;
        Ok(())
    }

    fn decode(&self, input: &mut DataInput, features: Features, meta: &mut TermMeta) -> Result<()> {
        let docs_count = input.read_vint_u32()?;
        let total_freq = if features.contains(Features::FREQUENCY) {
            input.read_vint()?
        } else {
            0
        };
        let doc_start = meta
            .doc_start
            .checked_add(input.read_vint()?)
            .ok_or_else(|| Error::invalid_format(ELEMENT, "term pointer overflow"))?;
        let skip_start = doc_start
            .checked_add(input.read_vint()?)
            .ok_or_else(|| Error::invalid_format(ELEMENT, "term pointer overflow"))?;
        *meta = TermMeta {
            docs_count,
            total_freq,
            doc_start,
            skip_start,
        };
        Ok(())
    }

    fn iterator(
        &self,
        field_features: Features,
        meta: &TermMeta,
        requested: Features,
    ) -> Result<Box<dyn DocIterator>> {
        if self.data.is_empty() {
            return Err(Error::contract(
                "postings_reader.iterator",
                "reader is not prepared",
            ));
        }
        let tail = (self.data.len() - FOOTER_SIZE) as u64;
        if meta.doc_start < DATA_START || meta.skip_start < meta.doc_start || meta.skip_start > tail
        {
            return Err(Error::invalid_format(
                ELEMENT,
                format!(
                    "term postings {}..{} outside the stream",
                    meta.doc_start, meta.skip_start
                ),
            ));
        }
        let docs = DataInput::new(
            self.data
                .slice(meta.doc_start as usize..meta.skip_start as usize),
            ELEMENT,
        );
        Ok(Box::new(PostingsIteratorV1 {
            docs,
            field_features,
            features: exposed_features(field_features, requested),
            block_size: self.block_size,
            docs_count: meta.docs_count,
            read: 0,
            doc: doc_limits::EOF,
            prev: 0,
            attributes: PostingAttributes::default(),
            skip: self.skip_table(meta)?,
        }))
    }
}

/// Features visible through an iterator: the requested subset of the
/// field's features, closed under the feature dependencies.
fn exposed_features(field: Features, requested: Features) -> Features {
    let mut features = field & requested;
    if !features.contains(Features::FREQUENCY) {
        features.remove(Features::POSITION);
    }
    if !features.contains(Features::POSITION) {
        features.remove(Features::OFFSET | Features::PAYLOAD);
    }
    features
}

struct SkipEntry {
    last_doc: DocId,
    /// End of the block, relative to the term's first doc entry.
    end: usize,
}

struct PostingsIteratorV1 {
    docs: DataInput,
    field_features: Features,
    features: Features,
    block_size: u32,
    docs_count: u32,
    read: u32,
    doc: DocId,
    prev: DocId,
    attributes: PostingAttributes,
    skip: Vec<SkipEntry>,
}

impl PostingsIteratorV1 {
    fn exhaust(&mut self) -> Option<DocId> {
        self.read = self.docs_count;
        self.doc = doc_limits::EOF;
        self.attributes.clear();
        None
    }

    fn read_attributes(&mut self) -> Result<()> {
        self.attributes.clear();
        if !self.field_features.contains(Features::FREQUENCY) {
            return Ok(());
        }
        let freq = self.docs.read_vint_u32()?;
        verify_data!(freq, freq > 0);
        if self.features.contains(Features::FREQUENCY) {
            self.attributes.freq = freq;
        }
        if !self.field_features.contains(Features::POSITION) {
            return Ok(());
        }
        let mut pos = 0u32;
        for _ in 0..freq {
            pos = pos
                .checked_add(self.docs.read_vint_u32()?)
                .ok_or_else(|| Error::invalid_format(ELEMENT, "position overflow"))?;
            let offset = if self.field_features.contains(Features::OFFSET) {
                let start = self.docs.read_vint_u32()?;
                let end = start
                    .checked_add(self.docs.read_vint_u32()?)
                    .ok_or_else(|| Error::invalid_format(ELEMENT, "offset overflow"))?;
                Some((start, end))
            } else {
                None
            };
            let payload = if self.field_features.contains(Features::PAYLOAD) {
                Some(self.docs.read_bytes()?).filter(|p| !p.is_empty())
            } else {
                None
            };
            if self.features.contains(Features::POSITION) {
                self.attributes.positions.push(Position {
                    pos,
                    offset: offset.filter(|_| self.features.contains(Features::OFFSET)),
                    payload: payload.filter(|_| self.features.contains(Features::PAYLOAD)),
                });
            }
        }
        Ok(())
    }
}

impl DocIterator for PostingsIteratorV1 {
    fn doc(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<Option<DocId>> {
        if self.read >= self.docs_count {
            return Ok(self.exhaust());
        }
        let delta = self.docs.read_vint_u32()?;
        let doc = if self.read == 0 {
            delta
        } else {
            verify_data!(doc_delta, delta > 0);
            self.prev
                .checked_add(delta)
                .ok_or_else(|| Error::invalid_format(ELEMENT, "doc id overflow"))?
        };
        verify_data!(doc, doc != doc_limits::EOF);
        self.read_attributes()?;
        self.read += 1;
        self.prev = doc;
        self.doc = doc;
        Ok(Some(doc))
    }

    fn seek(&mut self, target: DocId) -> Result<Option<DocId>> {
        if self.doc != doc_limits::EOF && self.doc >= target {
            return Ok(Some(self.doc));
        }
        if self.read >= self.docs_count {
            return Ok(self.exhaust());
        }
        if !self.skip.is_empty() {
            let block = self.skip.partition_point(|e| e.last_doc < target);
            if block == self.skip.len() {
                return Ok(self.exhaust());
            }
            if block > (self.read / self.block_size) as usize {
                let prev = &self.skip[block - 1];
                self.docs.seek(prev.end)?;
                self.prev = prev.last_doc;
                self.read = block as u32 * self.block_size;
            }
        }
        while let Some(doc) = self.next()? {
            if doc >= target {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    fn attributes(&self) -> &PostingAttributes {
        &self.attributes
    }

    fn cost(&self) -> u64 {
        self.docs_count as u64
    }
}
