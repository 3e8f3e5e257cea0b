use std::{collections::BTreeMap, sync::Arc};

use tessera::{
    default_format,
    directory::{Directory, FsDirectory, MemoryDirectory},
    format::{
        DocumentMask, Features, FieldsMeta, FlushState, Format, IndexMeta, IndexSegment,
        MemoryTermIterator, Posting, PostingAttributes, ReaderState, SeekResult, SegmentMeta,
        collect_postings, read_document_mask, write_document_mask,
    },
    segment_format,
};

const BODY: u32 = 0;
const TAGS: u32 = 1;

/// In-memory documents of one segment: (body tokens, tag).
struct Docs(Vec<(Vec<&'static str>, &'static str)>);

impl Docs {
    fn random(rng: &mut fastrand::Rng, count: usize) -> Docs {
        const WORDS: [&str; 8] = [
            "amber", "bolt", "cedar", "dune", "ember", "fjord", "glade", "heron",
        ];
        const LABELS: [&str; 3] = ["red", "green", "blue"];
        Docs(
            (0..count)
                .map(|_| {
                    let body = (0..rng.usize(1..6))
                        .map(|_| WORDS[rng.usize(..WORDS.len())])
                        .collect();
                    (body, LABELS[rng.usize(..LABELS.len())])
                })
                .collect(),
        )
    }

    /// Term postings of the body field, with positions.
    fn body_terms(&self) -> BTreeMap<Vec<u8>, Vec<Posting>> {
        let mut terms: BTreeMap<Vec<u8>, Vec<Posting>> = BTreeMap::new();
        for (doc, (body, _)) in self.0.iter().enumerate() {
            let mut positions: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
            for (pos, word) in body.iter().enumerate() {
                positions.entry(word).or_default().push(pos as u32);
            }
            for (word, pos) in positions {
                let attributes = PostingAttributes::with_positions(
                    pos.into_iter().map(tessera::format::Position::new).collect(),
                );
                terms
                    .entry(word.as_bytes().to_vec())
                    .or_default()
                    .push(Posting::with_attributes(doc as u32, attributes));
            }
        }
        terms
    }

    fn tag_terms(&self) -> BTreeMap<Vec<u8>, Vec<Posting>> {
        let mut terms: BTreeMap<Vec<u8>, Vec<Posting>> = BTreeMap::new();
        for (doc, (_, tag)) in self.0.iter().enumerate() {
            terms
                .entry(tag.as_bytes().to_vec())
                .or_default()
                .push(Posting::new(doc as u32));
        }
        terms
    }
}

fn flush_segment(
    format: &dyn Format,
    dir: &dyn Directory,
    name: &str,
    docs: &Docs,
) -> SegmentMeta {
    let body_features = Features::FREQUENCY | Features::POSITION;
    let docs_count = docs.0.len() as u32;
    let state = FlushState::new(dir, name, docs_count)
        .with_features(body_features)
        .with_fields_count(2);

    let mut field_meta = format.field_meta_writer();
    field_meta.prepare(&state).unwrap();
    field_meta.write(BODY, "body", body_features).unwrap();
    field_meta.write(TAGS, "tag", Features::empty()).unwrap();
    field_meta.end().unwrap();

    let mut fields = format.field_writer();
    fields.prepare(&state).unwrap();
    fields
        .write(BODY, body_features, &mut MemoryTermIterator::new(docs.body_terms()))
        .unwrap();
    fields
        .write(TAGS, Features::empty(), &mut MemoryTermIterator::new(docs.tag_terms()))
        .unwrap();
    fields.end().unwrap();

    let mut stored = format.stored_fields_writer();
    stored.prepare(dir, name).unwrap();
    for (body, tag) in &docs.0 {
        stored.write(&body.join(" ")).unwrap();
        stored.end(Some(tag)).unwrap();
    }
    stored.finish().unwrap();

    let mut meta = SegmentMeta::new(name, format.type_name());
    meta.docs_count = docs_count;
    meta.features = body_features;
    for ext in ["fm", "tm", "doc", "sf"] {
        meta.add_file(format!("{name}.{ext}"));
    }
    format.segment_meta_writer().write(dir, &mut meta).unwrap();
    meta
}

fn commit(format: &dyn Format, dir: &Arc<dyn Directory>, index: &mut IndexMeta) {
    let mut writer = format.index_meta_writer();
    writer.prepare(dir.clone(), index).unwrap();
    writer.commit(index).unwrap();
}

fn index_segment(format: &dyn Format, meta: SegmentMeta) -> IndexSegment {
    IndexSegment::new(format.segment_meta_writer().filename(&meta), meta)
}

/// Docs of `field`/`term` that are not deleted, read back through the codec
/// named by the segment.
fn search(dir: &dyn Directory, meta: &SegmentMeta, field: u32, term: &str) -> Vec<u32> {
    let format = segment_format(meta).unwrap();
    let mask = read_document_mask(format.document_mask_reader().as_mut(), dir, meta).unwrap();

    let mut field_meta = format.field_meta_reader();
    field_meta.prepare(dir, &meta.name).unwrap();
    let fields = FieldsMeta::read_from(field_meta.as_mut()).unwrap();
    let mut reader = format.field_reader();
    reader
        .prepare(&ReaderState {
            codec: format.as_ref(),
            dir,
            docs_mask: Some(&mask),
            fields: &fields,
            meta,
        })
        .unwrap();

    let Some(terms) = reader.terms(field) else {
        return Vec::new();
    };
    let mut it = terms.iterator().unwrap();
    if it.seek(term.as_bytes()).unwrap() != SeekResult::Found {
        return Vec::new();
    }
    let mut docs = it.postings(Features::empty()).unwrap();
    collect_postings(docs.as_mut())
        .unwrap()
        .into_iter()
        .map(|p| p.doc)
        .filter(|doc| !mask.contains(*doc))
        .collect()
}

fn expected(
    docs: &Docs,
    deleted: &DocumentMask,
    matches: impl Fn(&(Vec<&str>, &str)) -> bool,
) -> Vec<u32> {
    docs.0
        .iter()
        .enumerate()
        .filter(|(doc, d)| matches(d) && !deleted.contains(*doc as u32))
        .map(|(doc, _)| doc as u32)
        .collect()
}

fn run_index_lifecycle(dir: Arc<dyn Directory>, reopen: impl Fn() -> Arc<dyn Directory>) {
    let mut rng = fastrand::Rng::with_seed(0x1de7);
    let format = default_format();
    let mut index = IndexMeta::new();

    let batches = [Docs::random(&mut rng, 40), Docs::random(&mut rng, 75)];
    for docs in &batches {
        let name = index.next_segment_name();
        let meta = flush_segment(format.as_ref(), dir.as_ref(), &name, docs);
        index.add(index_segment(format.as_ref(), meta));
    }
    commit(format.as_ref(), &dir, &mut index);

    // Delete every document tagged "red" in the second segment.
    let mut meta = index.segments()[1].meta.clone();
    let deleted: DocumentMask =
        expected(&batches[1], &DocumentMask::new(), |(_, tag)| *tag == "red")
            .into_iter()
            .collect();
    meta.version += 1;
    let mut mask_writer = format.document_mask_writer();
    meta.add_file(mask_writer.filename(&meta));
    write_document_mask(mask_writer.as_mut(), dir.as_ref(), &meta, &deleted).unwrap();
    format.segment_meta_writer().write(dir.as_ref(), &mut meta).unwrap();
    index.retain_segments(|s| s.meta.name != meta.name);
    index.add(index_segment(format.as_ref(), meta));
    commit(format.as_ref(), &dir, &mut index);
    assert_eq!(index.generation(), Some(2));

    let dir = reopen();
    let mut read = IndexMeta::new();
    format
        .index_meta_reader()
        .read(dir.as_ref(), &mut read, None)
        .unwrap();
    assert_eq!(read.generation(), Some(2));
    assert_eq!(read.docs_count(), 115);

    for (segment, docs) in read.segments().iter().zip(&batches) {
        let mut meta = SegmentMeta::new(segment.meta.name.clone(), "");
        format
            .segment_meta_reader()
            .read(dir.as_ref(), &mut meta, Some(&segment.filename))
            .unwrap();
        assert_eq!(meta, segment.meta);
        for file in &meta.files {
            assert!(dir.exists(file).unwrap(), "{file}");
        }

        let mut mask_reader = format.document_mask_reader();
        let deleted = read_document_mask(mask_reader.as_mut(), dir.as_ref(), &meta).unwrap();
        for word in ["amber", "dune", "heron", "zebra"] {
            assert_eq!(
                search(dir.as_ref(), &meta, BODY, word),
                expected(docs, &deleted, |(body, _)| body.contains(&word)),
                "{} body:{word}",
                meta.name
            );
        }
        for tag in ["red", "green", "blue"] {
            assert_eq!(
                search(dir.as_ref(), &meta, TAGS, tag),
                expected(docs, &deleted, |(_, t)| *t == tag),
                "{} tag:{tag}",
                meta.name
            );
        }
    }
    assert!(search(dir.as_ref(), &read.segments()[1].meta, TAGS, "red").is_empty());
}

#[test]
fn test_index_lifecycle_in_memory() {
    let dir: Arc<dyn Directory> = Arc::new(MemoryDirectory::new());
    let reopened = dir.clone();
    run_index_lifecycle(dir, move || reopened.clone());
}

#[test]
fn test_index_lifecycle_on_filesystem() {
    let temp = tempfile::tempdir().unwrap();
    let dir: Arc<dyn Directory> = Arc::new(FsDirectory::new(temp.path()).unwrap());
    let path = temp.path().to_path_buf();
    run_index_lifecycle(dir, move || Arc::new(FsDirectory::new(&path).unwrap()));
}

#[test]
fn test_stored_documents_survive_reopen() {
    let temp = tempfile::tempdir().unwrap();
    let mut rng = fastrand::Rng::with_seed(99);
    let docs = Docs::random(&mut rng, 30);
    let format = default_format();
    let meta = {
        let dir = FsDirectory::new(temp.path()).unwrap();
        flush_segment(format.as_ref(), &dir, "_1", &docs)
    };

    let dir = FsDirectory::new(temp.path()).unwrap();
    let fields = FieldsMeta::default();
    let mut stored = format.stored_fields_reader();
    stored
        .prepare(&ReaderState {
            codec: format.as_ref(),
            dir: &dir,
            docs_mask: None,
            fields: &fields,
            meta: &meta,
        })
        .unwrap();
    for (doc, (body, tag)) in docs.0.iter().enumerate() {
        let mut read = None;
        assert!(
            stored
                .visit(doc as u32, &mut |header, text| {
                    read = Some((
                        bytes::Bytes::copy_from_slice(header.peek_rest()),
                        bytes::Bytes::copy_from_slice(text.peek_rest()),
                    ));
                    true
                })
                .unwrap()
        );
        let (header, text) = read.unwrap();
        assert_eq!(header.as_ref(), tag.as_bytes());
        assert_eq!(text.as_ref(), body.join(" ").as_bytes());
    }
    assert!(!stored.visit(docs.0.len() as u32, &mut |_, _| true).unwrap());
}
