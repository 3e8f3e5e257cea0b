use std::sync::Arc;

use tessera_directory::{Directory, MemoryDirectory};
use tessera_format::{
    ColumnsMeta, DocumentMask, FieldsMeta, Format, FormatRegistry, ReaderState, SegmentMeta,
    read_document_mask, write_document_mask,
};
use tessera_format_v1::{FORMAT_NAME, FormatV1};

const DOCS: u32 = 200;

fn registry() -> FormatRegistry {
    let registry = FormatRegistry::new();
    tessera_format_v1::register(&registry);
    registry
}

fn deleted(rng: &mut fastrand::Rng) -> DocumentMask {
    (0..DOCS).filter(|_| rng.u8(..5) == 0).collect()
}

/// Writes stored fields for the even documents and one column holding the
/// document id of every third document.
fn write_segment(format: &dyn Format, dir: &dyn Directory, meta: &mut SegmentMeta) {
    let mut stored = format.stored_fields_writer();
    stored.prepare(dir, &meta.name).unwrap();
    for doc in 0..DOCS {
        if doc % 2 == 0 {
            assert!(stored.write(&format!("body{doc}")).unwrap());
            stored.end(Some(&format!("h{doc}"))).unwrap();
        } else {
            stored.end(None).unwrap();
        }
    }
    stored.finish().unwrap();

    let mut columns = format.columnstore_writer();
    columns.prepare(dir, &meta.name).unwrap();
    let (id, mut values) = columns.push_column().unwrap();
    for doc in (0..DOCS).step_by(3) {
        assert!(values.write(doc, &doc.to_le_bytes().to_vec()).unwrap());
    }
    columns.flush().unwrap();

    let mut column_meta = format.column_meta_writer();
    column_meta.prepare(dir, &meta.name).unwrap();
    column_meta.write("doc_id", id).unwrap();
    column_meta.flush().unwrap();

    meta.docs_count = DOCS;
    format.segment_meta_writer().write(dir, meta).unwrap();
}

#[test]
fn test_segment_through_registry() {
    let mut rng = fastrand::Rng::with_seed(0x5e6);
    let formats = registry();
    assert!(formats.get("nonexistent").is_none());
    let dir = MemoryDirectory::new();

    let mut written = SegmentMeta::new("_1", FORMAT_NAME);
    let format = formats.get(FORMAT_NAME).unwrap();
    write_segment(format.as_ref(), &dir, &mut written);

    // Readers resolve the codec from the descriptor.
    let mut meta = SegmentMeta::new("_1", "");
    FormatV1::new()
        .segment_meta_reader()
        .read(&dir, &mut meta, None)
        .unwrap();
    assert_eq!(meta, written);
    let format = formats.get(&meta.codec).unwrap();

    let mask = deleted(&mut rng);
    let mut writer = format.document_mask_writer();
    assert_eq!(writer.filename(&meta), "_1.0.doc_mask");
    write_document_mask(writer.as_mut(), &dir, &meta, &mask).unwrap();
    let read = read_document_mask(format.document_mask_reader().as_mut(), &dir, &meta).unwrap();
    assert_eq!(read, mask);

    let fields = FieldsMeta::default();
    let state = ReaderState {
        codec: format.as_ref(),
        dir: &dir,
        docs_mask: Some(&read),
        fields: &fields,
        meta: &meta,
    };

    let mut stored = format.stored_fields_reader();
    stored.prepare(&state).unwrap();
    assert_eq!(stored.docs_count(), DOCS);
    for doc in 0..DOCS + 5 {
        let mut seen = None;
        let visited = stored
            .visit(doc, &mut |header, body| {
                seen = Some((header.peek_rest().to_vec(), body.peek_rest().to_vec()));
                true
            })
            .unwrap();
        let expected = doc < DOCS && doc % 2 == 0 && !mask.contains(doc);
        assert_eq!(visited, expected, "doc {doc}");
        if expected {
            let (header, body) = seen.unwrap();
            assert_eq!(header, format!("h{doc}").into_bytes());
            assert_eq!(body, format!("body{doc}").into_bytes());
        }
    }

    let mut column_meta = format.column_meta_reader();
    assert!(column_meta.prepare(&dir, &meta.name).unwrap());
    let columns = ColumnsMeta::read_from(column_meta.as_mut()).unwrap();
    let column = columns.find("doc_id").unwrap().id;

    let mut store = format.columnstore_reader();
    assert!(store.prepare(&state).unwrap());
    let values = store.values(column);
    for doc in 0..DOCS {
        let value = values.get(doc).unwrap().map(|v| v.peek_rest().to_vec());
        let expected = (doc % 3 == 0 && !mask.contains(doc)).then(|| doc.to_le_bytes().to_vec());
        assert_eq!(value, expected, "doc {doc}");
    }
    let mut visited = Vec::new();
    assert!(
        store
            .visit(column, &mut |doc, _| {
                visited.push(doc);
                true
            })
            .unwrap()
    );
    let expected = (0..DOCS)
        .step_by(3)
        .filter(|doc| !mask.contains(*doc))
        .collect::<Vec<_>>();
    assert_eq!(visited, expected);
}

#[test]
fn test_segment_without_optional_artifacts() {
    let dir = MemoryDirectory::new();
    let format: Arc<dyn Format> = Arc::new(FormatV1::new());
    let meta = SegmentMeta::new("_9", FORMAT_NAME);

    let mask = read_document_mask(format.document_mask_reader().as_mut(), &dir, &meta).unwrap();
    assert!(mask.is_empty());
    assert!(!format.column_meta_reader().prepare(&dir, "_9").unwrap());

    let fields = FieldsMeta::default();
    let state = ReaderState {
        codec: format.as_ref(),
        dir: &dir,
        docs_mask: None,
        fields: &fields,
        meta: &meta,
    };
    let mut store = format.columnstore_reader();
    assert!(!store.prepare(&state).unwrap());
    assert!(format.stored_fields_reader().prepare(&state).is_err());
}

#[test]
fn test_mask_rewrite_bumps_version() {
    let dir = MemoryDirectory::new();
    let format = FormatV1::new();
    let mut meta = SegmentMeta::new("_2", FORMAT_NAME);
    meta.docs_count = 10;

    let first: DocumentMask = [1, 4].into_iter().collect();
    write_document_mask(format.document_mask_writer().as_mut(), &dir, &meta, &first).unwrap();

    meta.version += 1;
    let second: DocumentMask = [1, 4, 9].into_iter().collect();
    let mut writer = format.document_mask_writer();
    assert_eq!(writer.filename(&meta), "_2.1.doc_mask");
    write_document_mask(writer.as_mut(), &dir, &meta, &second).unwrap();

    let read = read_document_mask(format.document_mask_reader().as_mut(), &dir, &meta).unwrap();
    assert_eq!(read, second);
    meta.version = 0;
    let read = read_document_mask(format.document_mask_reader().as_mut(), &dir, &meta).unwrap();
    assert_eq!(read, first);
}
