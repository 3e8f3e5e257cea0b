use tessera_common::{Result, verify_arg};
use tessera_directory::Directory;
use tessera_format::{
    SegmentMeta, SegmentMetaReader, SegmentMetaWriter, filename::versioned_file_name,
};

use crate::{
    SEGMENT_META_EXT, artifact,
    persisted::{self, PersistedSegmentMeta},
};

const ELEMENT: &str = "segment meta";

fn segment_file_name(meta: &SegmentMeta) -> String {
    versioned_file_name(&meta.name, meta.version, SEGMENT_META_EXT)
}

/// Writes `<segment>.<version>.sm`; the descriptor lists itself among the
/// segment's files.
#[derive(Default)]
pub struct SegmentMetaWriterV1;

impl SegmentMetaWriter for SegmentMetaWriterV1 {
    fn filename(&self, meta: &SegmentMeta) -> String {
        segment_file_name(meta)
    }

    fn write(&mut self, dir: &dyn Directory, meta: &mut SegmentMeta) -> Result<()> {
        verify_arg!(meta, !meta.name.is_empty() && !meta.codec.is_empty());
        let name = segment_file_name(meta);
        meta.add_file(name.clone());
        let payload = persisted::encode(&PersistedSegmentMeta::from(&*meta), ELEMENT)?;
        let out = artifact::create(dir, &name)?;
        artifact::seal_with_table(out, &payload)?;
        log::debug!(
            "segment '{}' v{} described in {name} ({} docs)",
            meta.name,
            meta.version,
            meta.docs_count
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct SegmentMetaReaderV1;

impl SegmentMetaReader for SegmentMetaReaderV1 {
    /// Reads `filename`, or the descriptor derived from the name and version
    /// already set in `meta`.
    fn read(
        &mut self,
        dir: &dyn Directory,
        meta: &mut SegmentMeta,
        filename: Option<&str>,
    ) -> Result<()> {
        let name = match filename {
            Some(name) => name.to_string(),
            None => segment_file_name(meta),
        };
        let data = artifact::open(dir, &name, ELEMENT)?;
        let table = artifact::read_table(&data, ELEMENT)?;
        let persisted: PersistedSegmentMeta = persisted::decode(table.peek_rest(), ELEMENT)?;
        *meta = persisted.into_meta(ELEMENT)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tessera_directory::MemoryDirectory;
    use tessera_format::Features;

    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = MemoryDirectory::new();
        let mut meta = SegmentMeta::new("_5", "1_0");
        meta.version = 1;
        meta.docs_count = 12;
        meta.features = Features::FREQUENCY | Features::POSITION;
        meta.add_file("_5.tm");

        let mut writer = SegmentMetaWriterV1;
        assert_eq!(writer.filename(&meta), "_5.1.sm");
        writer.write(&dir, &mut meta).unwrap();
        assert!(meta.files.contains("_5.1.sm"));

        let mut read = SegmentMeta::new("_5", "");
        read.version = 1;
        SegmentMetaReaderV1.read(&dir, &mut read, None).unwrap();
        assert_eq!(read, meta);

        let mut by_name = SegmentMeta::default();
        SegmentMetaReaderV1
            .read(&dir, &mut by_name, Some("_5.1.sm"))
            .unwrap();
        assert_eq!(by_name, meta);
    }

    #[test]
    fn test_missing_and_invalid() {
        let dir = MemoryDirectory::new();
        let mut meta = SegmentMeta::default();
        assert!(SegmentMetaWriterV1.write(&dir, &mut meta).is_err());
        assert!(
            SegmentMetaReaderV1
                .read(&dir, &mut meta, Some("_1.0.sm"))
                .is_err()
        );
    }
}
