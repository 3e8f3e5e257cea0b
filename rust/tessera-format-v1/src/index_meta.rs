//! Index generations: `pending_segments_<N>` written by `prepare`, renamed to
//! `segments_<N>` by `commit`. Readers only look at `segments_<N>`, so a
//! candidate is invisible until the rename.

use std::sync::Arc;

use tessera_common::{Error, Result, verify_contract};
use tessera_directory::Directory;
use tessera_format::{
    CommitState, IndexMeta, IndexMetaReader, IndexMetaWriter,
    filename::{generation_file_name, parse_generation},
};
use tessera_io::utils::is_not_found;

use crate::{
    PENDING_SEGMENTS_PREFIX, SEGMENTS_PREFIX, artifact,
    persisted::{self, PersistedIndexMeta},
};

const ELEMENT: &str = "index meta";

pub struct IndexMetaWriterV1 {
    dir: Option<Arc<dyn Directory>>,
    pending: Option<String>,
    generation: u64,
    state: CommitState,
}

impl Default for IndexMetaWriterV1 {
    fn default() -> Self {
        IndexMetaWriterV1 {
            dir: None,
            pending: None,
            generation: 0,
            state: CommitState::Idle,
        }
    }
}

impl IndexMetaWriterV1 {
    pub fn new() -> IndexMetaWriterV1 {
        Default::default()
    }
}

/// A candidate must be newer than every committed generation, otherwise the
/// commit would never be picked up by `last_segments_file`.
fn verify_follows_committed(dir: &dyn Directory, generation: u64) -> Result<()> {
    let files = dir.list().map_err(|e| Error::io("list", e))?;
    match IndexMetaReaderV1::newest(&files) {
        Some((newest, name)) if generation <= newest => Err(Error::invalid_operation(format!(
            "generation {generation} does not follow committed {name}"
        ))),
        _ => Ok(()),
    }
}

fn write_pending(
    dir: &dyn Directory,
    pending: &str,
    meta: &IndexMeta,
    generation: u64,
) -> Result<()> {
    verify_follows_committed(dir, generation)?;
    // Leftover of an interrupted prepare.
    if artifact::exists(dir, pending)? {
        dir.remove(pending).map_err(|e| Error::io(pending, e))?;
    }
    let persisted = PersistedIndexMeta::new(generation, meta.counter(), meta.segments());
    let payload = persisted::encode(&persisted, ELEMENT)?;
    let out = artifact::create(dir, pending)?;
    artifact::seal_with_table(out, &payload)
}

fn remove_quietly(dir: &dyn Directory, name: &str) {
    if let Err(e) = dir.remove(name) {
        if !is_not_found(&e) {
            log::warn!("failed to remove {name}: {e}");
        }
    }
}

impl IndexMetaWriter for IndexMetaWriterV1 {
    fn filename(&self, meta: &IndexMeta) -> Option<String> {
        meta.generation()
            .map(|generation| generation_file_name(SEGMENTS_PREFIX, generation))
    }

    fn prepare(&mut self, dir: Arc<dyn Directory>, meta: &mut IndexMeta) -> Result<()> {
        verify_contract!(
            "index_meta_writer.prepare",
            self.state != CommitState::Prepared
        );
        let generation = meta.stage();
        let pending = generation_file_name(PENDING_SEGMENTS_PREFIX, generation);
        if let Err(e) = write_pending(dir.as_ref(), &pending, meta, generation) {
            remove_quietly(dir.as_ref(), &pending);
            meta.discard();
            return Err(e);
        }
        log::debug!("prepared index generation {generation} in {pending}");
        self.dir = Some(dir);
        self.pending = Some(pending);
        self.generation = generation;
        self.state = CommitState::Prepared;
        Ok(())
    }

    fn commit(&mut self, meta: &mut IndexMeta) -> Result<()> {
        const OPERATION: &str = "index_meta_writer.commit";
        verify_contract!(OPERATION, self.state == CommitState::Prepared);
        verify_contract!(OPERATION, meta.generation() == Some(self.generation));
        let (Some(dir), Some(pending)) = (self.dir.as_ref(), self.pending.as_ref()) else {
            return Err(Error::contract(OPERATION, "no prepared candidate"));
        };
        verify_follows_committed(dir.as_ref(), self.generation)?;
        let committed = generation_file_name(SEGMENTS_PREFIX, self.generation);
        if let Err(e) = dir.rename(pending, &committed) {
            // The rename may have landed before a later step (directory sync)
            // failed; a published generation must not be rolled back.
            let published = artifact::exists(dir.as_ref(), &committed)?
                && !artifact::exists(dir.as_ref(), pending)?;
            if !published {
                return Err(Error::io(committed.as_str(), e));
            }
            log::warn!("{committed} was published but the rename reported: {e}");
        }
        meta.complete();
        log::info!(
            "committed index generation {} with {} segments",
            self.generation,
            meta.segments().len()
        );
        self.dir = None;
        self.pending = None;
        self.state = CommitState::Committed;
        Ok(())
    }

    fn rollback(&mut self, meta: &mut IndexMeta) {
        if self.state != CommitState::Prepared {
            log::debug!("rollback in state {:?}, nothing to discard", self.state);
            return;
        }
        if let (Some(dir), Some(pending)) = (self.dir.take(), self.pending.take()) {
            remove_quietly(dir.as_ref(), &pending);
        }
        meta.discard();
        log::debug!("rolled back index generation {}", self.generation);
        self.state = CommitState::RolledBack;
    }

    fn state(&self) -> CommitState {
        self.state
    }
}

#[derive(Default)]
pub struct IndexMetaReaderV1;

impl IndexMetaReaderV1 {
    fn newest<'a>(files: &'a [String]) -> Option<(u64, &'a str)> {
        files
            .iter()
            .filter_map(|f| parse_generation(f, SEGMENTS_PREFIX).map(|g| (g, f.as_str())))
            .max_by_key(|&(generation, _)| generation)
    }
}

impl IndexMetaReader for IndexMetaReaderV1 {
    fn index_exists(&self, files: &[String]) -> bool {
        Self::newest(files).is_some()
    }

    fn last_segments_file<'a>(&self, files: &'a [String]) -> Option<&'a str> {
        Self::newest(files).map(|(_, name)| name)
    }

    fn read(
        &mut self,
        dir: &dyn Directory,
        meta: &mut IndexMeta,
        filename: Option<&str>,
    ) -> Result<()> {
        let name = match (filename, meta.generation()) {
            (Some(name), _) => name.to_string(),
            (None, Some(generation)) => generation_file_name(SEGMENTS_PREFIX, generation),
            (None, None) => {
                let files = dir.list().map_err(|e| Error::io("list", e))?;
                match self.last_segments_file(&files) {
                    Some(name) => name.to_string(),
                    None => {
                        return Err(Error::invalid_operation("no committed index generation"));
                    }
                }
            }
        };
        let expected = parse_generation(&name, SEGMENTS_PREFIX);
        let data = artifact::open(dir, &name, ELEMENT)?;
        let table = artifact::read_table(&data, ELEMENT)?;
        let persisted: PersistedIndexMeta = persisted::decode(table.peek_rest(), ELEMENT)?;
        if expected.is_some_and(|g| g != persisted.generation) {
            return Err(Error::invalid_format(
                ELEMENT,
                format!("{name} holds generation {}", persisted.generation),
            ));
        }
        let (generation, counter) = (persisted.generation, persisted.counter);
        let segments = persisted.into_segments(ELEMENT)?;
        meta.reset(generation, counter, segments);
        Ok(())
    }
}
