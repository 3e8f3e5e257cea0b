//! Field metadata (`.fm`): `vint(count)` then `vint(id) str(name) u32(features)`
//! per field, all in the table.

use bytes::Bytes;
use tessera_common::{Error, Result, verify_contract, verify_data};
use tessera_directory::Directory;
use tessera_format::{
    Features, FieldId, FieldMeta, FieldMetaReader, FieldMetaWriter, FlushState,
    field_limits, filename::file_name,
};
use tessera_io::{DataInput, DataOutput, StreamOutput};

use crate::{FIELD_META_EXT, artifact};

const ELEMENT: &str = "field meta";

#[derive(Default)]
pub struct FieldMetaWriterV1 {
    out: Option<StreamOutput>,
    entries: Vec<u8>,
    count: usize,
    expected: usize,
}

impl FieldMetaWriterV1 {
    pub fn new() -> FieldMetaWriterV1 {
        Default::default()
    }
}

impl FieldMetaWriter for FieldMetaWriterV1 {
    fn prepare(&mut self, state: &FlushState) -> Result<()> {
        verify_contract!("field_meta_writer.prepare", self.out.is_none());
        self.out = Some(artifact::create(
            state.dir,
            &file_name(state.name, FIELD_META_EXT),
        )?);
        self.entries.clear();
        self.count = 0;
        self.expected = state.fields_count;
        Ok(())
    }

    fn write(&mut self, id: FieldId, name: &str, features: Features) -> Result<()> {
        const OPERATION: &str = "field_meta_writer.write";
        verify_contract!(OPERATION, self.out.is_some());
        let next = field_limits::MIN + self.count as FieldId;
        if id != next {
            return Err(Error::contract(
                OPERATION,
                format!("field '{name}' has id {id}, expected {next}"),
            ));
        }
        features.validate()?;
        self.entries.write_vint(id as u64)?;
        self.entries.write_str(name)?;
        self.entries.write_u32(features.bits())?;
        self.count += 1;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        const OPERATION: &str = "field_meta_writer.end";
        let out = self
            .out
            .take()
            .ok_or_else(|| Error::contract(OPERATION, "writer is not prepared"))?;
        if self.expected != 0 && self.count != self.expected {
            return Err(Error::contract(
                OPERATION,
                format!("{} fields written, {} declared", self.count, self.expected),
            ));
        }
        let mut table = Vec::with_capacity(self.entries.len() + 4);
        table.write_vint(self.count as u64)?;
        table.write_slice(&self.entries)?;
        artifact::seal_with_table(out, &table)?;
        self.entries.clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct FieldMetaReaderV1 {
    table: Option<DataInput>,
    left: usize,
    next_id: FieldId,
}

impl FieldMetaReaderV1 {
    pub fn new() -> FieldMetaReaderV1 {
        Default::default()
    }
}

impl FieldMetaReader for FieldMetaReaderV1 {
    fn prepare(&mut self, dir: &dyn Directory, segment: &str) -> Result<()> {
        let data: Bytes = artifact::open(dir, &file_name(segment, FIELD_META_EXT), ELEMENT)?;
        self.table = Some(artifact::read_table(&data, ELEMENT)?);
        self.left = 0;
        Ok(())
    }

    fn begin(&mut self) -> Result<usize> {
        let table = self
            .table
            .as_mut()
            .ok_or_else(|| Error::contract("field_meta_reader.begin", "reader is not prepared"))?;
        table.seek(0)?;
        let count = table.read_vint()? as usize;
        verify_data!(count, count <= table.remaining());
        self.left = count;
        self.next_id = field_limits::MIN;
        Ok(count)
    }

    fn read(&mut self, field: &mut FieldMeta) -> Result<()> {
        const OPERATION: &str = "field_meta_reader.read";
        let table = self
            .table
            .as_mut()
            .ok_or_else(|| Error::contract(OPERATION, "reader is not prepared"))?;
        verify_contract!(OPERATION, self.left > 0);
        let id = table.read_vint_u32()?;
        verify_data!(field_id, id == self.next_id);
        field.id = id;
        field.name = table.read_str()?;
        field.features = Features::from_persisted(table.read_u32()?, ELEMENT)?;
        self.left -= 1;
        self.next_id += 1;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.table = None;
        self.left = 0;
        Ok(())
    }
}
