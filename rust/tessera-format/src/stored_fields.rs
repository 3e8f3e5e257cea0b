use tessera_common::Result;
use tessera_directory::Directory;
use tessera_io::{DataInput, DataOutput};

use crate::{DocId, ReaderState};

/// Writes a value into a codec-owned output.
///
/// Returns `false` if nothing should be stored for this value.
pub trait Serializer {
    fn write(&self, out: &mut dyn DataOutput) -> Result<bool>;
}

impl Serializer for [u8] {
    fn write(&self, out: &mut dyn DataOutput) -> Result<bool> {
        out.write_slice(self)?;
        Ok(true)
    }
}

impl Serializer for str {
    fn write(&self, out: &mut dyn DataOutput) -> Result<bool> {
        self.as_bytes().write(out)
    }
}

impl Serializer for &[u8] {
    fn write(&self, out: &mut dyn DataOutput) -> Result<bool> {
        (**self).write(out)
    }
}

impl Serializer for &str {
    fn write(&self, out: &mut dyn DataOutput) -> Result<bool> {
        self.as_bytes().write(out)
    }
}

impl Serializer for Vec<u8> {
    fn write(&self, out: &mut dyn DataOutput) -> Result<bool> {
        self.as_slice().write(out)
    }
}

impl Serializer for String {
    fn write(&self, out: &mut dyn DataOutput) -> Result<bool> {
        self.as_bytes().write(out)
    }
}

impl<F> Serializer for F
where
    F: Fn(&mut dyn DataOutput) -> Result<bool>,
{
    fn write(&self, out: &mut dyn DataOutput) -> Result<bool> {
        self(out)
    }
}

/// Appends per-document payloads. Documents get sequential ids from 0: each
/// `end` closes the current document, whether or not anything was written.
pub trait StoredFieldsWriter: Send {
    fn prepare(&mut self, dir: &dyn Directory, segment: &str) -> Result<()>;

    /// Appends a body to the current document.
    ///
    /// Returns `false` if the body was rejected (the serializer declined or
    /// produced no bytes); nothing is appended and the document stays open.
    fn write(&mut self, body: &dyn Serializer) -> Result<bool>;

    /// Closes the current document, attaching an optional header.
    fn end(&mut self, header: Option<&dyn Serializer>) -> Result<()>;

    /// Discards the bodies of the current, unfinished document.
    fn reset(&mut self);

    /// Seals the stream. The current document must be closed.
    fn finish(&mut self) -> Result<()>;
}

pub trait StoredFieldsReader: Send + Sync {
    fn prepare(&mut self, state: &ReaderState) -> Result<()>;

    /// Invokes `visitor(header, body)` for the stored payload of `doc`.
    ///
    /// Returns `false` if the document is out of range, deleted, has no
    /// stored fields, or the visitor returned `false`.
    fn visit(
        &self,
        doc: DocId,
        visitor: &mut dyn FnMut(&mut DataInput, &mut DataInput) -> bool,
    ) -> Result<bool>;

    /// Number of documents in the stored fields stream.
    fn docs_count(&self) -> u32;
}
