use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use tessera_common::{Error, Result};

use crate::output::MAX_VINT_LEN;

/// Bounds-checked decoding cursor over an immutable byte buffer.
///
/// Every read past the end of the buffer is reported as a decode error
/// tagged with the element name the cursor was created for.
#[derive(Clone)]
pub struct DataInput {
    buf: Bytes,
    pos: usize,
    element: &'static str,
}

impl DataInput {
    pub fn new(buf: Bytes, element: &'static str) -> DataInput {
        DataInput {
            buf,
            pos: 0,
            element,
        }
    }

    pub fn empty() -> DataInput {
        DataInput::new(Bytes::new(), "empty")
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Returns the unread part of the buffer without consuming it.
    pub fn peek_rest(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(self.truncated(pos - self.buf.len()));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// Creates an independent cursor over `range` of this buffer.
    pub fn slice(&self, range: Range<usize>) -> Result<DataInput> {
        if range.start > range.end || range.end > self.buf.len() {
            return Err(Error::invalid_format(
                self.element,
                format!("range {range:?} exceeds {} bytes", self.buf.len()),
            ));
        }
        Ok(DataInput::new(self.buf.slice(range), self.element))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_vint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for i in 0..MAX_VINT_LEN {
            let b = self.read_u8()?;
            // The tenth group carries bit 63 only.
            if i == MAX_VINT_LEN - 1 && b > 1 {
                return Err(Error::invalid_format(self.element, "varint exceeds u64 range"));
            }
            value |= ((b & 0x7f) as u64) << (7 * i);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::invalid_format(self.element, "malformed varint"))
    }

    /// Reads a varint that must fit into `u32`.
    pub fn read_vint_u32(&mut self) -> Result<u32> {
        let value = self.read_vint()?;
        u32::try_from(value).map_err(|_| {
            Error::invalid_format(self.element, format!("value {value} exceeds u32 range"))
        })
    }

    /// Reads `len` raw bytes as a zero-copy slice.
    pub fn read_raw(&mut self, len: usize) -> Result<Bytes> {
        let start = self.pos;
        self.take(len)?;
        Ok(self.buf.slice(start..start + len))
    }

    /// Reads a length-prefixed byte string.
    pub fn read_bytes(&mut self) -> Result<Bytes> {
        let len = self.read_vint()?;
        if len > self.remaining() as u64 {
            return Err(self.truncated((len - self.remaining() as u64) as usize));
        }
        self.read_raw(len as usize)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::invalid_format(self.element, "string is not valid UTF-8"))
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        if len > self.remaining() {
            return Err(self.truncated(len - self.remaining()));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..self.pos])
    }

    fn truncated(&self, missing: usize) -> Error {
        Error::invalid_format(
            self.element,
            format!("unexpected end of data, {missing} more bytes expected"),
        )
    }
}

impl std::fmt::Debug for DataInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataInput")
            .field("element", &self.element)
            .field("len", &self.buf.len())
            .field("pos", &self.pos)
            .finish()
    }
}
