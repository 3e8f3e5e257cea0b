//! File envelope shared by every v1 artifact:
//!
//! ```text
//! [header][data region][table message][u64 table offset][footer]
//! ```
//!
//! The table is a checksummed message describing the data region; small
//! artifacts keep everything in the table and have an empty data region.

use bytes::Bytes;
use tessera_common::{Error, Result};
use tessera_directory::Directory;
use tessera_io::{
    DataInput, DataOutput, StreamOutput,
    checksum::{self, MESSAGE_LEN_SIZE},
    framing::{self, FOOTER_SIZE, HEADER_SIZE},
    read_all,
};

pub(crate) fn create(dir: &dyn Directory, name: &str) -> Result<StreamOutput> {
    let stream = dir.create(name).map_err(|e| Error::io(name, e))?;
    let mut out = StreamOutput::new(stream);
    framing::write_header(&mut out)?;
    Ok(out)
}

/// Appends the table, its offset and the footer, then seals the stream.
pub(crate) fn seal_with_table(mut out: StreamOutput, table: &[u8]) -> Result<()> {
    let offset = out.position();
    checksum::write_message(table, &mut out)?;
    out.write_u64(offset)?;
    framing::write_footer(&mut out)?;
    out.seal()?;
    Ok(())
}

/// Reads a complete artifact, validating its header and footer.
pub(crate) fn open(dir: &dyn Directory, name: &str, element: &'static str) -> Result<Bytes> {
    let reader = dir.open(name).map_err(|e| Error::io(name, e))?;
    let data = read_all(reader.as_ref()).map_err(|e| Error::io(name, e))?;
    framing::unwrap_artifact(&data, element)?;
    Ok(data)
}

/// Locates and validates the table of an artifact returned by [`open`].
pub(crate) fn read_table(data: &Bytes, element: &'static str) -> Result<DataInput> {
    let trailer = data.len() - FOOTER_SIZE;
    if trailer < HEADER_SIZE + 8 {
        return Err(Error::invalid_format(element, "missing table offset"));
    }
    let mut offset = DataInput::new(data.slice(trailer - 8..trailer), element);
    let start = offset.read_u64()?;
    let end = (trailer - 8) as u64;
    if start < HEADER_SIZE as u64 || start > end {
        return Err(Error::invalid_format(
            element,
            format!("table offset {start} out of range"),
        ));
    }
    let start = start as usize;
    let payload = checksum::validate_message(&data[start..trailer - 8])?;
    let payload_start = start + MESSAGE_LEN_SIZE;
    Ok(DataInput::new(
        data.slice(payload_start..payload_start + payload.len()),
        element,
    ))
}

/// Checks that `range` lies within the data region of an artifact.
pub(crate) fn data_range(
    data: &Bytes,
    start: u64,
    len: u64,
    element: &'static str,
) -> Result<std::ops::Range<usize>> {
    let end = start.checked_add(len);
    match end {
        Some(end) if start >= HEADER_SIZE as u64 && end <= (data.len() - FOOTER_SIZE) as u64 => {
            Ok(start as usize..end as usize)
        }
        _ => Err(Error::invalid_format(
            element,
            format!("range {start}+{len} exceeds the data region"),
        )),
    }
}

pub(crate) fn exists(dir: &dyn Directory, name: &str) -> Result<bool> {
    dir.exists(name).map_err(|e| Error::io(name, e))
}
