//! Artifact envelope shared by every persisted file:
//!
//! ```text
//! [header: 8 bytes][body][footer: 8 bytes]
//! ```
//!
//! Header and footer carry the same magic and version bytes, so a file that
//! was cut short (or never sealed) fails validation on open.

use bytes::Bytes;
use tessera_common::{Error, Result};

use crate::{DataOutput, ReadAt, read_all};

pub const FORMAT_VERSION_MAJOR: u8 = 1;
pub const FORMAT_VERSION_MINOR: u8 = 0;

pub const MAGIC: [u8; 4] = *b"tsra";

pub const HEADER: [u8; 8] = [
    MAGIC[0],
    MAGIC[1],
    MAGIC[2],
    MAGIC[3],
    0,
    0,
    FORMAT_VERSION_MINOR,
    FORMAT_VERSION_MAJOR,
];

pub const HEADER_SIZE: usize = HEADER.len();
pub const FOOTER_SIZE: usize = HEADER.len();

pub fn write_header(out: &mut dyn DataOutput) -> std::io::Result<()> {
    out.write_slice(&HEADER)
}

pub fn write_footer(out: &mut dyn DataOutput) -> std::io::Result<()> {
    out.write_slice(&HEADER)
}

/// Checks magic and major version of a header (or footer).
pub fn verify_header(header: &[u8], element: &str) -> Result<()> {
    if header.len() < HEADER_SIZE {
        return Err(Error::invalid_format(element, "missing header"));
    }
    if header[..MAGIC.len()] != MAGIC {
        return Err(Error::invalid_format(element, "invalid magic bytes"));
    }
    if header[HEADER_SIZE - 1] != FORMAT_VERSION_MAJOR {
        return Err(Error::invalid_format(
            element,
            format!("unsupported major version {}", header[HEADER_SIZE - 1]),
        ));
    }
    Ok(())
}

/// Validates the envelope of a complete artifact and returns its body.
pub fn unwrap_artifact(artifact: &Bytes, element: &str) -> Result<Bytes> {
    if artifact.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(Error::invalid_format(
            element,
            format!("artifact is too short ({} bytes)", artifact.len()),
        ));
    }
    verify_header(&artifact[..HEADER_SIZE], element)?;
    verify_header(&artifact[artifact.len() - FOOTER_SIZE..], element)?;
    Ok(artifact.slice(HEADER_SIZE..artifact.len() - FOOTER_SIZE))
}

/// Reads a complete artifact and returns its validated body.
pub fn read_artifact(reader: &dyn ReadAt, element: &str) -> Result<Bytes> {
    let artifact = read_all(reader).map_err(|e| Error::io(element, e))?;
    unwrap_artifact(&artifact, element)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(body: &[u8]) -> Bytes {
        let mut out = Vec::new();
        write_header(&mut out).unwrap();
        out.write_slice(body).unwrap();
        write_footer(&mut out).unwrap();
        Bytes::from(out)
    }

    #[test]
    fn test_read_artifact() {
        let data = artifact(b"body");
        assert_eq!(read_artifact(&data, "test").unwrap().as_ref(), b"body");
        assert!(read_artifact(&artifact(b""), "test").unwrap().is_empty());
    }

    #[test]
    fn test_truncated_artifact() {
        let data = artifact(b"body");
        let cut = data.slice(..data.len() - 3);
        assert!(read_artifact(&cut, "test").unwrap_err().is_decode_error());
        assert!(
            read_artifact(&Bytes::from_static(b"tsra"), "test")
                .unwrap_err()
                .is_decode_error()
        );
    }

    #[test]
    fn test_version_mismatch() {
        let mut data = artifact(b"body").to_vec();
        data[HEADER_SIZE - 1] = FORMAT_VERSION_MAJOR + 1;
        let e = unwrap_artifact(&Bytes::from(data), "test").unwrap_err();
        assert!(e.to_string().contains("major version"));
    }
}
