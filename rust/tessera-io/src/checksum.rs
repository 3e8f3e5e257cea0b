//! Checksummed messages: `[u32 len][payload][u32 checksum]`, little-endian,
//! with the folded xxh3-64 of the payload as checksum.

use byteorder::{ByteOrder, LittleEndian};
use tessera_common::{Result, error::ErrorKind, verify_data};

use crate::DataOutput;

pub const MESSAGE_LEN_SIZE: usize = 4;
pub const CHECKSUM_SIZE: usize = 4;

/// Validates a message that spans the whole of `message` and returns its
/// payload.
pub fn validate_message(message: &[u8]) -> Result<&[u8]> {
    verify_data!(message, message.len() >= MESSAGE_LEN_SIZE + CHECKSUM_SIZE);
    let len = LittleEndian::read_u32(message) as usize;
    verify_data!(message, message.len() - MESSAGE_LEN_SIZE - CHECKSUM_SIZE == len);
    let (payload, checksum) = message[MESSAGE_LEN_SIZE..].split_at(len);
    if compute(payload) != LittleEndian::read_u32(checksum) {
        return Err(ErrorKind::ChecksumMismatch {
            element: "message".to_string(),
        }
        .into());
    }
    Ok(payload)
}

pub fn compute(buf: &[u8]) -> u32 {
    let h = xxhash_rust::xxh3::xxh3_64(buf);
    (h as u32) ^ ((h >> 32) as u32)
}

pub fn write_message(payload: &[u8], out: &mut dyn DataOutput) -> std::io::Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| std::io::Error::other("message payload exceeds 4 GiB"))?;
    out.write_u32(len)?;
    out.write_slice(payload)?;
    out.write_u32(compute(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        write_message(payload, &mut out).unwrap();
        out
    }

    #[test]
    fn test_message_layout() {
        let written = message(b"segments");
        assert_eq!(written.len(), 16);
        assert_eq!(&written[..4], &8u32.to_le_bytes());
        assert_eq!(&written[12..], &compute(b"segments").to_le_bytes());
        assert_eq!(validate_message(&written).unwrap(), b"segments");
        assert_eq!(validate_message(&message(b"")).unwrap(), b"");
    }

    #[test]
    fn test_rejects_bad_length() {
        assert!(validate_message(b"short").unwrap_err().is_decode_error());

        let mut long = message(b"terms");
        long[0] = 15;
        assert!(validate_message(&long).unwrap_err().is_decode_error());

        let mut trailing = message(b"terms");
        trailing.push(0);
        assert!(validate_message(&trailing).is_err());
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let mut corrupted = message(b"postings");
        corrupted[6] ^= 1;
        let e = validate_message(&corrupted).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::ChecksumMismatch { .. }));
        assert!(e.is_decode_error());
    }
}
