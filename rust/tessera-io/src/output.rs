//! Primitive encoders used by every codec.
//!
//! All fixed-width integers are little-endian. Variable-length integers use
//! the LEB128 scheme: seven payload bits per byte, high bit set on every byte
//! except the last.

use byteorder::{ByteOrder, LittleEndian};

use crate::SealingWrite;

/// Maximum encoded size of a `u64` varint.
pub const MAX_VINT_LEN: usize = 10;

/// Sequential output with position tracking.
pub trait DataOutput {
    /// Appends raw bytes.
    fn write_slice(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Number of bytes written so far.
    fn position(&self) -> u64;

    fn write_u8(&mut self, value: u8) -> std::io::Result<()> {
        self.write_slice(&[value])
    }

    fn write_u32(&mut self, value: u32) -> std::io::Result<()> {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.write_slice(&buf)
    }

    fn write_u64(&mut self, value: u64) -> std::io::Result<()> {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.write_slice(&buf)
    }

    fn write_vint(&mut self, value: u64) -> std::io::Result<()> {
        let mut buf = [0u8; MAX_VINT_LEN];
        let len = encode_vint(value, &mut buf);
        self.write_slice(&buf[..len])
    }

    /// Writes a length-prefixed byte string.
    fn write_bytes(&mut self, value: &[u8]) -> std::io::Result<()> {
        self.write_vint(value.len() as u64)?;
        self.write_slice(value)
    }

    /// Writes a length-prefixed UTF-8 string.
    fn write_str(&mut self, value: &str) -> std::io::Result<()> {
        self.write_bytes(value.as_bytes())
    }
}

/// Encodes `value` into `buf`, returning the number of bytes used.
pub fn encode_vint(mut value: u64, buf: &mut [u8; MAX_VINT_LEN]) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

impl DataOutput for Vec<u8> {
    fn write_slice(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }

    fn position(&self) -> u64 {
        self.len() as u64
    }
}

/// `DataOutput` over a sealing stream obtained from a directory.
///
/// Small writes are coalesced into an internal buffer sized after the
/// stream's storage profile.
pub struct StreamOutput {
    inner: Box<dyn SealingWrite>,
    buf: Vec<u8>,
    flushed: u64,
    chunk_size: usize,
}

impl StreamOutput {
    pub fn new(inner: Box<dyn SealingWrite>) -> StreamOutput {
        let chunk_size = inner.storage_profile().clamp_io_size(64 * 1024);
        StreamOutput {
            inner,
            buf: Vec::with_capacity(chunk_size),
            flushed: 0,
            chunk_size,
        }
    }

    fn flush_buf(&mut self) -> std::io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
            self.flushed += self.buf.len() as u64;
            self.buf.clear();
        }
        Ok(())
    }

    /// Flushes the pending bytes and seals the underlying stream.
    pub fn seal(mut self) -> std::io::Result<()> {
        self.flush_buf()?;
        self.inner.seal()
    }
}

impl DataOutput for StreamOutput {
    fn write_slice(&mut self, buf: &[u8]) -> std::io::Result<()> {
        if self.buf.len() + buf.len() > self.chunk_size {
            self.flush_buf()?;
        }
        if buf.len() >= self.chunk_size {
            self.inner.write_all(buf)?;
            self.flushed += buf.len() as u64;
        } else {
            self.buf.extend_from_slice(buf);
        }
        Ok(())
    }

    fn position(&self) -> u64 {
        self.flushed + self.buf.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::StorageProfile;

    #[test]
    fn test_vint_encoding() {
        let mut out = Vec::new();
        out.write_vint(0).unwrap();
        out.write_vint(127).unwrap();
        out.write_vint(128).unwrap();
        out.write_vint(300).unwrap();
        assert_eq!(out, vec![0x00, 0x7f, 0x80, 0x01, 0xac, 0x02]);

        let mut out = Vec::new();
        out.write_vint(u64::MAX).unwrap();
        assert_eq!(out.len(), MAX_VINT_LEN);
    }

    #[test]
    fn test_fixed_width_little_endian() {
        let mut out = Vec::new();
        out.write_u32(0x0102_0304).unwrap();
        out.write_u64(1).unwrap();
        assert_eq!(&out[..4], &[4, 3, 2, 1]);
        assert_eq!(out.position(), 12);
    }

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<(Vec<u8>, bool)>>);

    impl SealingWrite for SharedSink {
        fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
            self.0.lock().unwrap().0.extend_from_slice(buf);
            Ok(())
        }

        fn seal(&mut self) -> std::io::Result<()> {
            self.0.lock().unwrap().1 = true;
            Ok(())
        }

        fn storage_profile(&self) -> StorageProfile {
            StorageProfile {
                min_io_size: 8,
                max_io_size: 8,
            }
        }
    }

    #[test]
    fn test_stream_output_coalesces_and_seals() {
        let sink = SharedSink::default();
        let mut out = StreamOutput::new(Box::new(sink.clone()));
        out.write_str("hello").unwrap();
        assert_eq!(out.position(), 6);
        out.write_slice(b"0123456789abcdef").unwrap();
        out.write_u8(7).unwrap();
        assert_eq!(out.position(), 23);
        out.seal().unwrap();

        let state = sink.0.lock().unwrap();
        assert!(state.1);
        assert_eq!(state.0.len(), 23);
        assert_eq!(&state.0[..6], b"\x05hello");
        assert_eq!(state.0[22], 7);
    }
}
