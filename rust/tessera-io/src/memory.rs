//! In-memory buffers as byte streams: `Bytes` and `Vec<u8>` read, `Vec<u8>`
//! also writes.

use std::ops::Range;

use bytes::Bytes;

use crate::{ReadAt, SealingWrite, StorageProfile, verify};

/// Clamps `range` to a buffer of `len` bytes.
fn clamp(range: Range<u64>, len: usize) -> std::io::Result<Range<usize>> {
    verify!(range.end >= range.start);
    let end = range.end.min(len as u64) as usize;
    let start = (range.start.min(len as u64) as usize).min(end);
    Ok(start..end)
}

impl ReadAt for Bytes {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        Ok(self.slice(clamp(range, self.len())?))
    }
}

impl ReadAt for Vec<u8> {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        Ok(Bytes::copy_from_slice(&self[clamp(range, self.len())?]))
    }
}

impl SealingWrite for Vec<u8> {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }

    fn seal(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    fn storage_profile(&self) -> StorageProfile {
        StorageProfile {
            min_io_size: 1,
            ..Default::default()
        }
    }
}
