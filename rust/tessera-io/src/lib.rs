//! Byte streams underneath every codec.
//!
//! Artifacts are written once through a [`SealingWrite`] and read back
//! through a [`ReadAt`]. Codecs encode with [`DataOutput`] and decode with
//! [`DataInput`]; [`framing`] and [`checksum`] supply the artifact envelope.

use std::{ops::Range, sync::Arc};

use bytes::Bytes;

pub mod checksum;
pub mod file;
pub mod framing;
pub mod input;
pub mod memory;
pub mod output;
pub mod utils;

pub use input::DataInput;
pub use output::{DataOutput, StreamOutput};

/// Random access to a sealed artifact.
pub trait ReadAt: Send + Sync + 'static {
    fn size(&self) -> std::io::Result<u64>;

    /// Reads `range`, clamped to the end of the artifact. A short read only
    /// happens at the end; a reversed range is an `InvalidInput` error.
    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes>;
}

/// Append-only sink of a new artifact.
///
/// Content is complete, and for directories visible, only once `seal`
/// returns. A sealed writer rejects further calls.
pub trait SealingWrite: Send {
    /// Appends all of `buf` or fails.
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Flushes and commits everything written so far.
    fn seal(&mut self) -> std::io::Result<()>;

    /// Preferred request sizes of the underlying storage.
    fn storage_profile(&self) -> StorageProfile;
}

/// Request sizes a storage handles efficiently.
#[derive(Debug, Clone)]
pub struct StorageProfile {
    pub min_io_size: usize,
    pub max_io_size: usize,
}

impl StorageProfile {
    /// Clamps `size` into `[min_io_size, max_io_size]`; never returns 0.
    pub fn clamp_io_size(&self, size: usize) -> usize {
        let min = self.min_io_size.max(1).min(self.max_io_size);
        let max = self.max_io_size.max(1).max(min);
        size.clamp(min, max)
    }
}

impl Default for StorageProfile {
    fn default() -> StorageProfile {
        StorageProfile {
            min_io_size: 4 * 1024,
            max_io_size: 4 * 1024 * 1024,
        }
    }
}

/// Reads the complete content of a `ReadAt` object into a single buffer.
pub fn read_all(reader: &dyn ReadAt) -> std::io::Result<Bytes> {
    let size = reader.size()?;
    let bytes = reader.read_at(0..size)?;
    if (bytes.len() as u64) < size {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    Ok(bytes)
}

impl<T> ReadAt for Arc<T>
where
    T: ReadAt + ?Sized,
{
    fn size(&self) -> std::io::Result<u64> {
        self.as_ref().size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        self.as_ref().read_at(range)
    }
}

impl<T> SealingWrite for Box<T>
where
    T: SealingWrite + ?Sized,
{
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.as_mut().write_all(buf)
    }

    fn seal(&mut self) -> std::io::Result<()> {
        self.as_mut().seal()
    }

    fn storage_profile(&self) -> StorageProfile {
        self.as_ref().storage_profile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_io_size() {
        let profile = StorageProfile {
            min_io_size: 16,
            max_io_size: 64,
        };
        assert_eq!(profile.clamp_io_size(1), 16);
        assert_eq!(profile.clamp_io_size(32), 32);
        assert_eq!(profile.clamp_io_size(1000), 64);

        let degenerate = StorageProfile {
            min_io_size: 0,
            max_io_size: 0,
        };
        assert_eq!(degenerate.clamp_io_size(10), 1);
    }

    #[test]
    fn test_read_all() {
        let blob = Arc::new(b"abcdef".to_vec()) as Arc<dyn ReadAt>;
        assert_eq!(read_all(blob.as_ref()).unwrap().as_ref(), b"abcdef");
    }
}
