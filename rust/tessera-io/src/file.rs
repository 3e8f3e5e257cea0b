//! Local file implementations of [`ReadAt`] and [`SealingWrite`].

use std::{fs::File, io::Write, ops::Range, path::Path};

use bytes::Bytes;

use crate::{ReadAt, SealingWrite, StorageProfile, verify};

/// Reader over a sealed, immutable file. The size is captured on open.
pub struct FileReader {
    file: File,
    size: u64,
}

impl FileReader {
    pub fn new(file: File) -> std::io::Result<FileReader> {
        let size = file.metadata()?.len();
        Ok(FileReader { file, size })
    }

    pub fn open(path: impl AsRef<Path>) -> std::io::Result<FileReader> {
        FileReader::new(File::open(path)?)
    }
}

impl ReadAt for FileReader {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.size)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        verify!(range.end >= range.start);
        let end = range.end.min(self.size);
        if range.start >= end {
            return Ok(Bytes::new());
        }
        let mut buf = vec![0u8; (end - range.start) as usize];
        read_exact_at(&self.file, range.start, &mut buf)?;
        Ok(Bytes::from(buf))
    }
}

/// Writer of a new file. Writes go straight to the file; `seal` flushes and
/// syncs it, after which the writer rejects further writes.
pub struct FileWriter {
    file: Option<File>,
}

impl FileWriter {
    /// Creates a new file at `path`, failing with `AlreadyExists` if it exists.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<FileWriter> {
        Ok(FileWriter {
            file: Some(File::create_new(path)?),
        })
    }

    fn open_file(&mut self) -> std::io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("file writer is sealed"))
    }
}

impl SealingWrite for FileWriter {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.open_file()?.write_all(buf)
    }

    fn seal(&mut self) -> std::io::Result<()> {
        let file = self.open_file()?;
        file.flush()?;
        file.sync_all()?;
        self.file = None;
        Ok(())
    }

    fn storage_profile(&self) -> StorageProfile {
        StorageProfile {
            min_io_size: 16 * 1024,
            max_io_size: 1024 * 1024,
        }
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
    std::os::unix::fs::FileExt::read_exact_at(file, buf, pos)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut pos: u64, mut buf: &mut [u8]) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        let n = file.seek_read(buf, pos)?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf = &mut buf[n..];
        pos += n as u64;
    }
    Ok(())
}
