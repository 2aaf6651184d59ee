//! Decrypting readers for the per-record content files.

pub mod hashed;
pub mod plain;

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

pub use hashed::{HashedContentStream, DATA_BLOCK_SIZE, HASH_BLOCK_SIZE, PHYSICAL_BLOCK_SIZE};
pub use plain::PlainContentBuffer;

use crate::error::Result;

/// One opened content file, addressed by its position in the TMD.
pub enum ContentStream {
    Hashed(HashedContentStream<File>),
    Plain(PlainContentBuffer),
}

impl ContentStream {
    pub fn len(&self) -> u64 {
        match self {
            ContentStream::Hashed(s) => s.len(),
            ContentStream::Plain(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_hashed(&self) -> bool {
        matches!(self, ContentStream::Hashed(_))
    }

    /// Read exactly `size` bytes starting at logical `offset`.
    pub fn read_at(&mut self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let mut out = vec![0; size];
        if size == 0 {
            return Ok(out);
        }
        match self {
            ContentStream::Hashed(s) => {
                s.seek_to(SeekFrom::Start(offset))?;
                s.read_bytes(&mut out)?;
            }
            ContentStream::Plain(b) => {
                b.seek_to(SeekFrom::Start(offset))?;
                b.read_bytes(&mut out)?;
            }
        }
        Ok(out)
    }
}

impl Read for ContentStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ContentStream::Hashed(s) => s.read(buf),
            ContentStream::Plain(b) => b.read(buf),
        }
    }
}

impl Seek for ContentStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ContentStream::Hashed(s) => s.seek(pos),
            ContentStream::Plain(b) => b.seek(pos),
        }
    }
}
