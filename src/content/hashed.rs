//! Seekable view over content protected by a hash tree.
//!
//! The backing file is a run of 0x10000-byte physical blocks. Each one holds
//! a 0x400-byte encrypted hash block followed by 0xFC00 bytes of encrypted
//! data. Only the data is visible through the stream, so logical offsets
//! advance 0xFC00 bytes per physical block.
//!
//! Hash block layout (after decryption with a zero IV):
//!
//! ```text
//! 0x000  16 x H0  SHA-1 of each data block in this group of 16
//! 0x140  16 x H1  SHA-1 of each H0 table in this group of 256
//! 0x280  16 x H2  SHA-1 of each H1 table in this group of 4096
//! 0x3c0  H3, not present in NUS packages
//! ```
//!
//! The first 16 bytes of a block's own H0 entry are the IV for its data.

use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::{trace, warn};

use crate::crypto::{decrypt_cbc, sha1, ZERO_IV};
use crate::error::{NusError, Result};

pub const PHYSICAL_BLOCK_SIZE: u64 = 0x10000;
pub const HASH_BLOCK_SIZE: usize = 0x400;
pub const DATA_BLOCK_SIZE: usize = 0xfc00;

pub(crate) const HASH_SIZE: usize = 0x14;
pub(crate) const HASH_TABLE_SIZE: usize = 0x140;
const VERIFIED_LEVELS: u8 = 3;

pub struct HashedContentStream<R> {
    inner: R,
    title_key: [u8; 16],
    length: u64,
    position: u64,
    current_block: Option<u64>,
    hash_block: Vec<u8>,
    data_block: Vec<u8>,
    blocks_decoded: u64,
}

impl<R: Read + Seek> HashedContentStream<R> {
    pub fn new(mut inner: R, title_key: [u8; 16]) -> Result<Self> {
        let physical_length = inner.seek(SeekFrom::End(0))?;
        let block_count = physical_length / PHYSICAL_BLOCK_SIZE;

        Ok(Self {
            inner,
            title_key,
            length: block_count * DATA_BLOCK_SIZE as u64,
            position: 0,
            current_block: None,
            hash_block: vec![0; HASH_BLOCK_SIZE],
            data_block: vec![0; DATA_BLOCK_SIZE],
            blocks_decoded: 0,
        })
    }

    /// Logical length: the number of physical blocks times 0xFC00.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of physical blocks decrypted and verified so far.
    pub fn blocks_decoded(&self) -> u64 {
        self.blocks_decoded
    }

    /// Move to a logical offset. Targets at or past the end are rejected.
    ///
    /// The target block is decoded on the next read.
    pub fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
            SeekFrom::End(delta) => self.length as i128 + delta as i128,
        };
        if target < 0 || target >= self.length as i128 {
            return Err(NusError::SeekOutOfRange(target, self.length));
        }

        self.position = target as u64;
        Ok(self.position)
    }

    /// Fill `buf` entirely from the current position.
    ///
    /// Fails without advancing if the range runs past the end or any block
    /// it touches fails verification.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        if self.position + buf.len() as u64 > self.length {
            return Err(NusError::ReadOutOfRange(buf.len(), self.position, self.length));
        }

        let mut position = self.position;
        let mut written = 0;
        while written < buf.len() {
            let block = position / DATA_BLOCK_SIZE as u64;
            let offset = (position % DATA_BLOCK_SIZE as u64) as usize;
            self.load_block(block)?;

            let count = (DATA_BLOCK_SIZE - offset).min(buf.len() - written);
            buf[written..written + count].copy_from_slice(&self.data_block[offset..offset + count]);
            written += count;
            position += count as u64;
        }

        self.position = position;
        Ok(())
    }

    fn load_block(&mut self, block: u64) -> Result<()> {
        if self.current_block == Some(block) {
            return Ok(());
        }
        self.current_block = None;

        trace!(block, "decoding hashed content block");
        self.inner.seek(SeekFrom::Start(block * PHYSICAL_BLOCK_SIZE))?;
        self.inner.read_exact(&mut self.hash_block)?;
        self.inner.read_exact(&mut self.data_block)?;
        self.blocks_decoded += 1;

        decrypt_cbc(&self.title_key, &ZERO_IV, &mut self.hash_block)?;

        let h0 = HASH_SIZE * (block % 16) as usize;
        let mut iv = [0; 16];
        iv.copy_from_slice(&self.hash_block[h0..h0 + 16]);
        decrypt_cbc(&self.title_key, &iv, &mut self.data_block)?;

        for level in 0..VERIFIED_LEVELS {
            self.verify_level(block, level)?;
        }

        self.current_block = Some(block);
        Ok(())
    }

    /// Check one level of the hash tree for the block currently held in the buffers.
    pub(crate) fn verify_level(&self, block: u64, level: u8) -> Result<()> {
        let (digest, slot) = match level {
            0 => (sha1(&self.data_block), block % 16),
            1 => (sha1(&self.hash_block[..HASH_TABLE_SIZE]), (block / 16) % 16),
            2 => (
                sha1(&self.hash_block[HASH_TABLE_SIZE..2 * HASH_TABLE_SIZE]),
                (block / 256) % 16,
            ),
            _ => return Err(NusError::UnsupportedHashLevel(level)),
        };

        let start = HASH_TABLE_SIZE * level as usize + HASH_SIZE * slot as usize;
        let expected = &self.hash_block[start..start + HASH_SIZE];
        if expected != &digest[..] {
            warn!(
                block,
                level,
                expected = %hex::encode(expected),
                got = %hex::encode(digest),
                "hash tree mismatch"
            );
            return Err(NusError::HashMismatch(level, block));
        }

        Ok(())
    }
}

impl<R: Read + Seek> Read for HashedContentStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.length || buf.is_empty() {
            return Ok(0);
        }

        let offset = (self.position % DATA_BLOCK_SIZE as u64) as usize;
        let count = buf
            .len()
            .min(DATA_BLOCK_SIZE - offset)
            .min((self.length - self.position) as usize);
        self.read_bytes(&mut buf[..count])?;
        Ok(count)
    }
}

impl<R: Read + Seek> Seek for HashedContentStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }
}

impl<R> Write for HashedContentStream<R> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(NusError::ReadOnly.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(NusError::ReadOnly.into())
    }
}
