use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::crypto::{decrypt_cbc, sha1, ZERO_IV};
use crate::error::{NusError, Result};

/// A non-hashed content, decrypted whole on open and kept in memory.
pub struct PlainContentBuffer {
    data: Cursor<Vec<u8>>,
}

impl PlainContentBuffer {
    pub fn new<R: Read>(mut inner: R, title_key: &[u8; 16]) -> Result<Self> {
        let mut data = vec![];
        inner.read_to_end(&mut data)?;
        Self::from_encrypted(data, title_key)
    }

    pub fn from_encrypted(mut data: Vec<u8>, title_key: &[u8; 16]) -> Result<Self> {
        if data.len() % 16 != 0 {
            return Err(NusError::Malformed(
                "plain content",
                format!("length `{}` is not a multiple of the AES block size", data.len()),
            ));
        }
        decrypt_cbc(title_key, &ZERO_IV, &mut data)?;

        Ok(Self {
            data: Cursor::new(data),
        })
    }

    pub fn len(&self) -> u64 {
        self.data.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.get_ref().is_empty()
    }

    /// Compare the SHA-1 of the first `size` decrypted bytes against `expected`.
    pub fn verify(&self, index: usize, size: u64, expected: &[u8; 20]) -> Result<()> {
        let data = self.data.get_ref();
        let region = data.get(..size as usize).ok_or(NusError::UnexpectedSize(
            "plain content",
            size as usize,
            data.len(),
        ))?;
        let got = sha1(region);
        if &got != expected {
            return Err(NusError::ContentHashMismatch(
                index,
                hex::encode(expected),
                hex::encode(got),
            ));
        }
        Ok(())
    }

    pub fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        let len = self.len();
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.data.position() as i128 + delta as i128,
            SeekFrom::End(delta) => len as i128 + delta as i128,
        };
        if target < 0 || target >= len as i128 {
            return Err(NusError::SeekOutOfRange(target, len));
        }
        Ok(self.data.seek(SeekFrom::Start(target as u64))?)
    }

    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let position = self.data.position();
        if position + buf.len() as u64 > self.len() {
            return Err(NusError::ReadOutOfRange(buf.len(), position, self.len()));
        }
        self.data.read_exact(buf)?;
        Ok(())
    }
}

impl Read for PlainContentBuffer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.data.read(buf)
    }
}

impl Seek for PlainContentBuffer {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }
}
