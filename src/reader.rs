use crate::error::{NusError, Result};

/// Big-endian cursor over an in-memory record (TMD, ticket).
pub struct BinaryReader<'a> {
    data: &'a [u8],
    index: usize,
    what: &'static str,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8], what: &'static str) -> Self {
        Self {
            data,
            index: 0,
            what,
        }
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn seek_to(&mut self, index: usize) {
        self.index = index;
    }

    pub fn get_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let data = self.data;
        let start = self.index;
        self.index += count;
        data.get(start..self.index).ok_or_else(|| {
            NusError::Malformed(
                self.what,
                format!(
                    "attempted to read `{count}` byte(s) out of bounds (index: `{start}`, length: `{}`)",
                    data.len()
                ),
            )
        })
    }

    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.get_bytes(N)?);
        Ok(out)
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.get_array()?))
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.get_array()?))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.get_array()?))
    }
}
