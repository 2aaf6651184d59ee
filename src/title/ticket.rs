use crate::error::Result;
use crate::reader::BinaryReader;

const TITLE_KEY_OFFSET: usize = 0x1bf;

/// The only part of a ticket needed to read content: the wrapped title key.
#[derive(Clone, Debug)]
pub struct Ticket {
    pub encrypted_title_key: [u8; 16],
}

impl Ticket {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = BinaryReader::new(data, "ticket");
        r.seek_to(TITLE_KEY_OFFSET);
        Ok(Self {
            encrypted_title_key: r.get_array()?,
        })
    }
}
