use crate::error::Result;
use crate::reader::BinaryReader;

const TITLE_ID_OFFSET: usize = 0x18c;
const TITLE_VERSION_OFFSET: usize = 0x1dc;
const CONTENT_COUNT_OFFSET: usize = 0x1de;
// wiiubrew documents the content records further in, but on real TMDs they start here.
const CONTENT_RECORDS_OFFSET: usize = 0xb04;
const CONTENT_RECORD_SIZE: usize = 0x24;

/// Content type bit marking content protected by an H0-H3 hash tree.
pub const CONTENT_TYPE_HASHED: u16 = 0x2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentRecord {
    pub id: u32,
    pub index: u16,
    pub ty: u16,
    pub size: u64,
    pub hash: [u8; 20],
}

impl ContentRecord {
    pub fn is_hashed(&self) -> bool {
        self.ty & CONTENT_TYPE_HASHED != 0
    }

    /// Name of the backing file inside a package directory.
    pub fn file_name(&self) -> String {
        format!("{:08x}", self.id)
    }
}

#[derive(Clone, Debug)]
pub struct TitleMetadata {
    pub title_id: u64,
    pub title_version: u16,
    /// Record order is the content index used by the FST.
    pub contents: Vec<ContentRecord>,
}

impl TitleMetadata {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = BinaryReader::new(data, "tmd");

        r.seek_to(TITLE_ID_OFFSET);
        let title_id = r.get_u64()?;
        r.seek_to(TITLE_VERSION_OFFSET);
        let title_version = r.get_u16()?;
        r.seek_to(CONTENT_COUNT_OFFSET);
        let content_count = r.get_u16()? as usize;

        r.seek_to(CONTENT_RECORDS_OFFSET);
        let mut contents = Vec::with_capacity(content_count);
        for _ in 0..content_count {
            let start = r.position();
            let id = r.get_u32()?;
            let index = r.get_u16()?;
            let ty = r.get_u16()?;
            let size = r.get_u64()?;
            let hash = r.get_array()?;
            r.seek_to(start + CONTENT_RECORD_SIZE);

            contents.push(ContentRecord {
                id,
                index,
                ty,
                size,
                hash,
            });
        }

        Ok(Self {
            title_id,
            title_version,
            contents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NusError;
    use crate::test_support::build_tmd;

    #[test]
    fn parses_header_and_records() {
        let records = vec![
            ContentRecord {
                id: 0,
                index: 0,
                ty: 0x2001,
                size: 0x8000,
                hash: [0xaa; 20],
            },
            ContentRecord {
                id: 0x1f,
                index: 1,
                ty: 0x2003,
                size: 0x20000,
                hash: [0x55; 20],
            },
        ];
        let data = build_tmd(0x0005000010101d00, 32, &records);
        let tmd = TitleMetadata::parse(&data).unwrap();

        assert_eq!(tmd.title_id, 0x0005000010101d00);
        assert_eq!(tmd.title_version, 32);
        assert_eq!(tmd.contents, records);
        assert!(!tmd.contents[0].is_hashed());
        assert!(tmd.contents[1].is_hashed());
        assert_eq!(tmd.contents[1].file_name(), "0000001f");
    }

    #[test]
    fn truncated_record_table_is_malformed() {
        let record = ContentRecord {
            id: 1,
            index: 0,
            ty: 1,
            size: 16,
            hash: [0; 20],
        };
        let mut data = build_tmd(1, 0, &[record]);
        data.truncate(CONTENT_RECORDS_OFFSET + 10);
        assert!(matches!(
            TitleMetadata::parse(&data),
            Err(NusError::Malformed("tmd", _))
        ));
    }
}
