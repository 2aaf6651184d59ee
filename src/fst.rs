//! File System Table: the directory tree stored in content 0.
//!
//! Layout (big-endian):
//!
//! ```text
//! 0x00  "FST\0"
//! 0x04  offset factor
//! 0x08  secondary header count
//! 0x0c  u16 unknown, 18 bytes padding
//! 0x20  secondary headers, 0x20 bytes each
//! ....  entry table, 0x10 bytes per entry; entry 0 is the root directory
//! ....  name table, NUL-terminated strings
//! ```
//!
//! A directory entry stores its parent's index in the offset word and the
//! index one past its last descendant in the size word.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};

use tracing::debug;

use crate::error::{NusError, Result};

const FST_MAGIC: &[u8; 4] = b"FST\0";
const HEADER_SIZE: u64 = 0x20;
const SECONDARY_HEADER_SIZE: u64 = 0x20;
const ENTRY_SIZE: u64 = 0x10;
const MAX_NAME_LENGTH: usize = 0x400;

const ENTRY_DIRECTORY: u8 = 0x01;
const ENTRY_NOT_IN_PACKAGE: u8 = 0x80;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecondaryHeader {
    pub offset: u32,
    pub size: u32,
    pub owner_title_id: u64,
    pub group_id: u32,
    pub unknown: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FstFileEntry {
    /// Stored offset; multiply by the table's offset factor for a byte offset.
    pub offset: u32,
    pub size: u32,
    pub flags: u16,
    pub content_index: u16,
    /// Listed in the table but not shipped in this package.
    pub deleted: bool,
}

impl FstFileEntry {
    pub fn byte_offset(&self, offset_factor: u32) -> u64 {
        self.offset as u64 * offset_factor as u64
    }
}

struct RawEntry {
    ty: u8,
    name_offset: u32,
    offset: u32,
    size: u32,
    flags: u16,
    content_index: u16,
}

impl RawEntry {
    fn decode(b: &[u8; ENTRY_SIZE as usize]) -> Self {
        let type_and_name = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        Self {
            ty: (type_and_name >> 24) as u8,
            name_offset: type_and_name & 0x00ff_ffff,
            offset: u32::from_be_bytes([b[4], b[5], b[6], b[7]]),
            size: u32::from_be_bytes([b[8], b[9], b[10], b[11]]),
            flags: u16::from_be_bytes([b[12], b[13]]),
            content_index: u16::from_be_bytes([b[14], b[15]]),
        }
    }

    fn is_directory(&self) -> bool {
        self.ty & ENTRY_DIRECTORY != 0
    }
}

#[derive(Debug)]
pub struct Fst {
    offset_factor: u32,
    secondary_headers: Vec<SecondaryHeader>,
    files: HashMap<String, FstFileEntry>,
}

impl Fst {
    pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0)).map_err(past_end)?;

        let magic: [u8; 4] = read_array(reader)?;
        if &magic != FST_MAGIC {
            return Err(NusError::BadMagic(
                "fst",
                hex::encode(FST_MAGIC),
                hex::encode(magic),
            ));
        }
        let offset_factor = u32::from_be_bytes(read_array(reader)?);
        let secondary_header_count = u32::from_be_bytes(read_array(reader)?);
        let _unknown = u16::from_be_bytes(read_array(reader)?);
        let _padding: [u8; 18] = read_array(reader)?;

        let mut secondary_headers = Vec::with_capacity(secondary_header_count.min(0x100) as usize);
        for _ in 0..secondary_header_count {
            let b: [u8; SECONDARY_HEADER_SIZE as usize] = read_array(reader)?;
            secondary_headers.push(SecondaryHeader {
                offset: u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
                size: u32::from_be_bytes([b[4], b[5], b[6], b[7]]),
                owner_title_id: u64::from_be_bytes([
                    b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15],
                ]),
                group_id: u32::from_be_bytes([b[16], b[17], b[18], b[19]]),
                unknown: u16::from_be_bytes([b[20], b[21]]),
            });
        }

        // The root entry doubles as the table header: its size word is the entry count.
        let entries_offset = HEADER_SIZE + secondary_header_count as u64 * SECONDARY_HEADER_SIZE;
        let root = RawEntry::decode(&read_array(reader)?);
        let total_entries = root.size as usize;
        if total_entries == 0 {
            return Err(NusError::Malformed(
                "fst",
                "entry table does not include the root".to_string(),
            ));
        }

        let mut raw = Vec::with_capacity(total_entries.min(0x10000));
        raw.push(root);
        for _ in 1..total_entries {
            raw.push(RawEntry::decode(&read_array(reader)?));
        }

        let mut walker = Walker {
            reader,
            raw: &raw,
            name_table: entries_offset + total_entries as u64 * ENTRY_SIZE,
            files: HashMap::new(),
        };
        walker.walk(total_entries)?;
        let files = walker.files;

        debug!(
            entries = total_entries,
            files = files.len(),
            offset_factor,
            "parsed file system table"
        );

        Ok(Self {
            offset_factor,
            secondary_headers,
            files,
        })
    }

    pub fn offset_factor(&self) -> u32 {
        self.offset_factor
    }

    pub fn secondary_headers(&self) -> &[SecondaryHeader] {
        &self.secondary_headers
    }

    pub fn entry(&self, path: &str) -> Option<&FstFileEntry> {
        self.files.get(path)
    }

    /// Every file entry, including ones marked as not in the package.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &FstFileEntry)> {
        self.files.iter().map(|(path, entry)| (path.as_str(), entry))
    }

    /// Paths of the files actually present in the package.
    pub fn visible_paths(&self) -> impl Iterator<Item = &str> {
        self.entries()
            .filter(|(_, entry)| !entry.deleted)
            .map(|(path, _)| path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

struct Walker<'a, R> {
    reader: &'a mut R,
    raw: &'a [RawEntry],
    name_table: u64,
    files: HashMap<String, FstFileEntry>,
}

impl<R: Read + Seek> Walker<'_, R> {
    /// Walk entries `1..total`, keeping open directories on an explicit stack.
    fn walk(&mut self, total: usize) -> Result<()> {
        let mut path = String::from("/");
        // (end index, prefix length) for each open directory, innermost last
        let mut frames = vec![(total, path.len())];
        let mut index = 1;

        while let Some(&(end, prefix_len)) = frames.last() {
            if index >= end {
                frames.pop();
                continue;
            }

            let raw = self.raw;
            let entry = &raw[index];
            path.truncate(prefix_len);
            path.push_str(&self.read_name(entry.name_offset)?);

            if entry.is_directory() {
                let dir_end = entry.size as usize;
                if dir_end <= index || dir_end > end {
                    return Err(NusError::Malformed(
                        "fst",
                        format!(
                            "directory `{path}` at entry `{index}` ends at `{dir_end}` (parent ends at `{end}`)"
                        ),
                    ));
                }
                path.push('/');
                frames.push((dir_end, path.len()));
            } else {
                let file = FstFileEntry {
                    offset: entry.offset,
                    size: entry.size,
                    flags: entry.flags,
                    content_index: entry.content_index,
                    deleted: entry.ty & ENTRY_NOT_IN_PACKAGE != 0,
                };
                if self.files.insert(path.clone(), file).is_some() {
                    return Err(NusError::DuplicatePath(path));
                }
            }
            index += 1;
        }

        Ok(())
    }

    fn read_name(&mut self, name_offset: u32) -> Result<String> {
        self.reader
            .seek(SeekFrom::Start(self.name_table + name_offset as u64))
            .map_err(past_end)?;

        let mut bytes = vec![];
        loop {
            let [b] = read_array::<_, 1>(&mut *self.reader)?;
            if b == 0 {
                break;
            }
            bytes.push(b);
            if bytes.len() > MAX_NAME_LENGTH {
                return Err(NusError::Malformed(
                    "fst",
                    format!("unterminated name at name table offset `{name_offset}`"),
                ));
            }
        }

        String::from_utf8(bytes).map_err(|e| {
            NusError::Malformed("fst", format!("invalid name, bytes: {:x?}", e.as_bytes()))
        })
    }
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut b = [0u8; N];
    reader.read_exact(&mut b).map_err(past_end)?;
    Ok(b)
}

/// Running off the end of content 0 means the table itself is malformed.
fn past_end(e: io::Error) -> NusError {
    match NusError::from(e) {
        NusError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            NusError::Malformed("fst", "table runs past the end of its content".to_string())
        }
        NusError::SeekOutOfRange(target, length) => NusError::Malformed(
            "fst",
            format!("offset `{target}` is past the end of its content (length: `{length}`)"),
        ),
        other => other,
    }
}
