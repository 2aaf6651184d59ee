//! Builders for synthetic encrypted packages used across the unit tests.

use std::fs;
use std::path::Path;

use crate::content::{DATA_BLOCK_SIZE, HASH_BLOCK_SIZE};
use crate::content::hashed::{HASH_SIZE, HASH_TABLE_SIZE};
use crate::crypto::{encrypt_cbc, sha1, ZERO_IV};
use crate::title::{encrypt_title_key, ContentRecord};

pub const TEST_COMMON_KEY: [u8; 16] = *b"not-a-common-key";
pub const TEST_TITLE_KEY: [u8; 16] = *b"fixture-titlekey";
pub const DATA_CONTENT_ID: u32 = 0x1f;

/// Deterministic, non-repeating-per-block filler.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(2_654_435_761).rotate_left(seed as u32) as u8 ^ seed)
        .collect()
}

pub fn build_tmd(title_id: u64, title_version: u16, records: &[ContentRecord]) -> Vec<u8> {
    let mut tmd = vec![0u8; 0xb04 + records.len() * 0x24];
    tmd[0x18c..0x194].copy_from_slice(&title_id.to_be_bytes());
    tmd[0x1dc..0x1de].copy_from_slice(&title_version.to_be_bytes());
    tmd[0x1de..0x1e0].copy_from_slice(&(records.len() as u16).to_be_bytes());
    for (i, r) in records.iter().enumerate() {
        let at = 0xb04 + i * 0x24;
        tmd[at..at + 4].copy_from_slice(&r.id.to_be_bytes());
        tmd[at + 4..at + 6].copy_from_slice(&r.index.to_be_bytes());
        tmd[at + 6..at + 8].copy_from_slice(&r.ty.to_be_bytes());
        tmd[at + 8..at + 16].copy_from_slice(&r.size.to_be_bytes());
        tmd[at + 16..at + 36].copy_from_slice(&r.hash);
    }
    tmd
}

pub fn build_ticket(encrypted_title_key: &[u8; 16]) -> Vec<u8> {
    let mut ticket = vec![0u8; 0x350];
    ticket[0x1bf..0x1cf].copy_from_slice(encrypted_title_key);
    ticket
}

pub fn encrypt_plain_content(key: &[u8; 16], plain: &[u8]) -> Vec<u8> {
    let mut data = plain.to_vec();
    data.resize(plain.len().div_ceil(16) * 16, 0);
    encrypt_cbc(key, &ZERO_IV, &mut data).unwrap();
    data
}

fn hash_table(hashes: &[[u8; 20]], group: usize) -> Vec<u8> {
    let mut table = vec![0u8; HASH_TABLE_SIZE];
    for (slot, hash) in hashes.iter().skip(group * 16).take(16).enumerate() {
        table[slot * HASH_SIZE..(slot + 1) * HASH_SIZE].copy_from_slice(hash);
    }
    table
}

/// Lay `plain` out as hashed content, zero-padding to whole data blocks.
pub fn build_hashed_content(key: &[u8; 16], plain: &[u8]) -> Vec<u8> {
    let block_count = plain.len().div_ceil(DATA_BLOCK_SIZE).max(1);
    let mut data = plain.to_vec();
    data.resize(block_count * DATA_BLOCK_SIZE, 0);

    let h0: Vec<[u8; 20]> = data.chunks(DATA_BLOCK_SIZE).map(sha1).collect();
    let h1: Vec<[u8; 20]> = (0..block_count.div_ceil(16))
        .map(|g| sha1(&hash_table(&h0, g)))
        .collect();
    let h2: Vec<[u8; 20]> = (0..h1.len().div_ceil(16))
        .map(|g| sha1(&hash_table(&h1, g)))
        .collect();

    let mut out = Vec::with_capacity(block_count * 0x10000);
    for (block, chunk) in data.chunks(DATA_BLOCK_SIZE).enumerate() {
        let mut hashes = vec![0u8; HASH_BLOCK_SIZE];
        hashes[..HASH_TABLE_SIZE].copy_from_slice(&hash_table(&h0, block / 16));
        hashes[HASH_TABLE_SIZE..2 * HASH_TABLE_SIZE]
            .copy_from_slice(&hash_table(&h1, block / 256));
        hashes[2 * HASH_TABLE_SIZE..3 * HASH_TABLE_SIZE]
            .copy_from_slice(&hash_table(&h2, block / 4096));

        let mut iv = [0u8; 16];
        iv.copy_from_slice(&h0[block][..16]);
        let mut chunk = chunk.to_vec();
        encrypt_cbc(key, &iv, &mut chunk).unwrap();
        encrypt_cbc(key, &ZERO_IV, &mut hashes).unwrap();

        out.extend_from_slice(&hashes);
        out.extend_from_slice(&chunk);
    }
    out
}

pub enum FstNode {
    Dir {
        name: String,
        children: Vec<FstNode>,
    },
    File {
        name: String,
        content_index: u16,
        offset: u32,
        size: u32,
        flags: u16,
        deleted: bool,
    },
}

impl FstNode {
    pub fn dir(name: &str, children: Vec<FstNode>) -> Self {
        FstNode::Dir {
            name: name.to_string(),
            children,
        }
    }

    pub fn file(name: &str, content_index: u16, offset: u32, size: u32) -> Self {
        FstNode::File {
            name: name.to_string(),
            content_index,
            offset,
            size,
            flags: 0,
            deleted: false,
        }
    }

    pub fn with_flags(mut self, new_flags: u16) -> Self {
        if let FstNode::File { flags, .. } = &mut self {
            *flags = new_flags;
        }
        self
    }

    pub fn deleted(mut self) -> Self {
        if let FstNode::File { deleted, .. } = &mut self {
            *deleted = true;
        }
        self
    }
}

pub fn fst_entry(
    ty: u8,
    name_offset: usize,
    offset: u32,
    size: u32,
    flags: u16,
    content_index: u16,
) -> [u8; 16] {
    let mut e = [0u8; 16];
    e[..4].copy_from_slice(&(((ty as u32) << 24) | name_offset as u32).to_be_bytes());
    e[4..8].copy_from_slice(&offset.to_be_bytes());
    e[8..12].copy_from_slice(&size.to_be_bytes());
    e[12..14].copy_from_slice(&flags.to_be_bytes());
    e[14..16].copy_from_slice(&content_index.to_be_bytes());
    e
}

fn flatten(nodes: &[FstNode], parent: usize, entries: &mut Vec<[u8; 16]>, names: &mut Vec<u8>) {
    for node in nodes {
        let name_offset = names.len();
        match node {
            FstNode::Dir { name, children } => {
                names.extend_from_slice(name.as_bytes());
                names.push(0);
                let index = entries.len();
                entries.push([0; 16]);
                flatten(children, index, entries, names);
                let end = entries.len() as u32;
                entries[index] = fst_entry(0x01, name_offset, parent as u32, end, 0, 0);
            }
            FstNode::File {
                name,
                content_index,
                offset,
                size,
                flags,
                deleted,
            } => {
                names.extend_from_slice(name.as_bytes());
                names.push(0);
                let ty = if *deleted { 0x80 } else { 0x00 };
                entries.push(fst_entry(ty, name_offset, *offset, *size, *flags, *content_index));
            }
        }
    }
}

pub fn build_fst(offset_factor: u32, secondary_headers: u32, nodes: &[FstNode]) -> Vec<u8> {
    let mut out = vec![];
    out.extend_from_slice(b"FST\0");
    out.extend_from_slice(&offset_factor.to_be_bytes());
    out.extend_from_slice(&secondary_headers.to_be_bytes());
    out.extend_from_slice(&[0; 20]);
    for i in 0..secondary_headers {
        let mut header = [0u8; 0x20];
        header[8..16].copy_from_slice(&(0x0005000010101d00u64 + i as u64).to_be_bytes());
        header[16..20].copy_from_slice(&0x400u32.to_be_bytes());
        out.extend_from_slice(&header);
    }

    let mut entries = vec![[0u8; 16]];
    let mut names = vec![0u8];
    flatten(nodes, 0, &mut entries, &mut names);
    entries[0] = fst_entry(0x01, 0, 0, entries.len() as u32, 0, 0);

    for e in &entries {
        out.extend_from_slice(e);
    }
    out.extend_from_slice(&names);
    out
}

fn insert_file(nodes: &mut Vec<FstNode>, parts: &[&str], file: FstNode) {
    if parts.len() <= 1 {
        nodes.push(file);
        return;
    }
    let index = nodes
        .iter()
        .position(|n| matches!(n, FstNode::Dir { name, .. } if name == parts[0]))
        .unwrap_or_else(|| {
            nodes.push(FstNode::dir(parts[0], vec![]));
            nodes.len() - 1
        });
    if let FstNode::Dir { children, .. } = &mut nodes[index] {
        insert_file(children, &parts[1..], file);
    }
}

/// A package whose files all live in content 1 (id [`DATA_CONTENT_ID`]).
pub struct PackageFixture<'a> {
    pub title_id: u64,
    pub title_version: u16,
    pub files: Vec<(&'a str, Vec<u8>)>,
    pub deleted: Vec<&'a str>,
    pub hashed: bool,
    pub offset_factor: u32,
}

impl<'a> PackageFixture<'a> {
    pub fn new(title_id: u64, files: Vec<(&'a str, Vec<u8>)>) -> Self {
        Self {
            title_id,
            title_version: 0,
            files,
            deleted: vec![],
            hashed: true,
            offset_factor: 0x20,
        }
    }

    pub fn write(&self, dir: &Path) {
        let factor = self.offset_factor as usize;
        let mut nodes = vec![];
        let mut blob = vec![];
        for (path, data) in &self.files {
            blob.resize(blob.len().div_ceil(factor) * factor, 0);
            let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
            let name = parts.last().copied().unwrap_or_default();
            let node = FstNode::file(name, 1, (blob.len() / factor) as u32, data.len() as u32);
            insert_file(&mut nodes, &parts, node);
            blob.extend_from_slice(data);
        }
        for path in &self.deleted {
            let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
            let name = parts.last().copied().unwrap_or_default();
            insert_file(&mut nodes, &parts, FstNode::file(name, 1, 0, 0).deleted());
        }
        let fst = build_fst(self.offset_factor, 1, &nodes);

        let data_file = if self.hashed {
            build_hashed_content(&TEST_TITLE_KEY, &blob)
        } else {
            encrypt_plain_content(&TEST_TITLE_KEY, &blob)
        };

        let records = [
            ContentRecord {
                id: 0,
                index: 0,
                ty: 0x2001,
                size: fst.len() as u64,
                hash: sha1(&fst),
            },
            ContentRecord {
                id: DATA_CONTENT_ID,
                index: 1,
                ty: if self.hashed { 0x2003 } else { 0x2001 },
                size: (if self.hashed { data_file.len() } else { blob.len() }) as u64,
                hash: if self.hashed { [0; 20] } else { sha1(&blob) },
            },
        ];
        let encrypted_key =
            encrypt_title_key(&TEST_COMMON_KEY, &TEST_TITLE_KEY, self.title_id).unwrap();

        fs::write(dir.join("tmd"), build_tmd(self.title_id, self.title_version, &records)).unwrap();
        fs::write(dir.join("cetk"), build_ticket(&encrypted_key)).unwrap();
        fs::write(dir.join("00000000"), encrypt_plain_content(&TEST_TITLE_KEY, &fst)).unwrap();
        fs::write(dir.join(format!("{DATA_CONTENT_ID:08x}")), data_file).unwrap();
    }
}
