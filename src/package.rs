//! One package directory: TMD, ticket and the content files it lists.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::{CommonKey, OpenOptions};
use crate::content::{ContentStream, HashedContentStream, PlainContentBuffer};
use crate::error::{NusError, Result};
use crate::fst::{Fst, FstFileEntry};
use crate::title::{decrypt_title_key, Ticket, TitleMetadata};

const TMD_PATTERN: &str = "tm*";
const TICKET_NAME: &str = "cetk";

pub struct ContentPackage {
    path: PathBuf,
    tmd: TitleMetadata,
    // One lock per content index: a stream's position and block cache are shared state.
    contents: Vec<Mutex<ContentStream>>,
    fst: Fst,
    files: Vec<String>,
}

impl ContentPackage {
    pub fn open(dir: impl AsRef<Path>, common_key: &[u8]) -> Result<Self> {
        Self::open_with(dir, &OpenOptions::new(CommonKey::from_slice(common_key)?))
    }

    pub fn open_with(dir: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let dir = dir.as_ref();

        let tmd_path = find_tmd(dir)?;
        let tmd = TitleMetadata::parse(&read_required(&tmd_path, "title metadata")?)?;
        let ticket = Ticket::parse(&read_required(&dir.join(TICKET_NAME), "ticket")?)?;
        let title_key = decrypt_title_key(
            options.common_key.as_bytes(),
            &ticket.encrypted_title_key,
            tmd.title_id,
        )?;

        info!(
            path = %dir.display(),
            title_id = %format!("{:016x}", tmd.title_id),
            title_version = tmd.title_version,
            contents = tmd.contents.len(),
            "opening package"
        );

        let mut contents = Vec::with_capacity(tmd.contents.len());
        for (index, record) in tmd.contents.iter().enumerate() {
            let path = dir.join(record.file_name());
            let file = File::open(&path).map_err(|e| not_found(e, "content", &path))?;

            let stream = if record.is_hashed() {
                ContentStream::Hashed(HashedContentStream::new(file, title_key)?)
            } else {
                let buffer = PlainContentBuffer::new(file, &title_key)?;
                if options.verify_plain_contents {
                    buffer.verify(index, record.size, &record.hash)?;
                }
                ContentStream::Plain(buffer)
            };

            debug!(
                index,
                id = %record.file_name(),
                hashed = stream.is_hashed(),
                length = stream.len(),
                "opened content"
            );
            contents.push(Mutex::new(stream));
        }

        // The FST is always content 0.
        let fst = {
            let first = contents.first().ok_or_else(|| {
                NusError::Malformed("tmd", "title has no content records".to_string())
            })?;
            let mut stream = first.lock();
            Fst::parse(&mut *stream)?
        };

        for (path, entry) in fst.entries() {
            if !entry.deleted && entry.content_index as usize >= contents.len() {
                return Err(NusError::InvalidContentIndex(
                    path.to_string(),
                    entry.content_index as usize,
                    contents.len(),
                ));
            }
        }

        let mut files: Vec<String> = fst.visible_paths().map(str::to_string).collect();
        files.sort();
        info!(path = %dir.display(), files = files.len(), "package ready");

        Ok(Self {
            path: dir.to_path_buf(),
            tmd,
            contents,
            fst,
            files,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn title_id(&self) -> u64 {
        self.tmd.title_id
    }

    pub fn title_version(&self) -> u16 {
        self.tmd.title_version
    }

    pub fn content_count(&self) -> usize {
        self.contents.len()
    }

    pub fn fst(&self) -> &Fst {
        &self.fst
    }

    /// Visible (not deleted) paths, sorted.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn entry(&self, path: &str) -> Result<&FstFileEntry> {
        let entry = self
            .fst
            .entry(path)
            .ok_or_else(|| NusError::NotFound(format!("file `{path}`")))?;
        if entry.deleted {
            return Err(NusError::Deleted(path.to_string()));
        }
        Ok(entry)
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let entry = self.entry(path)?;
        let index = entry.content_index as usize;
        let content = self.contents.get(index).ok_or_else(|| {
            NusError::InvalidContentIndex(path.to_string(), index, self.contents.len())
        })?;

        let offset = entry.byte_offset(self.fst.offset_factor());
        let mut stream = content.lock();
        stream.read_at(offset, entry.size as usize)
    }
}

fn find_tmd(dir: &Path) -> Result<PathBuf> {
    let pattern = Pattern::new(TMD_PATTERN)
        .map_err(|e| NusError::Malformed("tmd pattern", e.to_string()))?;

    let mut candidates = vec![];
    for entry in fs::read_dir(dir).map_err(|e| not_found(e, "package directory", dir))? {
        let entry = entry?;
        // Names vary: "tmd", "tmd.16", ...
        if entry.file_type()?.is_file() && pattern.matches(&entry.file_name().to_string_lossy()) {
            candidates.push(entry.path());
        }
    }
    candidates.sort();

    candidates.into_iter().next().ok_or_else(|| {
        NusError::NotFound(format!("title metadata (`{TMD_PATTERN}`) in `{}`", dir.display()))
    })
}

fn read_required(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| not_found(e, what, path))
}

fn not_found(e: io::Error, what: &str, path: &Path) -> NusError {
    if e.kind() == io::ErrorKind::NotFound {
        NusError::NotFound(format!("{what} `{}`", path.display()))
    } else {
        e.into()
    }
}
