use std::io::{Seek, Write};
use std::path::Path;

use tar::{Builder, Header};
use tracing::{debug, info};
use zip::{
    write::{FileOptions, ZipWriter},
    CompressionMethod,
};

use crate::error::{NusError, Result};
use crate::filesystem::NusFilesystem;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    Zip,
}

impl ArchiveFormat {
    /// Pick the format from the output file's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(e) if e.eq_ignore_ascii_case("tar") => Ok(ArchiveFormat::Tar),
            Some(e) if e.eq_ignore_ascii_case("zip") => Ok(ArchiveFormat::Zip),
            _ => Err(NusError::Malformed(
                "output path",
                format!("`{}` does not end in .tar or .zip", path.display()),
            )),
        }
    }
}

pub enum ArchiveWriter<W: Write + Seek> {
    Zip(ZipWriter<W>),
    Tar(Builder<W>),
}

impl<W: Write + Seek> ArchiveWriter<W> {
    pub fn new(out: W, format: ArchiveFormat) -> Self {
        match format {
            ArchiveFormat::Zip => ArchiveWriter::Zip(ZipWriter::new(out)),
            ArchiveFormat::Tar => ArchiveWriter::Tar(Builder::new(out)),
        }
    }

    /// Append one file. Package paths are absolute; archive members are not.
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let path = path.trim_start_matches('/');
        match self {
            ArchiveWriter::Zip(z) => {
                let options = FileOptions::default().compression_method(CompressionMethod::Stored);
                z.start_file(path, options).map_err(zip_error)?;
                z.write_all(data)?;
            }
            ArchiveWriter::Tar(t) => {
                let mut header = Header::new_gnu();
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                t.append_data(&mut header, path, data)?;
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Result<W> {
        match self {
            ArchiveWriter::Zip(mut z) => z.finish().map_err(zip_error),
            ArchiveWriter::Tar(t) => Ok(t.into_inner()?),
        }
    }
}

/// Copy every visible file of `fs` into `writer`, in path order.
pub fn extract_all<W: Write + Seek>(
    fs: &NusFilesystem,
    writer: &mut ArchiveWriter<W>,
) -> Result<usize> {
    let paths = fs.list_files();
    for path in &paths {
        let data = fs.read_file(path)?;
        debug!(path, size = data.len(), source = ?fs.source(path), "extracting");
        writer.write_file(path, &data)?;
    }
    info!(files = paths.len(), "extraction complete");
    Ok(paths.len())
}

fn zip_error(e: zip::result::ZipError) -> NusError {
    match e {
        zip::result::ZipError::Io(e) => e.into(),
        other => NusError::Malformed("zip archive", other.to_string()),
    }
}
