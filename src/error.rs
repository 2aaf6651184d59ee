use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NusError>;

#[derive(Error, Debug)]
pub enum NusError {
    #[error("unexpected {0} magic (expected: `{1}`, got: `{2}`)")]
    BadMagic(&'static str, String, String),
    #[error("malformed {0}: {1}")]
    Malformed(&'static str, String),
    #[error("unexpected {0} size (expected: `{1}`, got: `{2}`)")]
    UnexpectedSize(&'static str, usize, usize),
    #[error("could not decrypt data")]
    CouldNotDecrypt,
    #[error("duplicate path in file system table: `{0}`")]
    DuplicatePath(String),
    #[error("file `{0}` refers to content index `{1}` but only `{2}` content(s) are present")]
    InvalidContentIndex(String, usize, usize),
    #[error("h{0} hash mismatch in block `{1}`")]
    HashMismatch(u8, u64),
    #[error("unexpected content {0} hash (expected: `{1}`, got: `{2}`)")]
    ContentHashMismatch(usize, String, String),
    #[error("could not find {0}")]
    NotFound(String),
    #[error("file `{0}` is marked as not in package")]
    Deleted(String),
    #[error("hash level `{0}` verification not supported")]
    UnsupportedHashLevel(u8),
    #[error("stream is read-only")]
    ReadOnly,
    #[error("attempted to seek to `{0}` outside of stream (length: `{1}`)")]
    SeekOutOfRange(i128, u64),
    #[error("attempted to read `{0}` byte(s) out of bounds (position: `{1}`, length: `{2}`)")]
    ReadOutOfRange(usize, u64, u64),
    #[error(transparent)]
    Io(io::Error),
}

/// Coarse classification of [`NusError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad magic or malformed structural fields.
    Format,
    /// A hash did not match; the data is corrupt or has been tampered with.
    Integrity,
    /// A required package file, or a requested path, does not exist.
    NotFound,
    /// The operation is outside what the read-only streams support.
    Unsupported,
    /// The underlying storage failed.
    Io,
}

impl NusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NusError::BadMagic(..)
            | NusError::Malformed(..)
            | NusError::UnexpectedSize(..)
            | NusError::CouldNotDecrypt
            | NusError::DuplicatePath(_)
            | NusError::InvalidContentIndex(..) => ErrorKind::Format,
            NusError::HashMismatch(..) | NusError::ContentHashMismatch(..) => {
                ErrorKind::Integrity
            }
            NusError::NotFound(_) | NusError::Deleted(_) => ErrorKind::NotFound,
            NusError::UnsupportedHashLevel(_)
            | NusError::ReadOnly
            | NusError::SeekOutOfRange(..)
            | NusError::ReadOutOfRange(..) => ErrorKind::Unsupported,
            NusError::Io(e) if e.kind() == io::ErrorKind::NotFound => ErrorKind::NotFound,
            NusError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<io::Error> for NusError {
    fn from(e: io::Error) -> Self {
        // Errors that went through the `Read`/`Seek` impls come back as their original variant.
        if !e.get_ref().is_some_and(|inner| inner.is::<NusError>()) {
            return NusError::Io(e);
        }
        match e.into_inner().map(|inner| inner.downcast::<NusError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => NusError::Io(io::Error::other(other)),
            None => NusError::Io(io::Error::other("empty error")),
        }
    }
}

impl From<NusError> for io::Error {
    fn from(e: NusError) -> Self {
        match e {
            NusError::Io(inner) => inner,
            other => {
                let kind = match other {
                    NusError::ReadOnly | NusError::UnsupportedHashLevel(_) => {
                        io::ErrorKind::Unsupported
                    }
                    NusError::SeekOutOfRange(..) | NusError::ReadOutOfRange(..) => {
                        io::ErrorKind::InvalidInput
                    }
                    NusError::NotFound(_) | NusError::Deleted(_) => io::ErrorKind::NotFound,
                    _ => io::ErrorKind::InvalidData,
                };
                io::Error::new(kind, other)
            }
        }
    }
}
