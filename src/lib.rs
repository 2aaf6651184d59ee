//! Read-only access to the file tree of Wii U NUS title packages.
//!
//! A package directory holds a title metadata file (`tmd`), a ticket (`cetk`)
//! and one encrypted file per content record. [`open_package`] decrypts a base
//! package and an optional update and exposes them as one path namespace.

pub mod archive;
pub mod config;
pub mod content;
mod crypto;
pub mod error;
pub mod filesystem;
pub mod fst;
pub mod package;
mod reader;
pub mod title;

#[cfg(test)]
mod test_support;

pub use config::{CommonKey, OpenOptions};
pub use error::{ErrorKind, NusError, Result};
pub use filesystem::{open_package, NusFilesystem, Source};
pub use package::ContentPackage;
