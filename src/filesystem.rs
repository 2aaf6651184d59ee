//! A base package with an optional update layered over it.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::config::{CommonKey, OpenOptions};
use crate::error::{NusError, Result};
use crate::package::ContentPackage;

/// Which package a path resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    Base,
    Update,
}

/// Open a base package and, if given, an update layered over it.
pub fn open_package(
    base: &Path,
    update: Option<&Path>,
    common_key: &[u8],
) -> Result<NusFilesystem> {
    NusFilesystem::open(base, update, common_key)
}

pub struct NusFilesystem {
    base: ContentPackage,
    update: Option<ContentPackage>,
    files: HashMap<String, Source>,
}

impl NusFilesystem {
    pub fn open(base: impl AsRef<Path>, update: Option<&Path>, common_key: &[u8]) -> Result<Self> {
        Self::open_with(base, update, &OpenOptions::new(CommonKey::from_slice(common_key)?))
    }

    pub fn open_with(
        base: impl AsRef<Path>,
        update: Option<&Path>,
        options: &OpenOptions,
    ) -> Result<Self> {
        let base = ContentPackage::open_with(base, options)?;
        let update = update
            .map(|dir| ContentPackage::open_with(dir, options))
            .transpose()?;
        Ok(Self::from_packages(base, update))
    }

    pub fn from_packages(base: ContentPackage, update: Option<ContentPackage>) -> Self {
        let mut files: HashMap<String, Source> = base
            .files()
            .iter()
            .map(|path| (path.clone(), Source::Base))
            .collect();

        if let Some(update) = &update {
            if update.title_id() & !0xf_0000_0000 != base.title_id() & !0xf_0000_0000 {
                debug!(
                    base = %format!("{:016x}", base.title_id()),
                    update = %format!("{:016x}", update.title_id()),
                    "update title id does not match base"
                );
            }
            let mut overridden = 0usize;
            for path in update.files() {
                if files.insert(path.clone(), Source::Update).is_some() {
                    overridden += 1;
                }
            }
            info!(
                files = update.files().len(),
                overridden, "layered update over base"
            );
        }

        Self {
            base,
            update,
            files,
        }
    }

    pub fn base(&self) -> &ContentPackage {
        &self.base
    }

    pub fn update(&self) -> Option<&ContentPackage> {
        self.update.as_ref()
    }

    /// Every visible path across both packages, each once, sorted.
    pub fn list_files(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.files.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn source(&self, path: &str) -> Option<Source> {
        self.files.get(path).copied()
    }

    pub fn file_size(&self, path: &str) -> Result<u64> {
        Ok(self.package_for(path)?.entry(path)?.size as u64)
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.package_for(path)?.read_file(path)
    }

    fn package_for(&self, path: &str) -> Result<&ContentPackage> {
        match self.source(path) {
            Some(Source::Base) => Ok(&self.base),
            Some(Source::Update) => self
                .update
                .as_ref()
                .ok_or_else(|| NusError::NotFound(format!("update package for `{path}`"))),
            None => Err(NusError::NotFound(format!("file `{path}`"))),
        }
    }
}
