//! Common key provisioning and options for opening packages.
//!
//! The common key is never bundled. Hosts supply it as raw bytes, a hex
//! string, a `name = hex` keys file, or through the environment:
//!
//! * `NUS_COMMON_KEY` - the key as 32 hex characters
//! * `NUS_KEYS_FILE` - path to a keys file containing `wiiu_common_key = ...`

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{NusError, Result};

pub const COMMON_KEY_ENV: &str = "NUS_COMMON_KEY";
pub const KEYS_FILE_ENV: &str = "NUS_KEYS_FILE";

const KEY_NAMES: [&str; 2] = ["wiiu_common_key", "common_key"];

#[derive(Clone, PartialEq, Eq)]
pub struct CommonKey([u8; 16]);

impl CommonKey {
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        key.try_into()
            .map(CommonKey)
            .map_err(|_| NusError::UnexpectedSize("common key", 16, key.len()))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| NusError::Malformed("common key", e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Load the key from a keys file. Lines are `name = hex`; `;` and `#` start comments.
    pub fn from_keys_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            let Some((name, value)) = line.split_once('=') else {
                continue;
            };
            if KEY_NAMES.contains(&name.trim()) {
                return Self::from_hex(value);
            }
        }

        Err(NusError::NotFound(format!(
            "common key in keys file `{}`",
            path.display()
        )))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(hex) = var(COMMON_KEY_ENV) {
            return Self::from_hex(&hex);
        }
        if let Some(path) = var(KEYS_FILE_ENV) {
            return Self::from_keys_file(path);
        }
        Err(NusError::NotFound(format!(
            "common key (set `{COMMON_KEY_ENV}` or `{KEYS_FILE_ENV}`)"
        )))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl FromStr for CommonKey {
    type Err = NusError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for CommonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CommonKey(..)")
    }
}

#[derive(Clone, Debug)]
pub struct OpenOptions {
    pub common_key: CommonKey,
    /// Check each plain content against its TMD digest while opening.
    pub verify_plain_contents: bool,
}

impl OpenOptions {
    pub fn new(common_key: CommonKey) -> Self {
        Self {
            common_key,
            verify_plain_contents: false,
        }
    }

    pub fn verify_plain_contents(mut self, verify: bool) -> Self {
        self.verify_plain_contents = verify;
        self
    }
}
