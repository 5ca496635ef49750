//! File-backed stores for the whitelist and the blocked-address set.
//!
//! Both stores are plain text, one address per line. The whitelist is
//! loaded once at startup; the blocked set is reloaded at the start of
//! every pipeline pass and saved after updates, so it survives process
//! restarts.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Addresses exempt from both alerting and blocking.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    addresses: HashSet<String>,
}

impl Whitelist {
    /// Load from a plain-text file. Blank lines and `#` comments are
    /// ignored; everything else is an exact-match address.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let contents = fs::read_to_string(path).map_err(|source| PersistenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let addresses = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Ok(Whitelist { addresses })
    }

    pub fn from_addresses<I: IntoIterator<Item = String>>(addresses: I) -> Self {
        Whitelist {
            addresses: addresses.into_iter().collect(),
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Durable, ordered set of addresses already blocked at the firewall.
///
/// An address appears at most once; the ordering makes saved files and
/// report listings stable.
#[derive(Debug, Clone, Default)]
pub struct BlockedSet {
    addresses: BTreeSet<String>,
}

impl BlockedSet {
    /// Load from disk. A store file that does not exist yet is an empty set.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(BlockedSet {
                addresses: contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BlockedSet::default()),
            Err(source) => Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Persist the full set, one address per line.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| PersistenceError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        let mut contents = self
            .addresses
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        fs::write(path, contents).map_err(|source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    /// Returns false if the address was already present.
    pub fn insert(&mut self, address: String) -> bool {
        self.addresses.insert(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.addresses.iter()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}
