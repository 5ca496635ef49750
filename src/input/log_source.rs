use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Conventional auth-log locations, probed in order when no explicit
/// path is configured. First existing file wins.
const DEFAULT_LOCATIONS: [&str; 3] = [
    "/var/log/auth.log",
    "/var/log/secure",
    "/var/log/messages",
];

/// Errors that can occur while locating or reading the log
#[derive(Error, Debug)]
pub enum InputError {
    #[error("log file not found: {0}")]
    NotFound(PathBuf),

    #[error("no authentication log found in any conventional location")]
    NoDefaultLog,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Access to the authentication log being monitored
pub struct LogSource {
    path: PathBuf,
}

impl LogSource {
    /// Resolve the log path at startup.
    ///
    /// An explicit path that does not exist or cannot be read is a fatal
    /// configuration error; without one, the conventional locations are
    /// probed in order and the first existing file wins (and must then
    /// be readable).
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, InputError> {
        match explicit {
            Some(path) if path.exists() => Self::open_checked(path),
            Some(path) => Err(InputError::NotFound(path.to_path_buf())),
            None => DEFAULT_LOCATIONS
                .iter()
                .map(Path::new)
                .find(|p| p.exists())
                .ok_or(InputError::NoDefaultLog)
                .and_then(Self::open_checked),
        }
    }

    /// Prove the file is actually readable before monitoring starts, so
    /// a permissions problem or a directory surfaces here rather than as
    /// a failure on every daemon pass.
    fn open_checked(path: &Path) -> Result<Self, InputError> {
        let mut file = fs::File::open(path).map_err(|source| InputError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut probe = [0u8; 1];
        std::io::Read::read(&mut file, &mut probe).map_err(|source| InputError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(LogSource {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the entire log as text.
    ///
    /// Every pass re-scans the whole file; there is no persisted read
    /// cursor (see `WindowAggregator` for the counting caveat).
    pub fn read_all(&self) -> Result<String, InputError> {
        fs::read_to_string(&self.path).map_err(|source| InputError::Read {
            path: self.path.clone(),
            source,
        })
    }
}
