//! Runtime configuration of a reference sample store.
//!
//! All settings come from environment variables:
//!
//! ```text
//! REFSAMPLE_PATH         store root directory           (default: "refsample")
//! REFSAMPLE_MAX_FILE_KB  data file budget in KiB        (default: 1048576 = 1 GiB)
//! REFSAMPLE_OVERWRITE    wipe an existing store first   (default: "false")
//! REFSAMPLE_SYNC         fsync data and index per write (default: "false")
//! ```
//!
//! A variable that is set but cannot be parsed is an error.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_PATH: &str = "REFSAMPLE_PATH";
pub const ENV_MAX_FILE_KB: &str = "REFSAMPLE_MAX_FILE_KB";
pub const ENV_OVERWRITE: &str = "REFSAMPLE_OVERWRITE";
pub const ENV_SYNC: &str = "REFSAMPLE_SYNC";

pub const DEFAULT_PATH: &str = "refsample";
pub const DEFAULT_MAX_FILE_KB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSampleConfig {
    /// Root directory of the store.
    pub path: PathBuf,
    /// Data file rotation budget in bytes.
    pub max_file_size: u64,
    /// Remove an existing store before opening.
    pub overwrite: bool,
    /// Fsync the data file and then the index after every add.
    pub sync: bool,
}

impl Default for RefSampleConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            max_file_size: DEFAULT_MAX_FILE_KB * 1024,
            overwrite: false,
            sync: false,
        }
    }
}

impl RefSampleConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary key lookup. Keys for
    /// which `lookup` returns `None` take their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(path) = lookup(ENV_PATH) {
            cfg.path = PathBuf::from(path);
        }
        if let Some(kb) = parse_var::<u64>(&lookup, ENV_MAX_FILE_KB)? {
            cfg.max_file_size = kb
                .checked_mul(1024)
                .with_context(|| format!("{}={} overflows", ENV_MAX_FILE_KB, kb))?;
        }
        if let Some(overwrite) = parse_var::<bool>(&lookup, ENV_OVERWRITE)? {
            cfg.overwrite = overwrite;
        }
        if let Some(sync) = parse_var::<bool>(&lookup, ENV_SYNC)? {
            cfg.sync = sync;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            bail!("{} must not be empty", ENV_PATH);
        }
        if self.max_file_size == 0 {
            bail!("{} must be > 0", ENV_MAX_FILE_KB);
        }
        Ok(())
    }

    /// Removes the store directory if `overwrite` is set and it exists.
    /// Returns whether anything was removed.
    pub fn clear_target(&self) -> Result<bool> {
        if !self.overwrite || !self.path.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&self.path)
            .with_context(|| format!("failed to remove {}", self.path.display()))?;
        Ok(true)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
    }
}
