/// Cold-start path: rebuilding the SED and PDZ provider pools from the data
/// file ids the index references.
///
/// The pools are dense vectors where slot `i` holds file `i + 1`. They cover
/// every id from 1 to the highest id in use, so file 1 is always opened even
/// on a store that never had a write.
use anyhow::{Context, Result};
use pdz::PdzDataProvider;
use sed::SedDataProvider;
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::warn;

use crate::{pdz_file_name, sed_file_name, ReferenceSample};

/// Creates `path` if it does not exist, leaving existing content untouched.
///
/// New files get default permissions, so the process umask applies.
pub fn touch(path: &Path) -> Result<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    Ok(())
}

/// File ids a pool must hold given the ids referenced by the index.
pub(crate) fn pool_range(files: &BTreeSet<u16>) -> RangeInclusive<u16> {
    let last = files.last().copied().unwrap_or(1).max(1);
    1..=last
}

impl ReferenceSample {
    pub(crate) fn open_sed_pool(root: &Path, files: &BTreeSet<u16>) -> Result<Vec<SedDataProvider>> {
        pool_range(files)
            .map(|file| {
                let path = root.join(sed_file_name(file));
                SedDataProvider::open(&path)
                    .with_context(|| format!("failed to open SED data file {}", path.display()))
            })
            .collect()
    }

    pub(crate) fn open_pdz_pool(root: &Path, files: &BTreeSet<u16>) -> Result<Vec<PdzDataProvider>> {
        pool_range(files)
            .map(|file| {
                let path = root.join(pdz_file_name(file));
                PdzDataProvider::open(&path)
                    .with_context(|| format!("failed to open PDZ data file {}", path.display()))
            })
            .collect()
    }

    /// Warns if the files of a pool disagree on the PDZ bin axis. Stores
    /// written by this crate never do; the check is for foreign stores.
    pub(crate) fn check_pdz_axes(pool: &[PdzDataProvider]) {
        let mut axes = pool.iter().filter(|p| !p.bins().is_empty());
        if let Some(first) = axes.next() {
            for other in axes {
                if other.bins() != first.bins() {
                    warn!(
                        "PDZ file {} uses a different bin axis than {}",
                        other.path().display(),
                        first.path().display()
                    );
                }
            }
        }
    }
}
