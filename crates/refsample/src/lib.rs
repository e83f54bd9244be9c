//! # Reference Sample store
//!
//! Persists, for a large population of objects identified by an `i64` id,
//! one SED and one PDZ curve each, plus the index that maps every id to the
//! physical location of its data. Built on the [`sed`], [`pdz`] and
//! [`index`] crates.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌──────────────────────────────────────────────────────┐
//! │                  REFERENCE SAMPLE                    │
//! │                                                      │
//! │ write.rs → index lookup (must be UNSET)              │
//! │              |                                       │
//! │              |  (last file >= max_file_size?)        │
//! │              |            yes → new data file        │
//! │              v                                       │
//! │           append record → index.set_location()       │
//! │                                                      │
//! │ read.rs → index lookup → provider[file - 1]          │
//! │            → read record → check stored id           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module        | Purpose                                                 |
//! |---------------|---------------------------------------------------------|
//! | `lib.rs`      | `ReferenceSample` struct, `create`, `open`, accessors   |
//! | [`recovery`]  | rebuilding the data file pools from the index           |
//! | [`write`]     | `create_object()`, `add_sed_data()`, `add_pdz_data()`   |
//! | [`read`]      | `get_sed_data()`, `get_pdz_data()`                      |
//! | [`optimize`]  | post-load maintenance: fsync + index sort               |
//!
//! ## Directory layout
//!
//! ```text
//! <root>/index.bin
//! <root>/sed_data_1.bin  sed_data_2.bin  ...
//! <root>/pdz_data_1.bin  pdz_data_2.bin  ...
//! ```
//!
//! ## Crash Safety
//!
//! A write appends the data record first and updates the index last. A
//! crash in between leaves an orphan record that nothing references, never
//! an index entry pointing at missing data. With [`ReferenceSample::set_sync`]
//! enabled both steps are fsynced in that order.
//!
//! ## Concurrency
//!
//! The store is single-writer and fully synchronous. Threads sharing one
//! instance must serialize mutating calls themselves, e.g. with a `Mutex`.
mod optimize;
mod read;
mod recovery;
mod write;

use anyhow::{ensure, Context, Result};
use index::IndexProvider;
use pdz::PdzDataProvider;
use sed::SedDataProvider;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub use index::{Dataset, ObjectLocation, RecordLocation};
pub use recovery::touch;
pub use xydataset::XYDataset;

/// Default size budget of one data file (1 GiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

/// Name of the index file within the store directory.
pub const INDEX_FILE_NAME: &str = "index.bin";

/// File name of SED data file number `file`.
pub fn sed_file_name(file: u16) -> String {
    format!("sed_data_{}.bin", file)
}

/// File name of PDZ data file number `file`.
pub fn pdz_file_name(file: u16) -> String {
    format!("pdz_data_{}.bin", file)
}

/// A reference sample: the index plus the rotating pools of SED and PDZ
/// data files.
///
/// Pools are dense: provider `i` owns data file `i + 1`. They only ever grow.
pub struct ReferenceSample {
    pub(crate) root: PathBuf,
    pub(crate) max_file_size: u64,
    pub(crate) index: IndexProvider,
    pub(crate) sed_providers: Vec<SedDataProvider>,
    pub(crate) pdz_providers: Vec<PdzDataProvider>,
    /// If `true`, every add fsyncs the data file and then the index.
    pub(crate) sync: bool,
}

impl std::fmt::Debug for ReferenceSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceSample")
            .field("root", &self.root)
            .field("max_file_size", &self.max_file_size)
            .field("objects", &self.index.size())
            .field("sed_files", &self.sed_providers.len())
            .field("pdz_files", &self.pdz_providers.len())
            .field("pdz_bins", &self.pdz_bins().len())
            .field("sync", &self.sync)
            .finish()
    }
}

impl ReferenceSample {
    /// Creates a new, empty reference sample at `path` and opens it.
    ///
    /// Fails if `path` already exists: a partial or foreign directory is
    /// never adopted. The directory, an empty index and the first (empty)
    /// SED and PDZ data files are created.
    pub fn create<P: AsRef<Path>>(path: P, max_file_size: u64) -> Result<Self> {
        let root = path.as_ref();
        ensure!(max_file_size > 0, "max_file_size must be > 0");
        ensure!(
            !root.exists(),
            "the directory already exists: {}",
            root.display()
        );

        fs::create_dir_all(root)
            .with_context(|| format!("failed to create directory {}", root.display()))?;
        IndexProvider::open(root.join(INDEX_FILE_NAME))
            .with_context(|| format!("failed to create index in {}", root.display()))?;
        touch(&root.join(sed_file_name(1)))?;
        touch(&root.join(pdz_file_name(1)))?;

        info!("created reference sample at {}", root.display());
        Self::open(root, max_file_size)
    }

    /// Opens an existing reference sample.
    ///
    /// The provider pools are rebuilt from the data file ids the index
    /// references; file 1 is always opened.
    ///
    /// # Errors
    ///
    /// Fails if the directory or its index is missing, the index is corrupt,
    /// or a data file in the pool range cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, max_file_size: u64) -> Result<Self> {
        ensure!(max_file_size > 0, "max_file_size must be > 0");
        let root = path.as_ref().to_path_buf();
        ensure!(root.is_dir(), "no reference sample at {}", root.display());

        let index_path = root.join(INDEX_FILE_NAME);
        ensure!(
            index_path.is_file(),
            "missing index {}",
            index_path.display()
        );
        let index = IndexProvider::open(&index_path)
            .with_context(|| format!("failed to open index {}", index_path.display()))?;

        let sed_providers = Self::open_sed_pool(&root, index.sed_files())?;
        let pdz_providers = Self::open_pdz_pool(&root, index.pdz_files())?;
        Self::check_pdz_axes(&pdz_providers);

        info!(
            "opened reference sample at {} ({} objects, {} SED files, {} PDZ files)",
            root.display(),
            index.size(),
            sed_providers.len(),
            pdz_providers.len()
        );

        Ok(Self {
            root,
            max_file_size,
            index,
            sed_providers,
            pdz_providers,
            sync: false,
        })
    }

    /// Number of registered objects.
    #[must_use]
    pub fn size(&self) -> usize {
        self.index.size()
    }

    /// All registered ids, in index order.
    pub fn ids(&self) -> Vec<i64> {
        self.index.ids()
    }

    /// Ids registered but without a SED yet.
    pub fn missing_seds(&self) -> Vec<i64> {
        self.index.missing_seds()
    }

    /// Ids registered but without a PDZ yet.
    pub fn missing_pdzs(&self) -> Vec<i64> {
        self.index.missing_pdzs()
    }

    /// Index metadata of one object.
    pub fn location(&self, id: i64) -> Result<ObjectLocation> {
        Ok(self.index.get_location(id)?)
    }

    /// The redshift bin axis shared by the PDZs of this store, empty if no
    /// PDZ has been written yet.
    pub fn pdz_bins(&self) -> &[f32] {
        self.pdz_providers
            .iter()
            .rev()
            .map(|p| p.bins())
            .find(|b| !b.is_empty())
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Updates the data file size budget. Only affects future rotations.
    pub fn set_max_file_size(&mut self, max_file_size: u64) -> Result<()> {
        ensure!(max_file_size > 0, "max_file_size must be > 0");
        self.max_file_size = max_file_size;
        Ok(())
    }

    #[must_use]
    pub fn sync(&self) -> bool {
        self.sync
    }

    /// Enables or disables fsync after every add.
    pub fn set_sync(&mut self, sync: bool) {
        self.sync = sync;
    }

    /// Number of SED data files in the pool.
    #[must_use]
    pub fn sed_file_count(&self) -> usize {
        self.sed_providers.len()
    }

    /// Number of PDZ data files in the pool.
    #[must_use]
    pub fn pdz_file_count(&self) -> usize {
        self.pdz_providers.len()
    }
}

#[cfg(test)]
mod tests;
