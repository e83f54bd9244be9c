//! # Index - object id to data location mapping
//!
//! The index is the single source of truth of a reference sample: it knows
//! every registered object, where its SED and PDZ records live, and through
//! that which data files are in use.
//!
//! ## File Format
//!
//! `index.bin` is a flat array of fixed-width rows, one per object, in
//! registration order (see [`entry`] for the row layout). Creating an object
//! appends a row; recording a write rewrites the location fields of one row
//! in place. The whole file is loaded into memory on open.
//!
//! ## Object lifecycle
//!
//! ```text
//! create_object(id) ──> SED: UNSET ──set_location──> SED: SET
//!                       PDZ: UNSET ──set_location──> PDZ: SET
//! ```
//!
//! Both transitions are one-way. Objects are never removed.

mod entry;

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use entry::{INDEX_ENTRY_BYTES, LOCATION_FIELDS_OFFSET};
use entry::{decode_row, encode_locations, encode_row, IndexEntry};

/// The two datasets kept per object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Sed,
    Pdz,
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dataset::Sed => write!(f, "SED"),
            Dataset::Pdz => write!(f, "PDZ"),
        }
    }
}

/// Where one record lives: data file id (starting at 1) and byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordLocation {
    pub file: u16,
    pub offset: u64,
}

/// Location metadata of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectLocation {
    /// Row of this object inside the index. Owned by the index: ignored by
    /// [`IndexProvider::set_location`].
    pub index_position: usize,
    pub sed: Option<RecordLocation>,
    pub pdz: Option<RecordLocation>,
}

impl ObjectLocation {
    pub fn get(&self, dataset: Dataset) -> Option<RecordLocation> {
        match dataset {
            Dataset::Sed => self.sed,
            Dataset::Pdz => self.pdz,
        }
    }

    pub fn set(&mut self, dataset: Dataset, loc: RecordLocation) {
        match dataset {
            Dataset::Sed => self.sed = Some(loc),
            Dataset::Pdz => self.pdz = Some(loc),
        }
    }
}

/// Errors that can occur while loading or updating the index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The index file is malformed.
    #[error("corrupt index {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The object has not been created.
    #[error("could not find index entry for {0}")]
    UnknownId(i64),

    /// `create_object` was called twice for the same id.
    #[error("the object {0} already exists on the index")]
    DuplicateId(i64),

    /// The location cannot be represented on disk.
    #[error("invalid location for object {id}: {reason}")]
    InvalidLocation { id: i64, reason: String },

    /// The dataset already has a location that differs from the new one.
    #[error("{dataset} for object {id} is already set")]
    AlreadySet { id: i64, dataset: Dataset },
}

/// Durable id -> location map backed by `index.bin`.
pub struct IndexProvider {
    path: PathBuf,
    file: File,
    /// Object id -> row number.
    positions: HashMap<i64, usize>,
    /// Rows, in file order.
    entries: Vec<IndexEntry>,
    sed_files: BTreeSet<u16>,
    pdz_files: BTreeSet<u16>,
    buf: Vec<u8>,
}

impl std::fmt::Debug for IndexProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexProvider")
            .field("path", &self.path)
            .field("objects", &self.entries.len())
            .field("sed_files", &self.sed_files)
            .field("pdz_files", &self.pdz_files)
            .finish()
    }
}

impl IndexProvider {
    /// Loads the index at `path`, or creates an empty one if the file does
    /// not exist.
    ///
    /// A new file is created with default permissions, so the process umask
    /// applies.
    ///
    /// # Errors
    ///
    /// `Corrupt` if the file length is not a whole number of rows, a row
    /// holds an impossible location, or an id appears twice.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)?;
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        if bytes.len() as u64 % INDEX_ENTRY_BYTES != 0 {
            return Err(IndexError::Corrupt {
                path,
                reason: format!(
                    "size {} is not a multiple of {} bytes",
                    bytes.len(),
                    INDEX_ENTRY_BYTES
                ),
            });
        }

        let mut entries = Vec::with_capacity(bytes.len() / INDEX_ENTRY_BYTES as usize);
        for row in bytes.chunks_exact(INDEX_ENTRY_BYTES as usize) {
            let entry = decode_row(row).map_err(|reason| IndexError::Corrupt {
                path: path.clone(),
                reason,
            })?;
            entries.push(entry);
        }

        let mut index = Self {
            path,
            file,
            positions: HashMap::with_capacity(entries.len()),
            entries: Vec::new(),
            sed_files: BTreeSet::new(),
            pdz_files: BTreeSet::new(),
            buf: Vec::with_capacity(INDEX_ENTRY_BYTES as usize),
        };
        index.rebuild(entries)?;
        Ok(index)
    }

    /// Replaces the in-memory state with `entries`, recomputing positions
    /// and the file inventory.
    fn rebuild(&mut self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        self.positions.clear();
        self.sed_files.clear();
        self.pdz_files.clear();
        for (i, e) in entries.iter().enumerate() {
            if self.positions.insert(e.id, i).is_some() {
                return Err(IndexError::Corrupt {
                    path: self.path.clone(),
                    reason: format!("object {} appears more than once", e.id),
                });
            }
            self.sed_files.extend(e.sed.map(|l| l.file));
            self.pdz_files.extend(e.pdz.map(|l| l.file));
        }
        self.entries = entries;
        Ok(())
    }

    /// Number of registered objects.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered ids, in index order.
    pub fn ids(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.positions.contains_key(&id)
    }

    /// Distinct data file ids referenced by any SED location.
    pub fn sed_files(&self) -> &BTreeSet<u16> {
        &self.sed_files
    }

    /// Distinct data file ids referenced by any PDZ location.
    pub fn pdz_files(&self) -> &BTreeSet<u16> {
        &self.pdz_files
    }

    pub fn get_location(&self, id: i64) -> Result<ObjectLocation, IndexError> {
        let &pos = self.positions.get(&id).ok_or(IndexError::UnknownId(id))?;
        let e = &self.entries[pos];
        Ok(ObjectLocation {
            index_position: pos,
            sed: e.sed,
            pdz: e.pdz,
        })
    }

    /// Records new locations for object `id` and persists them.
    ///
    /// `loc.index_position` is ignored. A dataset that is already set may
    /// only be given its current location again.
    ///
    /// # Errors
    ///
    /// - `UnknownId` if the object was never created.
    /// - `InvalidLocation` for file id 0 or an offset beyond `i64::MAX`.
    /// - `AlreadySet` for a SET -> UNSET or SET -> other SET transition.
    /// - `Io` if the row cannot be written; memory is left unchanged.
    pub fn set_location(&mut self, id: i64, loc: &ObjectLocation) -> Result<(), IndexError> {
        let &pos = self.positions.get(&id).ok_or(IndexError::UnknownId(id))?;
        let current = self.entries[pos];

        for dataset in [Dataset::Sed, Dataset::Pdz] {
            let new = loc.get(dataset);
            if let Some(l) = new {
                if l.file == 0 {
                    return Err(IndexError::InvalidLocation {
                        id,
                        reason: format!("{} file ids start at 1", dataset),
                    });
                }
                if l.offset > i64::MAX as u64 {
                    return Err(IndexError::InvalidLocation {
                        id,
                        reason: format!("{} offset {} out of range", dataset, l.offset),
                    });
                }
            }
            if let Some(old) = current.location(dataset) {
                if new != Some(old) {
                    return Err(IndexError::AlreadySet { id, dataset });
                }
            }
        }

        self.buf.clear();
        encode_locations(&mut self.buf, loc.sed, loc.pdz)?;
        self.file.seek(SeekFrom::Start(
            pos as u64 * INDEX_ENTRY_BYTES + LOCATION_FIELDS_OFFSET,
        ))?;
        self.file.write_all(&self.buf)?;
        self.file.flush()?;

        let entry = &mut self.entries[pos];
        entry.sed = loc.sed;
        entry.pdz = loc.pdz;
        self.sed_files.extend(loc.sed.map(|l| l.file));
        self.pdz_files.extend(loc.pdz.map(|l| l.file));
        Ok(())
    }

    /// Ids whose SED is not set yet, in index order.
    pub fn missing_seds(&self) -> Vec<i64> {
        self.missing(Dataset::Sed)
    }

    /// Ids whose PDZ is not set yet, in index order.
    pub fn missing_pdzs(&self) -> Vec<i64> {
        self.missing(Dataset::Pdz)
    }

    pub fn missing(&self, dataset: Dataset) -> Vec<i64> {
        self.entries
            .iter()
            .filter(|e| e.location(dataset).is_none())
            .map(|e| e.id)
            .collect()
    }

    /// Registers a new object with both datasets unset, appending its row
    /// to the index file.
    pub fn create_object(&mut self, id: i64) -> Result<(), IndexError> {
        if self.positions.contains_key(&id) {
            return Err(IndexError::DuplicateId(id));
        }

        let entry = IndexEntry::unset(id);
        let pos = self.entries.len();

        self.buf.clear();
        encode_row(&mut self.buf, &entry)?;
        self.file
            .seek(SeekFrom::Start(pos as u64 * INDEX_ENTRY_BYTES))?;
        self.file.write_all(&self.buf)?;
        self.file.flush()?;

        self.entries.push(entry);
        self.positions.insert(id, pos);
        Ok(())
    }

    /// Rewrites the index with rows ordered by the location of `dataset`
    /// (file, then offset). Objects without that dataset go last; ties keep
    /// their current relative order.
    ///
    /// The new file is written to `index.bin.tmp`, fsynced and renamed over
    /// the old one, so a crash leaves either the old or the new index. If
    /// the rename fails (Windows, file still cached) the index is rewritten
    /// in place instead.
    pub fn sort_by_location(&mut self, dataset: Dataset) -> Result<(), IndexError> {
        let mut sorted = self.entries.clone();
        sorted.sort_by_key(|e| {
            let loc = e.location(dataset);
            (loc.is_none(), loc)
        });

        let mut contents = Vec::with_capacity(sorted.len() * INDEX_ENTRY_BYTES as usize);
        for e in &sorted {
            encode_row(&mut contents, e)?;
        }

        // The handle follows the inode through the rename, so once the new
        // file is in place nothing can fail before it replaces `self.file`.
        let tmp_path = self.tmp_path();
        let mut f = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        f.write_all(&contents)?;
        f.flush()?;
        f.sync_all()?;

        if fs::rename(&tmp_path, &self.path).is_err() {
            drop(f);
            f = OpenOptions::new()
                .read(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            f.write_all(&contents)?;
            f.flush()?;
            f.sync_all()?;
            let _ = fs::remove_file(&tmp_path);
        }

        self.file = f;
        self.rebuild(sorted)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Forces index updates to stable storage via `sync_all()`.
    pub fn sync_to_disk(&mut self) -> Result<(), IndexError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
