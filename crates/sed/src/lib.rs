//! # SED data files
//!
//! Append-only storage of spectral energy distributions for the reference
//! sample. One [`SedDataProvider`] owns one `sed_data_<n>.bin` file for its
//! whole lifetime.
//!
//! ## Binary Record Format
//!
//! ```text
//! [id: i64 LE][length: u32 LE][x: f32 LE][y: f32 LE] × length
//! ```
//!
//! There is no file-level header: a SED file is just a sequence of records
//! and a record is addressed by the byte offset of its `id` field. Each SED
//! carries its own wavelength grid, so nothing ties one record to the next.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sed::SedDataProvider;
//! use xydataset::XYDataset;
//!
//! std::fs::File::create("sed_data_1.bin").unwrap();
//! let mut p = SedDataProvider::open("sed_data_1.bin").unwrap();
//! let sed = XYDataset::new(vec![(100.0, 1.0), (105.0, 2.0)]);
//! let offset = p.add_sed(42, &sed).unwrap();
//! let (id, back) = p.read_sed(offset as i64).unwrap();
//! assert_eq!(id, 42);
//! assert_eq!(back.len(), 2);
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use xydataset::XYDataset;

/// Size of the fixed record prefix: 8 (`id`) + 4 (`length`).
pub const RECORD_HEADER_BYTES: u64 = 8 + 4;

/// Size of one stored `(x, y)` pair.
pub const PAIR_BYTES: u64 = 4 + 4;

/// Errors that can occur while reading or appending SED records.
#[derive(Debug, Error)]
pub enum SedError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The wavelength axis is not strictly ascending.
    #[error("SED wavelengths not in order (point {index})")]
    Unsorted { index: usize },

    /// The SED has more points than the `u32` length field can describe.
    #[error("SED too long: {0} points")]
    TooLong(usize),

    /// A read was requested at a negative offset.
    #[error("negative offset {0}")]
    NegativeOffset(i64),

    /// The record at `offset` runs past the end of the file.
    #[error("corrupt SED record at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// A previous holder of the file lock panicked.
    #[error("SED file lock poisoned")]
    Poisoned,
}

/// Reads and appends SED records on a single data file.
///
/// The file handle lives behind a `Mutex` so reads can go through `&self`
/// even though they need to seek. Appends take `&mut self` and bypass the
/// lock entirely.
pub struct SedDataProvider {
    path: PathBuf,
    file: Mutex<File>,
    /// Reusable scratch buffer; a whole record is staged here and written
    /// with a single `write_all`.
    buf: Vec<u8>,
}

impl std::fmt::Debug for SedDataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SedDataProvider")
            .field("path", &self.path)
            .finish()
    }
}

impl SedDataProvider {
    /// Opens an existing SED data file for reading and appending.
    ///
    /// The file is never created here; a missing file is an I/O error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SedError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            buf: Vec::with_capacity(256),
        })
    }

    /// Checks that `data` can be stored: strictly ascending wavelengths and
    /// a length that fits the record header.
    pub fn validate(data: &XYDataset) -> Result<(), SedError> {
        if data.len() > u32::MAX as usize {
            return Err(SedError::TooLong(data.len()));
        }
        if let Some(index) = data.first_unsorted() {
            return Err(SedError::Unsorted { index });
        }
        Ok(())
    }

    /// Appends the SED of object `id` and returns the byte offset at which
    /// the record starts.
    ///
    /// Nothing is written if validation fails.
    pub fn add_sed(&mut self, id: i64, data: &XYDataset) -> Result<u64, SedError> {
        Self::validate(data)?;

        self.buf.clear();
        self.buf.write_i64::<LittleEndian>(id)?;
        self.buf.write_u32::<LittleEndian>(data.len() as u32)?;
        for (x, y) in data.to_f32_pairs() {
            self.buf.write_f32::<LittleEndian>(x)?;
            self.buf.write_f32::<LittleEndian>(y)?;
        }

        let file = self.file.get_mut().map_err(|_| SedError::Poisoned)?;
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(&self.buf)?;
        file.flush()?;
        Ok(offset)
    }

    /// Reads the record starting at `offset`, returning the stored object id
    /// together with the dataset.
    ///
    /// # Errors
    ///
    /// - `NegativeOffset` if `offset < 0`.
    /// - `Corrupt` if the header or the points run past end-of-file.
    /// - `Io` on any other read failure.
    pub fn read_sed(&self, offset: i64) -> Result<(i64, XYDataset), SedError> {
        if offset < 0 {
            return Err(SedError::NegativeOffset(offset));
        }
        let offset = offset as u64;

        let mut f = self.file.lock().map_err(|_| SedError::Poisoned)?;
        let filesize = f.metadata()?.len();

        if offset.saturating_add(RECORD_HEADER_BYTES) > filesize {
            return Err(SedError::Corrupt {
                offset,
                reason: format!("record header past end of file ({} bytes)", filesize),
            });
        }

        f.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; RECORD_HEADER_BYTES as usize];
        f.read_exact(&mut header)?;
        let mut h = &header[..];
        let id = h.read_i64::<LittleEndian>()?;
        let length = h.read_u32::<LittleEndian>()? as u64;

        let body_len = length * PAIR_BYTES;
        if offset + RECORD_HEADER_BYTES + body_len > filesize {
            return Err(SedError::Corrupt {
                offset,
                reason: format!("{} points run past end of file", length),
            });
        }

        let mut body = vec![0u8; body_len as usize];
        f.read_exact(&mut body)?;

        let mut b = &body[..];
        let mut points = Vec::with_capacity(length as usize);
        for _ in 0..length {
            let x = b.read_f32::<LittleEndian>()?;
            let y = b.read_f32::<LittleEndian>()?;
            points.push((x as f64, y as f64));
        }

        Ok((id, XYDataset::new(points)))
    }

    /// Current on-disk size of the file in bytes.
    pub fn size(&self) -> Result<u64, SedError> {
        let f = self.file.lock().map_err(|_| SedError::Poisoned)?;
        Ok(f.metadata()?.len())
    }

    /// Forces appended records to stable storage via `sync_all()`.
    pub fn sync_to_disk(&mut self) -> Result<(), SedError> {
        let file = self.file.get_mut().map_err(|_| SedError::Poisoned)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Size in bytes of the record [`SedDataProvider::add_sed`] writes for `data`.
pub fn record_size(data: &XYDataset) -> u64 {
    RECORD_HEADER_BYTES + data.len() as u64 * PAIR_BYTES
}
