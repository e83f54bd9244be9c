//! # PDZ data files
//!
//! Append-only storage of redshift probability densities for the reference
//! sample. One [`PdzDataProvider`] owns one `pdz_data_<n>.bin` file.
//!
//! All PDZ curves stored in a file share a single redshift bin axis. The
//! axis is written once as a file header by the first PDZ appended, and
//! every later record holds only the object id and the density values. See
//! [`format`] for the byte layout.
//!
//! A PDZ whose bins differ from the file axis, in length or in any value,
//! is rejected at write time. Nothing is ever rewritten to accommodate it.

pub mod format;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use xydataset::{first_unsorted_f32, XYDataset};

use crate::format::{header_size, read_header, record_offset, record_size, write_header};

/// Errors that can occur while reading or appending PDZ records.
#[derive(Debug, Error)]
pub enum PdzError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The first PDZ of a file must define at least one bin.
    #[error("PDZ has no bins")]
    EmptyBins,

    /// The bins of the PDZ defining the axis are not strictly ascending.
    #[error("PDZ bins not in order (bin {index})")]
    UnsortedBins { index: usize },

    /// The PDZ has a different number of bins than the file axis.
    #[error("PDZ has {actual} bins, the file axis has {expected}")]
    BinCountMismatch { expected: usize, actual: usize },

    /// The PDZ has a bin value that differs from the file axis.
    #[error("PDZ bin {index} is {actual}, the file axis has {expected}")]
    BinValueMismatch {
        index: usize,
        expected: f32,
        actual: f32,
    },

    /// The axis has more bins than the `u32` header field can describe.
    #[error("PDZ too long: {0} bins")]
    TooLong(usize),

    /// A read was requested at a negative offset.
    #[error("negative offset {0}")]
    NegativeOffset(i64),

    /// A read was requested before any PDZ was written to the file.
    #[error("PDZ file has no bin axis yet")]
    NoBinAxis,

    /// The header or a record is malformed.
    #[error("corrupt PDZ data at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// A previous holder of the file lock panicked.
    #[error("PDZ file lock poisoned")]
    Poisoned,
}

/// Reads and appends PDZ records on a single data file, validating every
/// write against the file's bin axis.
///
/// The axis is loaded when the file is opened and kept in memory, so neither
/// writes nor reads touch the header again.
pub struct PdzDataProvider {
    path: PathBuf,
    file: Mutex<File>,
    /// Bin axis of this file. Empty until the first PDZ is written.
    bins: Vec<f32>,
    buf: Vec<u8>,
}

impl std::fmt::Debug for PdzDataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdzDataProvider")
            .field("path", &self.path)
            .field("bins", &self.bins.len())
            .finish()
    }
}

impl PdzDataProvider {
    /// Opens an existing PDZ data file. If the file is not empty its bin
    /// axis header is read immediately.
    ///
    /// # Errors
    ///
    /// `Io` if the file is missing or unreadable, `Corrupt` if the header is
    /// truncated or declares zero bins.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PdzError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let bins = if file.metadata()?.len() > 0 {
            let bins = read_header(&mut file).map_err(|e| match e.kind() {
                io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => PdzError::Corrupt {
                    offset: 0,
                    reason: e.to_string(),
                },
                _ => PdzError::Io(e),
            })?;
            if bins.is_empty() {
                return Err(PdzError::Corrupt {
                    offset: 0,
                    reason: "header declares zero bins".to_string(),
                });
            }
            bins
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            file: Mutex::new(file),
            bins,
            buf: Vec::with_capacity(256),
        })
    }

    /// The bin axis of this file; empty if no PDZ has been written yet.
    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Checks that `data` could be appended to this file without writing
    /// anything.
    pub fn validate(&self, data: &XYDataset) -> Result<(), PdzError> {
        let bins: Vec<f32> = data.iter().map(|p| p.0 as f32).collect();
        check_bins(&self.bins, &bins)
    }

    /// Appends the PDZ of object `id` and returns the offset of its `id`
    /// field.
    ///
    /// If the file has no axis yet, the bins of `data` become the axis and
    /// are written as the header in the same write as the record.
    pub fn add_pdz(&mut self, id: i64, data: &XYDataset) -> Result<u64, PdzError> {
        let bins: Vec<f32> = data.iter().map(|p| p.0 as f32).collect();
        check_bins(&self.bins, &bins)?;
        let defines_axis = self.bins.is_empty();

        self.buf.clear();
        if defines_axis {
            write_header(&mut self.buf, &bins)?;
        }
        let record_start = self.buf.len() as u64;
        self.buf.write_i64::<LittleEndian>(id)?;
        for &(_, value) in data.iter() {
            self.buf.write_f32::<LittleEndian>(value as f32)?;
        }

        let file = self.file.get_mut().map_err(|_| PdzError::Poisoned)?;
        let end = file.seek(SeekFrom::End(0))?;
        if defines_axis && end != 0 {
            return Err(PdzError::Corrupt {
                offset: 0,
                reason: format!("file has {} bytes but no bin axis", end),
            });
        }
        file.write_all(&self.buf)?;
        file.flush()?;

        if defines_axis {
            self.bins = bins;
        }
        Ok(end + record_start)
    }

    /// Reads the record at `offset`, returning the stored object id and the
    /// densities zipped with the file's bin axis.
    pub fn read_pdz(&self, offset: i64) -> Result<(i64, XYDataset), PdzError> {
        if offset < 0 {
            return Err(PdzError::NegativeOffset(offset));
        }
        if self.bins.is_empty() {
            return Err(PdzError::NoBinAxis);
        }
        let offset = offset as u64;
        let n = self.bins.len();

        if offset < header_size(n) {
            return Err(PdzError::Corrupt {
                offset,
                reason: "offset points inside the bin header".to_string(),
            });
        }
        if record_offset(n, (offset - header_size(n)) / record_size(n)) != offset {
            return Err(PdzError::Corrupt {
                offset,
                reason: "offset is not on a record boundary".to_string(),
            });
        }

        let mut f = self.file.lock().map_err(|_| PdzError::Poisoned)?;
        let filesize = f.metadata()?.len();
        if offset.saturating_add(record_size(n)) > filesize {
            return Err(PdzError::Corrupt {
                offset,
                reason: format!("record runs past end of file ({} bytes)", filesize),
            });
        }

        f.seek(SeekFrom::Start(offset))?;
        let mut record = vec![0u8; record_size(n) as usize];
        f.read_exact(&mut record)?;

        let mut r = &record[..];
        let id = r.read_i64::<LittleEndian>()?;
        let mut points = Vec::with_capacity(n);
        for &bin in &self.bins {
            let value = r.read_f32::<LittleEndian>()?;
            points.push((bin as f64, value as f64));
        }

        Ok((id, XYDataset::new(points)))
    }

    /// Number of complete records in the file.
    pub fn record_count(&self) -> Result<u64, PdzError> {
        if self.bins.is_empty() {
            return Ok(0);
        }
        let n = self.bins.len();
        let body = self.size()?.saturating_sub(header_size(n));
        Ok(body / record_size(n))
    }

    /// Current on-disk size of the file in bytes.
    pub fn size(&self) -> Result<u64, PdzError> {
        let f = self.file.lock().map_err(|_| PdzError::Poisoned)?;
        Ok(f.metadata()?.len())
    }

    /// Forces appended records to stable storage via `sync_all()`.
    pub fn sync_to_disk(&mut self) -> Result<(), PdzError> {
        let file = self.file.get_mut().map_err(|_| PdzError::Poisoned)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Validates candidate `bins` against a file `axis`.
///
/// With no axis yet, the bins must be non-empty and strictly ascending.
/// Otherwise they must equal the axis value for value.
fn check_bins(axis: &[f32], bins: &[f32]) -> Result<(), PdzError> {
    if axis.is_empty() {
        if bins.is_empty() {
            return Err(PdzError::EmptyBins);
        }
        if bins.len() > u32::MAX as usize {
            return Err(PdzError::TooLong(bins.len()));
        }
        if let Some(index) = first_unsorted_f32(bins.iter().copied()) {
            return Err(PdzError::UnsortedBins { index });
        }
        return Ok(());
    }

    if bins.len() != axis.len() {
        return Err(PdzError::BinCountMismatch {
            expected: axis.len(),
            actual: bins.len(),
        });
    }
    for (index, (&expected, &actual)) in axis.iter().zip(bins).enumerate() {
        if expected != actual {
            return Err(PdzError::BinValueMismatch {
                index,
                expected,
                actual,
            });
        }
    }
    Ok(())
}
