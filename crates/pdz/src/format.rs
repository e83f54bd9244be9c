//! PDZ data file layout and header read/write helpers.
//!
//! ```text
//! [bin_count: u32 LE][bin: f32 LE] × bin_count          header, written once
//! [id: i64 LE][value: f32 LE] × bin_count               record, repeated
//! ```
//!
//! The header is written together with the first record. An empty file has
//! no bin axis yet.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Result as IoResult, Seek, SeekFrom, Write};

/// Size of the `bin_count` field.
pub const BIN_COUNT_BYTES: u64 = 4;

/// Size of the `id` field that starts every record.
pub const ID_BYTES: u64 = 8;

/// Size of one stored bin or density value.
pub const VALUE_BYTES: u64 = 4;

/// Byte length of the header for an axis of `bin_count` bins. This is also
/// the offset of the first record.
#[must_use]
pub fn header_size(bin_count: usize) -> u64 {
    BIN_COUNT_BYTES + bin_count as u64 * VALUE_BYTES
}

/// Byte length of one record for an axis of `bin_count` bins.
#[must_use]
pub fn record_size(bin_count: usize) -> u64 {
    ID_BYTES + bin_count as u64 * VALUE_BYTES
}

/// Offset of the `id` field of record number `n` in a file whose axis has
/// `bin_count` bins.
#[must_use]
pub fn record_offset(bin_count: usize, n: u64) -> u64 {
    header_size(bin_count) + n * record_size(bin_count)
}

/// Writes the bin axis header to `w`.
pub fn write_header<W: Write>(w: &mut W, bins: &[f32]) -> IoResult<()> {
    let count = u32::try_from(bins.len()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "too many PDZ bins for header")
    })?;
    w.write_u32::<LittleEndian>(count)?;
    for &bin in bins {
        w.write_f32::<LittleEndian>(bin)?;
    }
    Ok(())
}

/// Reads the bin axis header from the start of `r`.
///
/// Fails with `InvalidData` if the header claims more bins than the file
/// holds, so a corrupt count never triggers a huge allocation.
pub fn read_header<R: Read + Seek>(r: &mut R) -> IoResult<Vec<f32>> {
    let filesize = r.seek(SeekFrom::End(0))?;
    if filesize < BIN_COUNT_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "file too small for PDZ header",
        ));
    }

    r.seek(SeekFrom::Start(0))?;
    let count = r.read_u32::<LittleEndian>()? as usize;
    if header_size(count) > filesize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("PDZ header claims {} bins but file has {} bytes", count, filesize),
        ));
    }

    let mut bins = Vec::with_capacity(count);
    for _ in 0..count {
        bins.push(r.read_f32::<LittleEndian>()?);
    }
    Ok(bins)
}
