//! Fixed-width binary rows of `index.bin`.
//!
//! ```text
//! [id: i64][sed_file: u16][sed_pos: i64][pdz_file: u16][pdz_pos: i64]    28 bytes, LE
//! ```
//!
//! An unset location is stored as `file = 0, pos = -1`. In memory it is
//! `None`; a row mixing the two states is rejected on decode.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;

use crate::{Dataset, RecordLocation};

/// Size of one index row in bytes.
pub const INDEX_ENTRY_BYTES: u64 = 8 + 2 + 8 + 2 + 8;

/// Offset of the location fields within a row (just past the `id`).
pub const LOCATION_FIELDS_OFFSET: u64 = 8;

const UNSET_FILE: u16 = 0;
const UNSET_POS: i64 = -1;

/// One object as held by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndexEntry {
    pub id: i64,
    pub sed: Option<RecordLocation>,
    pub pdz: Option<RecordLocation>,
}

impl IndexEntry {
    pub fn unset(id: i64) -> Self {
        Self {
            id,
            sed: None,
            pdz: None,
        }
    }

    pub fn location(&self, dataset: Dataset) -> Option<RecordLocation> {
        match dataset {
            Dataset::Sed => self.sed,
            Dataset::Pdz => self.pdz,
        }
    }
}

/// Appends a full row for `entry` to `buf`.
pub(crate) fn encode_row(buf: &mut Vec<u8>, entry: &IndexEntry) -> io::Result<()> {
    buf.write_i64::<LittleEndian>(entry.id)?;
    encode_locations(buf, entry.sed, entry.pdz)
}

/// Appends only the four location fields to `buf`.
pub(crate) fn encode_locations(
    buf: &mut Vec<u8>,
    sed: Option<RecordLocation>,
    pdz: Option<RecordLocation>,
) -> io::Result<()> {
    for loc in [sed, pdz] {
        let (file, pos) = match loc {
            Some(l) => (l.file, l.offset as i64),
            None => (UNSET_FILE, UNSET_POS),
        };
        buf.write_u16::<LittleEndian>(file)?;
        buf.write_i64::<LittleEndian>(pos)?;
    }
    Ok(())
}

/// Decodes one 28-byte row. The error string describes what is malformed.
pub(crate) fn decode_row(mut row: &[u8]) -> Result<IndexEntry, String> {
    let id = row.read_i64::<LittleEndian>().map_err(|e| e.to_string())?;
    let mut locs = [None, None];
    for (slot, name) in locs.iter_mut().zip(["SED", "PDZ"]) {
        let file = row.read_u16::<LittleEndian>().map_err(|e| e.to_string())?;
        let pos = row.read_i64::<LittleEndian>().map_err(|e| e.to_string())?;
        *slot = decode_location(file, pos)
            .map_err(|reason| format!("object {}: {} {}", id, name, reason))?;
    }
    Ok(IndexEntry {
        id,
        sed: locs[0],
        pdz: locs[1],
    })
}

fn decode_location(file: u16, pos: i64) -> Result<Option<RecordLocation>, String> {
    match (file, pos) {
        (UNSET_FILE, UNSET_POS) => Ok(None),
        (UNSET_FILE, _) => Err(format!("offset {} without a data file", pos)),
        (_, UNSET_POS) => Err(format!("data file {} without an offset", file)),
        (_, p) if p < 0 => Err(format!("negative offset {}", p)),
        (f, p) => Ok(Some(RecordLocation {
            file: f,
            offset: p as u64,
        })),
    }
}
