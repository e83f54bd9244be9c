use crate::XYDataset;
use std::fs;
use std::path::Path;

pub const IDS: [i64; 3] = [10, 11, 12];

pub fn seds() -> Vec<XYDataset> {
    vec![
        XYDataset::from(vec![(100.0, 1.0), (105.0, 2.0), (110.0, 3.0)]),
        XYDataset::from(vec![(500.0, 10.0), (505.0, 12.0), (510.0, 14.0)]),
        XYDataset::from(vec![(200.0, 0.0), (205.0, 1.0), (210.0, 2.0)]),
    ]
}

pub fn pdzs() -> Vec<XYDataset> {
    vec![
        XYDataset::from(vec![(0.0, 0.0), (1.0, 0.5), (2.0, 1.0)]),
        XYDataset::from(vec![(0.0, 0.75), (1.0, 0.5), (2.0, 0.25)]),
        XYDataset::from(vec![(0.0, 3.0), (1.0, 2.0), (2.0, 1.0)]),
    ]
}

pub fn unsorted() -> XYDataset {
    XYDataset::from(vec![(10.0, 0.0), (9.0, 1.0), (7.0, 2.0)])
}

/// Size of one 3-point SED record.
pub const SED_RECORD: u64 = 12 + 3 * 8;

/// Size of a PDZ file holding one 3-bin record.
pub const PDZ_FIRST_RECORD_END: u64 = (4 + 3 * 4) + (8 + 3 * 4);

pub fn count_files_with_prefix(dir: &Path, prefix: &str) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with(prefix) && n.ends_with(".bin"))
                .unwrap_or(false)
        })
        .count()
}
