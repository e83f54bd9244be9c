/// Read path: `get_sed_data()` and `get_pdz_data()`.
///
/// A lookup resolves the object's location through the index, picks the
/// provider for that data file and decodes the record. The id stored in the
/// record must match the requested id; a mismatch means the index and the
/// data files disagree and is reported as corruption.
use anyhow::{anyhow, ensure, Context, Result};
use xydataset::XYDataset;

use crate::ReferenceSample;

impl ReferenceSample {
    /// Returns the SED of object `id`, or `None` if it has not been written.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not registered, the location points outside the
    /// pool, the record cannot be read, or it belongs to another object.
    pub fn get_sed_data(&self, id: i64) -> Result<Option<XYDataset>> {
        let Some(at) = self.index.get_location(id)?.sed else {
            return Ok(None);
        };

        let provider = usize::from(at.file)
            .checked_sub(1)
            .and_then(|slot| self.sed_providers.get(slot))
            .ok_or_else(|| anyhow!("invalid SED file {} for object {}", at.file, id))?;

        let (stored_id, data) = provider
            .read_sed(i64::try_from(at.offset)?)
            .with_context(|| {
                format!(
                    "failed to read SED of object {} at {}[{}]",
                    id, at.file, at.offset
                )
            })?;

        ensure!(
            stored_id == id,
            "corrupted reference sample: SED at {}[{}] belongs to object {}, expected {}",
            at.file,
            at.offset,
            stored_id,
            id
        );
        Ok(Some(data))
    }

    /// Returns the PDZ of object `id`, or `None` if it has not been written.
    ///
    /// Same failure modes as [`get_sed_data`](ReferenceSample::get_sed_data).
    pub fn get_pdz_data(&self, id: i64) -> Result<Option<XYDataset>> {
        let Some(at) = self.index.get_location(id)?.pdz else {
            return Ok(None);
        };

        let provider = usize::from(at.file)
            .checked_sub(1)
            .and_then(|slot| self.pdz_providers.get(slot))
            .ok_or_else(|| anyhow!("invalid PDZ file {} for object {}", at.file, id))?;

        let (stored_id, data) = provider
            .read_pdz(i64::try_from(at.offset)?)
            .with_context(|| {
                format!(
                    "failed to read PDZ of object {} at {}[{}]",
                    id, at.file, at.offset
                )
            })?;

        ensure!(
            stored_id == id,
            "corrupted reference sample: PDZ at {}[{}] belongs to object {}, expected {}",
            at.file,
            at.offset,
            stored_id,
            id
        );
        Ok(Some(data))
    }
}
