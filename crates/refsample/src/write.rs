/// Write path: `create_object()`, `add_sed_data()`, `add_pdz_data()` and
/// data file rotation.
///
/// Every add follows the same steps:
///
/// 1. Look the object up; its dataset must still be UNSET.
/// 2. Validate the data, before anything touches the disk.
/// 3. If the last data file has reached `max_file_size`, open a new one.
/// 4. Append the record to the last data file.
/// 5. Record `(file, offset)` in the index.
///
/// The size check happens before the write, so a record is never split
/// across files and the last file may exceed the budget by one record.
use anyhow::{anyhow, ensure, Context, Result};
use index::{Dataset, RecordLocation};
use pdz::PdzDataProvider;
use sed::SedDataProvider;
use tracing::{debug, info};
use xydataset::XYDataset;

use crate::{pdz_file_name, sed_file_name, touch, ReferenceSample};

impl ReferenceSample {
    /// Registers a new object with no SED and no PDZ.
    pub fn create_object(&mut self, id: i64) -> Result<()> {
        self.index.create_object(id)?;
        Ok(())
    }

    /// Writes the SED of object `id`.
    ///
    /// # Errors
    ///
    /// Fails, leaving the store unchanged, if the object is unknown, already
    /// has a SED, or the wavelengths are not strictly ascending. I/O errors
    /// are propagated.
    pub fn add_sed_data(&mut self, id: i64, data: &XYDataset) -> Result<()> {
        let mut loc = self.index.get_location(id)?;
        ensure!(loc.sed.is_none(), "SED for ID {} is already set", id);
        SedDataProvider::validate(data).with_context(|| format!("invalid SED for ID {}", id))?;

        let full = match self.sed_providers.last() {
            Some(last) => last.size()? >= self.max_file_size,
            None => true,
        };
        if full {
            self.rotate_sed()?;
        }

        let file = file_id(self.sed_providers.len())?;
        let provider = self
            .sed_providers
            .last_mut()
            .ok_or_else(|| anyhow!("empty SED pool"))?;
        let offset = provider.add_sed(id, data)?;
        if self.sync {
            provider.sync_to_disk()?;
        }

        loc.set(Dataset::Sed, RecordLocation { file, offset });
        self.index.set_location(id, &loc)?;
        if self.sync {
            self.index.sync_to_disk()?;
        }

        debug!("SED for {} written at {}[{}]", id, file, offset);
        Ok(())
    }

    /// Writes the PDZ of object `id`.
    ///
    /// The bins must match the store's bin axis; the first PDZ ever written
    /// defines it and must have strictly ascending bins.
    ///
    /// # Errors
    ///
    /// Fails, leaving the store unchanged, if the object is unknown, already
    /// has a PDZ, or the bins are invalid. I/O errors are propagated.
    pub fn add_pdz_data(&mut self, id: i64, data: &XYDataset) -> Result<()> {
        let mut loc = self.index.get_location(id)?;
        ensure!(loc.pdz.is_none(), "PDZ for ID {} is already set", id);

        // Validate against the store axis, which a freshly rotated file
        // would not know about yet.
        let axis_holder = self
            .pdz_providers
            .iter()
            .rev()
            .find(|p| !p.bins().is_empty())
            .or_else(|| self.pdz_providers.last())
            .ok_or_else(|| anyhow!("empty PDZ pool"))?;
        axis_holder
            .validate(data)
            .with_context(|| format!("invalid PDZ for ID {}", id))?;

        let full = match self.pdz_providers.last() {
            Some(last) => last.size()? >= self.max_file_size,
            None => true,
        };
        if full {
            self.rotate_pdz()?;
        }

        let file = file_id(self.pdz_providers.len())?;
        let provider = self
            .pdz_providers
            .last_mut()
            .ok_or_else(|| anyhow!("empty PDZ pool"))?;
        let offset = provider.add_pdz(id, data)?;
        if self.sync {
            provider.sync_to_disk()?;
        }

        loc.set(Dataset::Pdz, RecordLocation { file, offset });
        self.index.set_location(id, &loc)?;
        if self.sync {
            self.index.sync_to_disk()?;
        }

        debug!("PDZ for {} written at {}[{}]", id, file, offset);
        Ok(())
    }

    /// Opens the next SED data file and appends it to the pool.
    fn rotate_sed(&mut self) -> Result<()> {
        let file = file_id(self.sed_providers.len() + 1)?;
        let path = self.root.join(sed_file_name(file));
        touch(&path)?;
        let provider = SedDataProvider::open(&path)
            .with_context(|| format!("failed to open SED data file {}", path.display()))?;
        self.sed_providers.push(provider);
        info!("rotated to SED data file {}", path.display());
        Ok(())
    }

    /// Opens the next PDZ data file and appends it to the pool.
    fn rotate_pdz(&mut self) -> Result<()> {
        let file = file_id(self.pdz_providers.len() + 1)?;
        let path = self.root.join(pdz_file_name(file));
        touch(&path)?;
        let provider = PdzDataProvider::open(&path)
            .with_context(|| format!("failed to open PDZ data file {}", path.display()))?;
        self.pdz_providers.push(provider);
        info!("rotated to PDZ data file {}", path.display());
        Ok(())
    }
}

/// Converts a pool length to the id of its last file.
fn file_id(pool_len: usize) -> Result<u16> {
    u16::try_from(pool_len).map_err(|_| anyhow!("data file pool exhausted ({} files)", pool_len))
}
