/// Post-load maintenance.
///
/// After a bulk load the index rows are in creation order, which rarely
/// matches where the data landed. Sorting the index by SED location makes a
/// full pass over `ids()` read the SED files front to back.
use anyhow::Result;
use index::Dataset;
use tracing::info;

use crate::ReferenceSample;

impl ReferenceSample {
    /// Flushes every data file and the index to stable storage.
    pub fn sync_to_disk(&mut self) -> Result<()> {
        for provider in &mut self.sed_providers {
            provider.sync_to_disk()?;
        }
        for provider in &mut self.pdz_providers {
            provider.sync_to_disk()?;
        }
        self.index.sync_to_disk()?;
        Ok(())
    }

    /// Fsyncs all data files, then rewrites the index ordered by SED
    /// location. Objects without a SED go last.
    ///
    /// Data is synced first so the reordered index never reaches disk ahead
    /// of the records it points to. The rewrite is atomic; see
    /// [`index::IndexProvider::sort_by_location`].
    pub fn optimize(&mut self) -> Result<()> {
        info!("optimizing reference sample at {}", self.root.display());
        self.sync_to_disk()?;
        self.index.sort_by_location(Dataset::Sed)?;
        info!("optimize done ({} objects)", self.index.size());
        Ok(())
    }
}
