use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::mapping::{load_mapping_table, MappingTable};
use crate::mask::{load_pixel_mask, PixelMask, IMAGE_WIDTH, MAX_IMAGE_HEIGHT};

struct Inner {
    mapping: Option<Arc<MappingTable>>,
    mask: Arc<PixelMask>,
    generation: u64,
}

/// Owns the mapping table and pixel mask, shared read-only across FOV
/// engines via reference-counted handles. Each successful `reload` bumps a
/// generation counter; consumers compare against their last-observed value
/// to decide whether to set a completed segment's "mapping table newly
/// available" flag.
pub struct CalibrationStore {
    inner: Mutex<Inner>,
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationStore {
    pub fn new() -> Self {
        CalibrationStore {
            inner: Mutex::new(Inner {
                mapping: None,
                mask: Arc::new(PixelMask::full_passthrough(IMAGE_WIDTH, MAX_IMAGE_HEIGHT)),
                generation: 0,
            }),
        }
    }

    /// Reload the mapping table and/or pixel mask. Passing `None` for
    /// either path leaves that half of the store untouched. A mapping-table
    /// load failure is propagated (it is the only Fatal condition this
    /// store can raise); a pixel-mask load failure degrades to passthrough
    /// and is never an `Err`.
    pub fn reload(&self, mapping_path: Option<&Path>, pixel_mask_path: Option<&Path>) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(p) = mapping_path {
            let table = load_mapping_table(p)?;
            inner.mapping = Some(Arc::new(table));
        }
        if let Some(p) = pixel_mask_path {
            inner.mask = Arc::new(load_pixel_mask(p));
        }
        inner.generation += 1;
        debug!(generation = inner.generation, "calibration store reloaded");
        Ok(())
    }

    pub fn mapping(&self) -> Option<Arc<MappingTable>> {
        self.inner.lock().mapping.clone()
    }

    pub fn mask(&self) -> Arc<PixelMask> {
        self.inner.lock().mask.clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_passthrough_mask_and_no_mapping() {
        let store = CalibrationStore::new();
        assert!(store.mapping().is_none());
        assert!(store.mask().is_passthrough(0, 0));
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn reload_with_no_paths_still_bumps_generation() {
        let store = CalibrationStore::new();
        store.reload(None, None).unwrap();
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn missing_pixel_mask_degrades_to_passthrough_without_error() {
        let store = CalibrationStore::new();
        store
            .reload(None, Some(Path::new("/nonexistent/mask.bin")))
            .unwrap();
        assert!(store.mask().is_passthrough(0, 0));
        assert_eq!(store.generation(), 1);
    }
}
