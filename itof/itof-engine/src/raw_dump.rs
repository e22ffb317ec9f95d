//! Raw-stream sideband debug tap (see DESIGN.md for the open-question
//! resolution): whenever a last-roi carries the dump-raw start/stop bit,
//! the accumulated raw ROI words are written (overwriting) to a fixed
//! path. Fire-and-forget: any I/O failure is logged and never propagated,
//! since this is purely a debug tap rather than a pipeline-correctness
//! concern.

use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::warn;

pub const DEFAULT_DUMP_PATH: &str = "/run/cobra_accumulated_raw_rois_0000.bin";

/// Write `raw_words` (little-endian) to `path`, overwriting any existing
/// contents. Logs and swallows any I/O error.
pub fn dump_to(path: &Path, raw_words: &[u16]) {
    if let Err(e) = try_dump(path, raw_words) {
        warn!("raw-dump write to {:?} failed: {e}", path);
    }
}

/// Convenience wrapper writing to [`DEFAULT_DUMP_PATH`].
pub fn dump(raw_words: &[u16]) {
    dump_to(Path::new(DEFAULT_DUMP_PATH), raw_words);
}

fn try_dump(path: &Path, raw_words: &[u16]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for &w in raw_words {
        file.write_u16::<LittleEndian>(w)?;
    }
    Ok(())
}
