//! Zero-copy decoder for the iTOF per-ROI metadata header: a fixed-layout
//! row of 16-bit words whose active payload is the upper 12 bits.

pub mod error;
pub mod layout;
pub mod qfmt;
pub mod timestamp;
pub mod view;

pub use error::{DecodeError, Result};
pub use layout::{FOV_BLOCK_BASE, FOV_BLOCK_STRIDE, METADATA_ROW_WORDS, NUM_FOVS};
pub use timestamp::{adjust_timestamp, Timestamp};
pub use view::{MetadataView, RangeCal};

/// Decode `row` (must be at least [`METADATA_ROW_WORDS`] `u16`s) into a
/// validated, borrowed [`MetadataView`].
pub fn decode(row: &[u16]) -> Result<MetadataView<'_>> {
    MetadataView::decode(row)
}
