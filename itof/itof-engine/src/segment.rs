//! The immutable, completed-FOV data carrier handed to consumers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use itof_calibration::MappingTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub rows: u32,
    pub cols: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

/// A finished field-of-view frame: range, signal, background, SNR and
/// per-pixel source-ROI index, plus the geometry needed to place it in the
/// mapping table.
#[derive(Debug, Clone)]
pub struct Segment {
    pub fov_idx: usize,
    pub head_num: u32,
    pub timestamp: DateTime<Utc>,
    pub sensor_id: u16,
    pub user_tag: u16,
    pub frame_completed: bool,
    pub gcf_hz: f64,
    pub max_unambiguous_range_m: f64,
    pub image_size: ImageSize,

    /// 1/1024 m per LSB; 0 is invalid/masked.
    pub range: Vec<u16>,
    pub signal: Vec<u16>,
    pub background: Vec<u16>,
    pub snr: Vec<u16>,
    /// Per-pixel index into the accumulated-ROI sequence that produced it.
    pub source_roi_index: Vec<u16>,
    pub roi_timestamps: Vec<DateTime<Utc>>,

    pub mapping_table_top_left: Coord,
    pub mapping_table_step: Coord,
    pub fov_top_left: Coord,
    pub fov_step: Coord,

    pub mapping_table: Option<Arc<MappingTable>>,
    pub mapping_table_is_new: bool,
}

impl Segment {
    pub fn pixel_count(&self) -> usize {
        (self.image_size.rows as usize) * (self.image_size.cols as usize)
    }
}
