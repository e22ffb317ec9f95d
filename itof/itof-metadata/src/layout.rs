//! Word-offset constants for the packed metadata row.
//!
//! Every word is a `u16`; its 12-bit payload lives in the upper 12 bits
//! (bits 4..16). A getter must right-shift by 4 exactly once.

/// Length, in 16-bit words, of one metadata row (`IMAGE_WIDTH * 3`).
pub const METADATA_ROW_WORDS: usize = 640 * 3;

pub const SENSOR_MODE: usize = 0;
pub const ROI_START_ROW: usize = 1;
pub const ROI_NUM_ROWS: usize = 2;
pub const F0_MOD_IDX: usize = 3;
pub const F1_MOD_IDX: usize = 4;
pub const N_PULSE_F0: usize = 5;
pub const N_PULSE_F1: usize = 6;
pub const INTE_BURST_LEN_F0: usize = 7;
pub const INTE_BURST_LEN_F1: usize = 8;
pub const ROI_ID: usize = 9;
pub const ACTIVE_STREAM_BITMASK: usize = 14;
pub const START_STOP_FLAGS_COARSE_BASE: usize = 15;
pub const ROI_COUNTER: usize = 23;
pub const TIMESTAMP_WORDS_BASE: usize = 24;
pub const TIMESTAMP_WORDS_LEN: usize = 7;
pub const ADC_BASE: usize = 31;
pub const ADC_LEN: usize = 8;
pub const DISABLE_STREAMING: usize = 48;
pub const REDUCE_MODE: usize = 49;
pub const SENSOR_ID: usize = 50;
pub const SATURATION_THRESHOLD: usize = 54;
pub const SYSTEM_TYPE: usize = 55;
pub const RX_TYPE: usize = 56;
pub const TX_TYPE: usize = 57;
pub const LCM_TYPE: usize = 58;
/// 4 range-cal triples (offset_mm, mm_per_volt, mm_per_degc), one per
/// (modulation pair, frequency) combination: (7,8)@7, (7,8)@8, (8,9)@8, (8,9)@9.
pub const RANGE_CAL_BASE: usize = 59;
pub const ADC_CAL_GAIN: usize = 71;
pub const ADC_CAL_OFFSET: usize = 72;
pub const RANDOM_SCAN_TABLE_TAG: usize = 73;

/// Sensor mode value meaning "dual frequency" (the only mode this pipeline
/// accepts).
pub const SENSOR_MODE_DUAL_FREQUENCY: u16 = 2;

pub const NUM_FOVS: usize = 8;
pub const FOV_BLOCK_BASE: usize = 200;
pub const FOV_BLOCK_STRIDE: usize = 32;

pub mod fov {
    pub const ACTIVE: usize = 0;
    pub const BINNING: usize = 1;
    pub const NN_LEVEL: usize = 2;
    pub const FOV_START_ROW: usize = 3;
    pub const FOV_NUM_ROWS: usize = 4;
    pub const FOV_NUM_ROIS: usize = 5;
    pub const RTD_FLAGS_COMMON: usize = 6;
    pub const RTD_FLAGS_GRID: usize = 7;
    pub const RTD_FLAGS_STRIPE: usize = 8;
    pub const SNR_THRESHOLD: usize = 9;
    pub const USER_TAG: usize = 10;
    pub const RANDOM_FOV_TAG: usize = 11;
    pub const START_STOP_FLAGS: usize = 12;
}

/// Bit positions within a FOV's `START_STOP_FLAGS` 12-bit payload.
pub mod start_stop_bit {
    pub const FIRST_ROI: u16 = 0;
    pub const LAST_ROI: u16 = 1;
    pub const DUMP_RAW_ROI: u16 = 2;
}

/// Bit positions within a FOV's `RTD_FLAGS_COMMON` 12-bit payload.
pub mod rtd_common_bit {
    pub const PREVIOUS_ROI_SATURATED: u16 = 0;
    pub const DISABLE_RANGE_MASKING: u16 = 1;
    pub const TEMP_COMP_VARIANT_IS_M20: u16 = 2;
}

/// Bit positions within a FOV's `RTD_FLAGS_GRID` 12-bit payload.
pub mod rtd_grid_bit {
    pub const GHOST_MINMAX_ENABLE: u16 = 0;
    pub const GHOST_MEDIAN_ENABLE: u16 = 1;
}

/// Bit positions within a FOV's `RTD_FLAGS_STRIPE` 12-bit payload.
pub mod rtd_stripe_bit {
    pub const RECT_SUM_ENABLE: u16 = 0;
    pub const SNR_WEIGHTED_ENABLE: u16 = 1;
}

pub const fn fov_word(fov_idx: usize, field: usize) -> usize {
    FOV_BLOCK_BASE + FOV_BLOCK_STRIDE * fov_idx + field
}
