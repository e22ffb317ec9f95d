use crate::error::{DecodeError, Result};
use crate::layout::*;
use crate::qfmt;
use crate::timestamp::{self, Timestamp};

/// Zero-copy view over one metadata row (`METADATA_ROW_WORDS` `u16`s,
/// already viewed as little-endian by the caller).
#[derive(Clone, Copy)]
pub struct MetadataView<'a> {
    row: &'a [u16],
}

fn word(row: &[u16], idx: usize) -> u16 {
    row[idx] >> 4
}

/// Per-FOV range-calibration coefficients for one modulation frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeCal {
    pub offset_mm: f32,
    pub mm_per_volt: f32,
    pub mm_per_degc: f32,
}

impl<'a> MetadataView<'a> {
    /// Parse and validate `row` as a metadata header. Borrows; does not copy.
    pub fn decode(row: &'a [u16]) -> Result<Self> {
        if row.len() < METADATA_ROW_WORDS {
            return Err(DecodeError::TooSmall {
                needed: METADATA_ROW_WORDS,
                got: row.len(),
            });
        }
        let view = MetadataView { row };

        let mode = word(row, SENSOR_MODE);
        if mode != SENSOR_MODE_DUAL_FREQUENCY {
            return Err(DecodeError::UnsupportedSensorMode(mode));
        }

        let f0 = view.f0_mod_idx();
        let f1 = view.f1_mod_idx();
        if !(7..=9).contains(&f0) || !(7..=9).contains(&f1) {
            return Err(DecodeError::ModIdxOutOfRange(if (7..=9).contains(&f0) {
                f1
            } else {
                f0
            }));
        }
        if f1 != f0 + 1 {
            return Err(DecodeError::NonAdjacentModIdx { f0, f1 });
        }

        Ok(view)
    }

    pub fn raw_row(&self) -> &'a [u16] {
        self.row
    }

    pub fn sensor_mode(&self) -> u16 {
        word(self.row, SENSOR_MODE)
    }

    pub fn roi_start_row(&self) -> u16 {
        word(self.row, ROI_START_ROW)
    }

    pub fn roi_num_rows(&self) -> u16 {
        word(self.row, ROI_NUM_ROWS)
    }

    pub fn f0_mod_idx(&self) -> u16 {
        word(self.row, F0_MOD_IDX)
    }

    pub fn f1_mod_idx(&self) -> u16 {
        word(self.row, F1_MOD_IDX)
    }

    pub fn roi_id(&self) -> u16 {
        word(self.row, ROI_ID)
    }

    pub fn roi_counter(&self) -> u16 {
        word(self.row, ROI_COUNTER)
    }

    pub fn saturation_threshold(&self) -> u16 {
        word(self.row, SATURATION_THRESHOLD)
    }

    pub fn sensor_id(&self) -> u16 {
        word(self.row, SENSOR_ID)
    }

    pub fn random_scan_table_tag(&self) -> u16 {
        word(self.row, RANDOM_SCAN_TABLE_TAG)
    }

    pub fn adc_cal_gain(&self) -> f32 {
        qfmt::adc_cal_gain(self.row[ADC_CAL_GAIN])
    }

    pub fn adc_cal_offset(&self) -> f32 {
        qfmt::adc_cal_offset(self.row[ADC_CAL_OFFSET])
    }

    pub fn adc_sample(&self, idx: usize) -> u16 {
        assert!(idx < ADC_LEN);
        word(self.row, ADC_BASE + idx)
    }

    pub fn timestamp(&self) -> Timestamp {
        timestamp::read_timestamp(self.row)
    }

    /// Range-cal triple for one of the four (pair, frequency) slots:
    /// 0 = (7,8)@7, 1 = (7,8)@8, 2 = (8,9)@8, 3 = (8,9)@9.
    pub fn range_cal(&self, slot: usize) -> RangeCal {
        assert!(slot < 4);
        let base = RANGE_CAL_BASE + slot * 3;
        RangeCal {
            offset_mm: qfmt::offset_mm(self.row[base]),
            mm_per_volt: qfmt::mm_per_volt(self.row[base + 1]),
            mm_per_degc: qfmt::mm_per_degc(self.row[base + 2]),
        }
    }

    /// Bitmask of FOV indices (0..8) selected as active.
    pub fn active_fovs(&self) -> u8 {
        (word(self.row, ACTIVE_STREAM_BITMASK) & 0x00FF) as u8
    }

    pub fn is_fov_active(&self, fov_idx: usize) -> bool {
        self.active_fovs() & (1 << fov_idx) != 0
    }

    pub fn fov_binning(&self, fov_idx: usize) -> u16 {
        word(self.row, fov_word(fov_idx, fov::BINNING))
    }

    pub fn fov_nn_level(&self, fov_idx: usize) -> u16 {
        word(self.row, fov_word(fov_idx, fov::NN_LEVEL))
    }

    pub fn fov_start_row(&self, fov_idx: usize) -> u16 {
        word(self.row, fov_word(fov_idx, fov::FOV_START_ROW))
    }

    pub fn fov_num_rows(&self, fov_idx: usize) -> u16 {
        word(self.row, fov_word(fov_idx, fov::FOV_NUM_ROWS))
    }

    pub fn fov_num_rois(&self, fov_idx: usize) -> u16 {
        word(self.row, fov_word(fov_idx, fov::FOV_NUM_ROIS))
    }

    pub fn fov_rtd_flags_common(&self, fov_idx: usize) -> u16 {
        word(self.row, fov_word(fov_idx, fov::RTD_FLAGS_COMMON))
    }

    pub fn fov_rtd_flags_grid(&self, fov_idx: usize) -> u16 {
        word(self.row, fov_word(fov_idx, fov::RTD_FLAGS_GRID))
    }

    pub fn fov_rtd_flags_stripe(&self, fov_idx: usize) -> u16 {
        word(self.row, fov_word(fov_idx, fov::RTD_FLAGS_STRIPE))
    }

    pub fn fov_snr_threshold(&self, fov_idx: usize) -> f32 {
        qfmt::snr_threshold(self.row[fov_word(fov_idx, fov::SNR_THRESHOLD)])
    }

    pub fn fov_user_tag(&self, fov_idx: usize) -> u16 {
        word(self.row, fov_word(fov_idx, fov::USER_TAG))
    }

    pub fn fov_random_tag(&self, fov_idx: usize) -> u16 {
        word(self.row, fov_word(fov_idx, fov::RANDOM_FOV_TAG))
    }

    fn fov_start_stop_flags(&self, fov_idx: usize) -> u16 {
        word(self.row, fov_word(fov_idx, fov::START_STOP_FLAGS))
    }

    /// Whether `fov_idx` is in stripe mode rather than grid mode, i.e. the
    /// ROI's own `first_roi`/`last_roi` are always true. Stripe mode is
    /// indicated by a single-ROI FOV (`fov_num_rois == 1`).
    pub fn is_stripe(&self, fov_idx: usize) -> bool {
        self.fov_num_rois(fov_idx) == 1
    }

    pub fn is_first_roi(&self, fov_idx: usize) -> bool {
        if self.is_stripe(fov_idx) {
            return true;
        }
        self.fov_start_stop_flags(fov_idx) & (1 << start_stop_bit::FIRST_ROI) != 0
    }

    pub fn is_last_roi(&self, fov_idx: usize) -> bool {
        if self.is_stripe(fov_idx) {
            return true;
        }
        self.fov_start_stop_flags(fov_idx) & (1 << start_stop_bit::LAST_ROI) != 0
    }

    pub fn is_dump_raw_roi(&self, fov_idx: usize) -> bool {
        self.fov_start_stop_flags(fov_idx) & (1 << start_stop_bit::DUMP_RAW_ROI) != 0
    }

    /// The ROI's "previous ROI was saturated" bit, read out of the FOV's
    /// common RTD flags (bit 0).
    pub fn previous_roi_saturated(&self, fov_idx: usize) -> bool {
        self.fov_rtd_flags_common(fov_idx) & 0x1 != 0
    }
}
