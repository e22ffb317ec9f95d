//! Stripe Engine: synchronous, single-ROI collapse of an H×640 raw ROI to
//! a 1×(640/bin) segment. Unlike the Grid Engine there is no accumulation
//! state machine — a stripe FOV's entire frame is always exactly one ROI
//! (`itof_metadata::MetadataView::is_stripe`), so `process` runs
//! synchronously on the ingest thread.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use itof_calibration::CalibrationStore;
use itof_dsp::{binning, phase};
use itof_metadata::RangeCal;

use crate::freq_table::mod_idx_hz;
use crate::grid_engine::snap_corrected_phase;
use crate::raw_roi::RawRoiView;
use crate::segment::{Coord, ImageSize, Segment};
use crate::temp_comp::{TempCompConfig, TemperatureCompensator};

/// ROI heights for which a matching rect-sum (box) kernel exists.
const RECT_SUM_HEIGHTS: [usize; 3] = [8, 20, 480];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripeParams {
    pub start_row: u16,
    pub num_rows: u16,
    pub binning: u16,
    pub rect_sum_enabled: bool,
    pub snr_weighted_enabled: bool,
    pub snr_threshold: f32,
    pub disable_range_masking: bool,
    pub range_limit: f64,
    pub range_cal0: RangeCal,
    pub range_cal1: RangeCal,
    pub adc_cal_gain: f32,
    pub adc_cal_offset: f32,
    pub temp_cal: TempCompConfig,
    pub f0_mod_idx: u16,
    pub f1_mod_idx: u16,
    pub head_num: u32,
    pub sensor_id: u16,
    pub user_tag: u16,
    pub fov_top_left: Coord,
}

pub struct StripeRoiInput<'a> {
    pub raw: RawRoiView<'a>,
    pub roi_index: u32,
    pub timestamp: DateTime<Utc>,
    pub thermistor_adc: u16,
    pub vlda_adc: u16,
}

pub struct StripeEngine {
    calibration: Arc<CalibrationStore>,
    last_seen_calibration_generation: u64,
}

impl StripeEngine {
    pub fn new(calibration: Arc<CalibrationStore>) -> Self {
        StripeEngine {
            calibration,
            last_seen_calibration_generation: 0,
        }
    }

    pub fn process(&mut self, fov_idx: usize, input: StripeRoiInput<'_>, params: &StripeParams) -> Option<Segment> {
        let height = input.raw.height();
        let width = input.raw.width();
        if height != params.num_rows as usize {
            tracing::warn!(fov_idx, "stripe ROI height mismatch; dropping");
            return None;
        }

        let mut temp_comp = TemperatureCompensator::default();
        temp_comp.start_frame(params.temp_cal);
        temp_comp.push_samples(input.thermistor_adc, input.vlda_adc, params.temp_cal);

        let [a0, b0, c0, a1, b1, c1] = collapse(&input.raw, params.rect_sum_enabled, params.snr_weighted_enabled);

        let (a0, bw) = binning::bin_stripe(&a0, width, params.binning);
        let (b0, _) = binning::bin_stripe(&b0, width, params.binning);
        let (c0, _) = binning::bin_stripe(&c0, width, params.binning);
        let (a1, _) = binning::bin_stripe(&a1, width, params.binning);
        let (b1, _) = binning::bin_stripe(&b1, width, params.binning);
        let (c1, _) = binning::bin_stripe(&c1, width, params.binning);

        let mut phi0 = vec![0.0f64; bw];
        let mut phi1 = vec![0.0f64; bw];
        let mut signal = itof_dsp::pool::acquire(bw);
        let mut background = itof_dsp::pool::acquire(bw);
        let mut snr = itof_dsp::pool::acquire(bw);
        for i in 0..bw {
            let s0 = phase::phase_from_triplet(a0[i], b0[i], c0[i]);
            let s1 = phase::phase_from_triplet(a1[i], b1[i], c1[i]);
            phi0[i] = s0.phase as f64;
            phi1[i] = s1.phase as f64;
            signal[i] = s0.signal + s1.signal;
            background[i] = s0.background + s1.background;
            snr[i] = (s0.snr * s0.snr + s1.snr * s1.snr).sqrt();
        }

        let f0_hz = mod_idx_hz(params.f0_mod_idx);
        let f1_hz = mod_idx_hz(params.f1_mod_idx);
        let gcf = itof_dsp::gcf_hz(f0_hz, f1_hz);
        let max_range = itof_dsp::max_unambiguous_range_m(gcf);

        let mut range_m = vec![0.0f64; bw];
        for i in 0..bw {
            // A single-row buffer has no smoothing neighborhood; the
            // "smoothed" phase is the raw phase itself.
            let psi0 = snap_corrected_phase(phi0[i], phi0[i]);
            let psi1 = snap_corrected_phase(phi1[i], phi1[i]);
            let sample = itof_dsp::range_from_phase_pair(phi0[i], phi1[i], psi0, psi1, f0_hz, f1_hz, gcf);
            range_m[i] = sample.range_m;
        }

        let temp_offset_mm = temp_comp.complete(params.range_cal0, params.adc_cal_gain, params.adc_cal_offset);

        let mask = self.calibration.mask();
        let mapping = self.calibration.mapping();
        let generation = self.calibration.generation();
        let mapping_is_new = generation != self.last_seen_calibration_generation;
        self.last_seen_calibration_generation = generation;

        let mut out_range = vec![0u16; bw];
        let mut out_signal = vec![0u16; bw];
        let mut out_background = vec![0u16; bw];
        let mut out_snr = vec![0u16; bw];
        let mut out_src = vec![0u16; bw];

        for x in 0..bw {
            let mut r_m = (range_m[x] - (temp_offset_mm as f64 / 1000.0)).max(0.0);
            if max_range > 0.0 {
                r_m %= max_range;
            }

            let src_x = (x * params.binning as usize).min(width - 1);
            let masked = !params.disable_range_masking
                && (snr[x] < 2.0 * params.snr_threshold
                    || !mask.is_passthrough(src_x.min(mask.width - 1), 0)
                    || r_m > params.range_limit);

            out_range[x] = if masked { 0 } else { (r_m * 1024.0).round().clamp(0.0, u16::MAX as f64) as u16 };
            out_signal[x] = signal[x].round().clamp(0.0, u16::MAX as f32) as u16;
            out_background[x] = background[x].round().clamp(0.0, u16::MAX as f32) as u16;
            out_snr[x] = (snr[x] / 2.0).round().clamp(0.0, u16::MAX as f32) as u16;
            out_src[x] = input.roi_index as u16;
        }

        Some(Segment {
            fov_idx,
            head_num: params.head_num,
            timestamp: input.timestamp,
            sensor_id: params.sensor_id,
            user_tag: params.user_tag,
            frame_completed: true,
            gcf_hz: gcf,
            max_unambiguous_range_m: max_range,
            image_size: ImageSize { rows: 1, cols: bw as u32 },
            range: out_range,
            signal: out_signal,
            background: out_background,
            snr: out_snr,
            source_roi_index: out_src,
            roi_timestamps: vec![input.timestamp],
            mapping_table_top_left: Coord {
                row: 2 * params.start_row as i32 + params.num_rows as i32 - 1,
                col: params.fov_top_left.col,
            },
            mapping_table_step: Coord {
                row: 2 * params.binning as i32,
                col: 2 * params.binning as i32,
            },
            fov_top_left: params.fov_top_left,
            fov_step: Coord { row: 1, col: 1 },
            mapping_table: mapping,
            mapping_table_is_new: mapping_is_new,
        })
    }
}

/// Binomial-weighted window of exactly `height` taps (the general-path
/// Gaussian fallback; unlike `itof_dsp::smoothing`'s kernel it is not
/// restricted to odd sizes, since stripe ROI heights are always even).
fn gaussian_window(height: usize) -> Vec<f32> {
    let mut row = vec![1.0f64];
    for _ in 1..height.max(1) {
        let mut next = vec![0.0f64; row.len() + 1];
        for (i, &c) in row.iter().enumerate() {
            next[i] += c;
            next[i + 1] += c;
        }
        row = next;
    }
    let sum: f64 = row.iter().sum();
    row.into_iter().map(|v| (v / sum) as f32).collect()
}

/// Per-column window: combined two-frequency SNR at each row, normalized
/// to peak 1.0. Falls back to uniform weights if every row is zero-signal.
fn snr_weighted_column(raw: &RawRoiView<'_>, height: usize, col: usize) -> Vec<f32> {
    let mut w = vec![0.0f32; height];
    let mut peak = 0.0f32;
    for (row, slot) in w.iter_mut().enumerate() {
        let t0 = raw.triplet(row, col, 0);
        let t1 = raw.triplet(row, col, 1);
        let s0 = phase::phase_from_triplet(t0.0, t0.1, t0.2).snr;
        let s1 = phase::phase_from_triplet(t1.0, t1.1, t1.2).snr;
        let combined = (s0 * s0 + s1 * s1).sqrt();
        *slot = combined;
        peak = peak.max(combined);
    }
    if peak > 0.0 {
        for v in w.iter_mut() {
            *v /= peak;
        }
    } else {
        w.iter_mut().for_each(|v| *v = 1.0);
    }
    w
}

/// Collapse the H×640 ROI to six 1×640 planes (A/B/C for each frequency)
/// via the vertical aggregation window selected in priority order:
/// rect-sum (if a kernel of this exact height exists), else SNR-weighted
/// (if enabled), else a Gaussian matching the ROI height.
fn collapse(raw: &RawRoiView<'_>, rect_sum_enabled: bool, snr_weighted_enabled: bool) -> [Vec<f32>; 6] {
    let height = raw.height();
    let width = raw.width();

    let uniform = if rect_sum_enabled && RECT_SUM_HEIGHTS.contains(&height) {
        Some(vec![1.0f32 / height as f32; height])
    } else if !snr_weighted_enabled {
        Some(gaussian_window(height))
    } else {
        None
    };

    let mut a0 = vec![0.0f32; width];
    let mut b0 = vec![0.0f32; width];
    let mut c0 = vec![0.0f32; width];
    let mut a1 = vec![0.0f32; width];
    let mut b1 = vec![0.0f32; width];
    let mut c1 = vec![0.0f32; width];

    for col in 0..width {
        let weights = match &uniform {
            Some(w) => w.clone(),
            None => snr_weighted_column(raw, height, col),
        };
        let weight_sum: f32 = weights.iter().sum::<f32>().max(1e-9);

        let (mut sa0, mut sb0, mut sc0) = (0.0f32, 0.0f32, 0.0f32);
        let (mut sa1, mut sb1, mut sc1) = (0.0f32, 0.0f32, 0.0f32);
        for (row, &w) in weights.iter().enumerate() {
            let t0 = raw.triplet(row, col, 0);
            let t1 = raw.triplet(row, col, 1);
            sa0 += w * t0.0;
            sb0 += w * t0.1;
            sc0 += w * t0.2;
            sa1 += w * t1.0;
            sb1 += w * t1.1;
            sc1 += w * t1.2;
        }
        a0[col] = sa0 / weight_sum;
        b0[col] = sb0 / weight_sum;
        c0[col] = sc0 / weight_sum;
        a1[col] = sa1 / weight_sum;
        b1[col] = sb1 / weight_sum;
        c1[col] = sc1 / weight_sum;
    }

    [a0, b0, c0, a1, b1, c1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn constant_raw(height: usize, value: u16) -> Vec<u16> {
        vec![value; height * 640 * 3 * 2]
    }

    fn params() -> StripeParams {
        StripeParams {
            start_row: 10,
            num_rows: 6,
            binning: 2,
            rect_sum_enabled: true, // no 6-row rect kernel -> falls through to Gaussian-6
            snr_weighted_enabled: false,
            snr_threshold: 0.0,
            disable_range_masking: true,
            range_limit: f64::MAX,
            range_cal0: RangeCal { offset_mm: 0.0, mm_per_volt: 0.0, mm_per_degc: 0.0 },
            range_cal1: RangeCal { offset_mm: 0.0, mm_per_volt: 0.0, mm_per_degc: 0.0 },
            adc_cal_gain: 1.0,
            adc_cal_offset: 0.0,
            temp_cal: TempCompConfig {
                variant: crate::temp_comp::SensorVariant::M20,
                reference_resistance_ohms: 10_000.0,
                vref_volts: 3.3,
                vlda_scale: 11.0,
                steinhart_hart: crate::temp_comp::SteinhartHartCoeffs { a: 1e-3, b: 2e-4, c: 1.5e-7 },
            },
            f0_mod_idx: 8,
            f1_mod_idx: 9,
            head_num: 0,
            sensor_id: 0,
            user_tag: 0,
            fov_top_left: Coord { row: 10, col: 0 },
        }
    }

    #[test]
    fn constant_roi_produces_one_row_with_zero_range() {
        let calibration = Arc::new(CalibrationStore::new());
        let mut engine = StripeEngine::new(calibration);
        let words = constant_raw(6, 1000);
        let raw = RawRoiView::new(&words, 6, 1);
        let input = StripeRoiInput {
            raw,
            roi_index: 0,
            timestamp: Utc.timestamp_opt(0, 0).unwrap(),
            thermistor_adc: 0,
            vlda_adc: 0,
        };
        let segment = engine.process(0, input, &params()).expect("stripe ROI always completes");
        assert_eq!(segment.image_size, ImageSize { rows: 1, cols: 320 });
        assert!(segment.range.iter().all(|&r| r == 0));
        assert_eq!(segment.mapping_table_top_left.row, 2 * 10 + 6 - 1);
    }
}
