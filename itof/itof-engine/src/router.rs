//! FOV Router: decodes each incoming ROI's metadata and dispatches it to
//! up to 8 lazily-created per-FOV engines, grid or stripe depending on the
//! metadata's mode flag for that FOV. Completed segments are exposed
//! through a small `Arc<parking_lot::Mutex<..>>` handle safe to poll from
//! a different thread than the one calling `process_roi`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::warn;

use itof_calibration::CalibrationStore;
use itof_metadata::layout::{rtd_common_bit, rtd_grid_bit, rtd_stripe_bit};
use itof_metadata::{decode, MetadataView, RangeCal, Timestamp, METADATA_ROW_WORDS, NUM_FOVS};

use crate::error::Result;
use crate::freq_table::mod_idx_hz;
use crate::grid_engine::{FovShape, FrameParams, GridEngine, GridEngineHandle, RoiInput};
use crate::hdr::{HdrOutcome, HdrStage, RawRoi};
use crate::raw_dump;
use crate::raw_roi::{words_from_bytes, RawRoiView};
use crate::segment::{Coord, Segment};
use crate::stripe_engine::{StripeEngine, StripeParams, StripeRoiInput};
use crate::temp_comp::{SensorVariant, TempCompConfig};

/// State private to one grid-mode FOV slot: two `GridEngine`s in a
/// ping-pong arrangement (one accumulating while the other, if any, is
/// checked out to the worker thread), plus this FOV's HDR stage.
struct GridSlot {
    handle: GridEngineHandle,
    engines: [Option<Box<GridEngine>>; 2],
    active: usize,
    inflight: Option<usize>,
    hdr: HdrStage,
    startup_pending: bool,
}

struct StripeSlot {
    engine: StripeEngine,
    hdr: HdrStage,
    startup_pending: bool,
}

enum FovSlot {
    Grid(GridSlot),
    Stripe(StripeSlot),
}

#[derive(Default)]
struct RouterShared {
    segments: [Option<Segment>; NUM_FOVS],
    available: [bool; NUM_FOVS],
}

fn publish(shared: &Mutex<RouterShared>, fov_idx: usize, segment: Segment) {
    let mut guard = shared.lock();
    guard.segments[fov_idx] = Some(segment);
    guard.available[fov_idx] = true;
}

/// A cheap, cloneable, cross-thread-safe view onto a [`FovRouter`]'s
/// completed segments. `process_roi` stays on the ingest thread (a
/// `FovRouter` itself holds `mpsc::Receiver`s, which are not `Sync`); a
/// consumer on another thread polls through a `RouterHandle` instead.
#[derive(Clone)]
pub struct RouterHandle {
    shared: Arc<Mutex<RouterShared>>,
}

impl RouterHandle {
    pub fn fovs_available(&self) -> Vec<usize> {
        let guard = self.shared.lock();
        (0..NUM_FOVS).filter(|&i| guard.available[i]).collect()
    }

    /// Atomically clears the availability flag for `fov_idx`.
    pub fn get_data(&self, fov_idx: usize) -> Option<Segment> {
        let mut guard = self.shared.lock();
        if !guard.available[fov_idx] {
            return None;
        }
        guard.available[fov_idx] = false;
        guard.segments[fov_idx].take()
    }
}

pub struct FovRouter {
    calibration: Arc<CalibrationStore>,
    slots: [Option<FovSlot>; NUM_FOVS],
    shared: Arc<Mutex<RouterShared>>,
    head_num: u32,
    temp_static: TempCompConfig,
    /// Number of raw phase-permutation captures per pixel (1 if the
    /// producer has already tap-rotated, 3 otherwise). A fixed pipeline
    /// mode, not a per-ROI wire field in this layout.
    taps_per_pixel: u8,
}

impl FovRouter {
    pub fn new(calibration: Arc<CalibrationStore>, head_num: u32, temp_static: TempCompConfig, taps_per_pixel: u8) -> Self {
        FovRouter {
            calibration,
            slots: std::array::from_fn(|_| None),
            shared: Arc::new(Mutex::new(RouterShared::default())),
            head_num,
            temp_static,
            taps_per_pixel,
        }
    }

    pub fn handle(&self) -> RouterHandle {
        RouterHandle { shared: self.shared.clone() }
    }

    pub fn fovs_available(&self) -> Vec<usize> {
        self.handle().fovs_available()
    }

    pub fn get_data(&self, fov_idx: usize) -> Option<Segment> {
        self.handle().get_data(fov_idx)
    }

    /// Drain any grid-engine frames the worker threads finished since the
    /// last call, publishing each as a completed segment. The per-FOV
    /// ingest path already does this opportunistically before dispatching
    /// the next frame; call this directly when a FOV's last ROI has
    /// already been dispatched and nothing further is expected to arrive
    /// for it (e.g. at shutdown, or on an idle timer).
    pub fn poll_workers(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            if let FovSlot::Grid(g) = slot {
                if let Some(done_idx) = g.inflight {
                    if let Some((engine, segment, done_fov)) = g.handle.poll() {
                        g.engines[done_idx] = Some(engine);
                        g.inflight = None;
                        if let Some(seg) = segment {
                            publish(&self.shared, done_fov, seg);
                        }
                    }
                }
            }
        }
    }

    /// Decode and route one ROI packet (metadata row followed by raw
    /// samples, both little-endian). Only a worker-thread spawn failure
    /// propagates as `Err`; every other recoverable condition is logged
    /// and folded into per-FOV engine state.
    pub fn process_roi(&mut self, bytes: &[u8]) -> Result<()> {
        let words = words_from_bytes(bytes);
        if words.len() < METADATA_ROW_WORDS {
            warn!("ROI packet shorter than the metadata row; dropping");
            return Ok(());
        }
        let meta = match decode(&words[..METADATA_ROW_WORDS]) {
            Ok(m) => m,
            Err(e) => {
                warn!("metadata decode failed: {e}; dropping ROI");
                return Ok(());
            }
        };
        // Raw sample words share the metadata row's wire convention (§6:
        // "active payload is the upper 12 bits"); extract the payload once,
        // here, at the ROI decode boundary, so every downstream consumer
        // (HDR merge, tap rotation, DSP) works in real 12-bit sample units
        // and can compare directly against metadata-derived thresholds like
        // `saturation_threshold`.
        let raw_payload: Vec<u16> = words[METADATA_ROW_WORDS..].iter().map(|&w| w >> 4).collect();
        let roi_start_row = meta.roi_start_row() as usize;
        let roi_num_rows = meta.roi_num_rows() as usize;

        let dump_requested =
            (0..NUM_FOVS).any(|i| meta.is_fov_active(i) && meta.is_dump_raw_roi(i) && meta.is_last_roi(i));
        if dump_requested {
            raw_dump::dump(&raw_payload);
        }

        for fov_idx in 0..NUM_FOVS {
            if !meta.is_fov_active(fov_idx) {
                continue;
            }
            self.process_fov_roi(fov_idx, &meta, &raw_payload, roi_start_row, roi_num_rows)?;
        }
        Ok(())
    }

    fn ensure_slot(&mut self, fov_idx: usize, want_stripe: bool) -> Result<()> {
        let needs_replace = match &self.slots[fov_idx] {
            None => true,
            Some(FovSlot::Grid(_)) => want_stripe,
            Some(FovSlot::Stripe(_)) => !want_stripe,
        };
        if !needs_replace {
            return Ok(());
        }
        if let Some(FovSlot::Grid(old)) = &self.slots[fov_idx] {
            old.handle.shutdown();
        }
        self.slots[fov_idx] = Some(if want_stripe {
            FovSlot::Stripe(StripeSlot {
                engine: StripeEngine::new(self.calibration.clone()),
                hdr: HdrStage::new(),
                startup_pending: true,
            })
        } else {
            let handle = GridEngineHandle::spawn(&format!("{}-{fov_idx}", self.head_num))?;
            FovSlot::Grid(GridSlot {
                handle,
                engines: [
                    Some(Box::new(GridEngine::new(self.calibration.clone()))),
                    Some(Box::new(GridEngine::new(self.calibration.clone()))),
                ],
                active: 0,
                inflight: None,
                hdr: HdrStage::new(),
                startup_pending: true,
            })
        });
        Ok(())
    }

    fn temp_cfg_for(&self, meta: &MetadataView<'_>, fov_idx: usize) -> TempCompConfig {
        let mut cfg = self.temp_static;
        cfg.variant = if meta.fov_rtd_flags_common(fov_idx) & (1 << rtd_common_bit::TEMP_COMP_VARIANT_IS_M20) != 0 {
            SensorVariant::M20
        } else {
            SensorVariant::Standard
        };
        cfg
    }

    fn frame_params(&self, meta: &MetadataView<'_>, fov_idx: usize) -> FrameParams {
        let (range_cal0, range_cal1) = range_cals(meta);
        let (mapping_table_top_left, fov_top_left) = coords(meta, fov_idx);
        FrameParams {
            snr_threshold: meta.fov_snr_threshold(fov_idx),
            nn_level: meta.fov_nn_level(fov_idx) as u8,
            ghost_minmax_enabled: meta.fov_rtd_flags_grid(fov_idx) & (1 << rtd_grid_bit::GHOST_MINMAX_ENABLE) != 0,
            ghost_median_enabled: meta.fov_rtd_flags_grid(fov_idx) & (1 << rtd_grid_bit::GHOST_MEDIAN_ENABLE) != 0,
            disable_range_masking: meta.fov_rtd_flags_common(fov_idx) & (1 << rtd_common_bit::DISABLE_RANGE_MASKING) != 0,
            range_limit: range_limit(meta),
            range_cal0,
            range_cal1,
            adc_cal_gain: meta.adc_cal_gain(),
            adc_cal_offset: meta.adc_cal_offset(),
            temp_cal: self.temp_cfg_for(meta, fov_idx),
            head_num: self.head_num,
            sensor_id: meta.sensor_id(),
            user_tag: meta.fov_user_tag(fov_idx),
            mapping_table_top_left,
            fov_top_left,
        }
    }

    fn stripe_params(&self, meta: &MetadataView<'_>, fov_idx: usize) -> StripeParams {
        let (range_cal0, range_cal1) = range_cals(meta);
        let (_, fov_top_left) = coords(meta, fov_idx);
        StripeParams {
            start_row: meta.roi_start_row(),
            num_rows: meta.roi_num_rows(),
            binning: meta.fov_binning(fov_idx),
            rect_sum_enabled: meta.fov_rtd_flags_stripe(fov_idx) & (1 << rtd_stripe_bit::RECT_SUM_ENABLE) != 0,
            snr_weighted_enabled: meta.fov_rtd_flags_stripe(fov_idx) & (1 << rtd_stripe_bit::SNR_WEIGHTED_ENABLE) != 0,
            snr_threshold: meta.fov_snr_threshold(fov_idx),
            disable_range_masking: meta.fov_rtd_flags_common(fov_idx) & (1 << rtd_common_bit::DISABLE_RANGE_MASKING) != 0,
            range_limit: range_limit(meta),
            range_cal0,
            range_cal1,
            adc_cal_gain: meta.adc_cal_gain(),
            adc_cal_offset: meta.adc_cal_offset(),
            temp_cal: self.temp_cfg_for(meta, fov_idx),
            f0_mod_idx: meta.f0_mod_idx(),
            f1_mod_idx: meta.f1_mod_idx(),
            head_num: self.head_num,
            sensor_id: meta.sensor_id(),
            user_tag: meta.fov_user_tag(fov_idx),
            fov_top_left,
        }
    }

    fn process_fov_roi(
        &mut self,
        fov_idx: usize,
        meta: &MetadataView<'_>,
        raw_words: &[u16],
        roi_start_row: usize,
        roi_num_rows: usize,
    ) -> Result<()> {
        let want_stripe = meta.is_stripe(fov_idx);
        self.ensure_slot(fov_idx, want_stripe)?;
        let first_roi = meta.is_first_roi(fov_idx);
        let last_roi = meta.is_last_roi(fov_idx);
        let saturation_threshold = meta.saturation_threshold();
        let previous_roi_saturated = meta.previous_roi_saturated(fov_idx);
        let timestamp = timestamp_to_datetime(meta.timestamp());
        let roi_index = meta.roi_counter() as u32;
        let thermistor_adc = meta.adc_sample(0);
        let vlda_adc = meta.adc_sample(1);

        let slot = self.slots[fov_idx].as_mut().expect("slot just ensured");
        let (hdr, startup_pending) = match slot {
            FovSlot::Grid(g) => (&mut g.hdr, &mut g.startup_pending),
            FovSlot::Stripe(s) => (&mut s.hdr, &mut s.startup_pending),
        };
        let startup = *startup_pending;
        *startup_pending = false;
        let merged = match hdr.submit(RawRoi { samples: raw_words.to_vec() }, saturation_threshold, previous_roi_saturated, startup) {
            HdrOutcome::Skip => return Ok(()),
            HdrOutcome::Forward(roi) => roi.samples,
        };

        let raw = RawRoiView::new(&merged, roi_num_rows, self.taps_per_pixel as usize);

        match self.slots[fov_idx].as_mut().expect("slot just ensured") {
            FovSlot::Grid(g) => {
                if let Some(done_idx) = g.inflight {
                    if let Some((engine, segment, done_fov)) = g.handle.poll() {
                        g.engines[done_idx] = Some(engine);
                        g.inflight = None;
                        if let Some(seg) = segment {
                            publish(&self.shared, done_fov, seg);
                        }
                    }
                }

                let fov_shape = FovShape {
                    fov_start_row: meta.fov_start_row(fov_idx),
                    fov_num_rows: meta.fov_num_rows(fov_idx),
                    binning: meta.fov_binning(fov_idx),
                    fov_num_rois: meta.fov_num_rois(fov_idx),
                    f0_mod_idx: meta.f0_mod_idx(),
                    f1_mod_idx: meta.f1_mod_idx(),
                    scan_table_tag: meta.random_scan_table_tag(),
                    random_fov_tag: meta.fov_random_tag(fov_idx),
                };

                let engine_slot = g.active;
                let Some(engine_box) = g.engines[engine_slot].as_mut() else {
                    warn!(fov_idx, "grid engine checked out to worker on first-roi; dropping ROI");
                    return Ok(());
                };

                if first_roi {
                    engine_box.reset(fov_shape);
                }

                let local_start_row = roi_start_row.saturating_sub(fov_shape.fov_start_row as usize);
                let temp_cfg = self.temp_cfg_for(meta, fov_idx);
                let input = RoiInput {
                    start_row: local_start_row,
                    num_rows: roi_num_rows,
                    width: raw.width(),
                    freq0: raw.all_triplets(0),
                    freq1: raw.all_triplets(1),
                    roi_index,
                    timestamp,
                    thermistor_adc,
                    vlda_adc,
                };
                let _ = engine_box.accumulate(input, fov_shape, temp_cfg);

                if last_roi {
                    if let Some(engine) = g.engines[engine_slot].take() {
                        let params = Box::new(self.frame_params(meta, fov_idx));
                        g.handle.dispatch(fov_idx, engine, params);
                        g.inflight = Some(engine_slot);
                        g.active = 1 - engine_slot;
                    }
                }
                Ok(())
            }
            FovSlot::Stripe(s) => {
                let params = self.stripe_params(meta, fov_idx);
                let input = StripeRoiInput { raw, roi_index, timestamp, thermistor_adc, vlda_adc };
                if let Some(segment) = s.engine.process(fov_idx, input, &params) {
                    publish(&self.shared, fov_idx, segment);
                }
                Ok(())
            }
        }
    }
}

/// The masking range limit (§4.6 step 10) is not a separate wire field in
/// this layout; it is the pair's own maximum unambiguous range, derived the
/// same way the engines derive it for the wrap in step 9 (GCF of the two
/// modulation frequencies). A range surviving the modulo wrap is by
/// construction within this bound, so in practice this condition only ever
/// fires on a NaN/negative range that `max()`/`%` left unwrapped.
fn range_limit(meta: &MetadataView<'_>) -> f64 {
    let f0_hz = mod_idx_hz(meta.f0_mod_idx());
    let f1_hz = mod_idx_hz(meta.f1_mod_idx());
    itof_dsp::max_unambiguous_range_m(itof_dsp::gcf_hz(f0_hz, f1_hz))
}

fn range_cals(meta: &MetadataView<'_>) -> (RangeCal, RangeCal) {
    if meta.f0_mod_idx() == 7 {
        (meta.range_cal(0), meta.range_cal(1))
    } else {
        (meta.range_cal(2), meta.range_cal(3))
    }
}

/// Mapping-table space runs at 2x the resolution of the physical sensor
/// rows/cols; a grid FOV's top-left is derived from its start row, column
/// 0 (FOVs always span the full sensor width).
fn coords(meta: &MetadataView<'_>, fov_idx: usize) -> (Coord, Coord) {
    let fov_start = meta.fov_start_row(fov_idx) as i32;
    let fov_top_left = Coord { row: fov_start, col: 0 };
    let mapping_table_top_left = Coord { row: 2 * fov_start, col: 0 };
    (mapping_table_top_left, fov_top_left)
}

fn timestamp_to_datetime(ts: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.seconds as i64, ts.ns).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
}
