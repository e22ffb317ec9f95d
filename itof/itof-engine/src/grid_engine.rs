//! Per-FOV grid accumulation and whole-frame DSP, plus the worker thread
//! that runs the DSP off the ingest path.
//!
//! The state machine (`Idle -> Accumulating -> PendingCompletion -> Idle`)
//! lives in [`GridEngine`], a value-owned struct with no shared pointers.
//! [`GridEngineHandle`] is the thread-owning wrapper the router talks to;
//! its shape (a `std::sync::mpsc::sync_channel` pair plus a named worker
//! thread) is the one used throughout this workspace for off-path frame
//! processing, with a `thread_control` flag added so the worker can stop
//! between frames without waiting on a channel disconnect.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError, TrySendError};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thread_control::{make_pair, Control, Flag};
use tracing::{debug, error, warn};

use itof_calibration::{CalibrationStore, PixelMask};
use itof_dsp::{binning, ghost, median, nn_reject, phase, rowfill, smoothing};
use itof_metadata::RangeCal;

use crate::freq_table::mod_idx_hz;
use crate::segment::{Coord, ImageSize, Segment};
use crate::temp_comp::{TempCompConfig, TemperatureCompensator};

pub type Triplet = (f32, f32, f32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Accumulating,
    PendingCompletion,
}

/// Shape parameters captured at first-roi; any change mid-FOV invalidates
/// the in-progress accumulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FovShape {
    pub fov_start_row: u16,
    pub fov_num_rows: u16,
    pub binning: u16,
    pub fov_num_rois: u16,
    pub f0_mod_idx: u16,
    pub f1_mod_idx: u16,
    pub scan_table_tag: u16,
    pub random_fov_tag: u16,
}

/// One already-tap-rotated ROI's worth of input, for both frequencies.
pub struct RoiInput {
    pub start_row: usize,
    pub num_rows: usize,
    pub width: usize,
    pub freq0: Vec<Triplet>,
    pub freq1: Vec<Triplet>,
    pub roi_index: u32,
    pub timestamp: DateTime<Utc>,
    pub thermistor_adc: u16,
    pub vlda_adc: u16,
}

pub struct FrameParams {
    pub snr_threshold: f32,
    pub nn_level: u8,
    pub ghost_minmax_enabled: bool,
    pub ghost_median_enabled: bool,
    pub disable_range_masking: bool,
    pub range_limit: f64,
    pub range_cal0: RangeCal,
    pub range_cal1: RangeCal,
    pub adc_cal_gain: f32,
    pub adc_cal_offset: f32,
    pub temp_cal: TempCompConfig,
    pub head_num: u32,
    pub sensor_id: u16,
    pub user_tag: u16,
    pub mapping_table_top_left: Coord,
    pub fov_top_left: Coord,
}

struct Bank {
    width: usize,
    height: usize,
    freq0: Vec<Triplet>,
    freq1: Vec<Triplet>,
    snr2: Vec<f32>,
    active_row: Vec<bool>,
    /// Marks the exact `start_row` values already accumulated this frame.
    /// Distinct from `active_row`'s row-fill bookkeeping, and distinct from
    /// mere pixel-row overlap: two ROIs legitimately cover overlapping row
    /// ranges at different start rows (the SNR-voting loop below is exactly
    /// what arbitrates those), but the *same* start row appearing twice is
    /// the duplicate-ROI condition §4.6 step 1 and §7 `SequenceLost` call
    /// out, and must be rejected before that voting loop ever sees it.
    start_row_seen: Vec<bool>,
    source_roi_index: Vec<i32>,
    roi_timestamps: Vec<DateTime<Utc>>,
}

impl Bank {
    fn new(width: usize, height: usize) -> Self {
        Bank {
            width,
            height,
            freq0: vec![(0.0, 0.0, 0.0); width * height],
            freq1: vec![(0.0, 0.0, 0.0); width * height],
            snr2: vec![0.0; width * height],
            active_row: vec![false; height],
            start_row_seen: vec![false; height],
            source_roi_index: vec![-1; width * height],
            roi_timestamps: Vec::new(),
        }
    }

    fn clear(&mut self) {
        self.freq0.iter_mut().for_each(|v| *v = (0.0, 0.0, 0.0));
        self.freq1.iter_mut().for_each(|v| *v = (0.0, 0.0, 0.0));
        self.snr2.iter_mut().for_each(|v| *v = 0.0);
        self.active_row.iter_mut().for_each(|v| *v = false);
        self.start_row_seen.iter_mut().for_each(|v| *v = false);
        self.source_roi_index.iter_mut().for_each(|v| *v = -1);
        self.roi_timestamps.clear();
    }
}

/// Value-owned per-FOV grid accumulation state and whole-frame DSP. No
/// shared ownership, no callback registration: `accumulate` mutates in
/// place; `complete` consumes the finished bank and returns a `Segment`.
pub struct GridEngine {
    state: State,
    shape: Option<FovShape>,
    bank: Option<Bank>,
    accumulated_rois: u32,
    incomplete: bool,
    temp_comp: TemperatureCompensator,
    calibration: Arc<CalibrationStore>,
    last_seen_calibration_generation: u64,
}

impl GridEngine {
    pub fn new(calibration: Arc<CalibrationStore>) -> Self {
        GridEngine {
            state: State::Idle,
            shape: None,
            bank: None,
            accumulated_rois: 0,
            incomplete: false,
            temp_comp: TemperatureCompensator::default(),
            calibration,
            last_seen_calibration_generation: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Begin accumulating a new FOV frame.
    pub fn reset(&mut self, shape: FovShape) {
        let width = 640usize;
        let height = shape.fov_num_rows as usize;
        let shape_changed = self.shape != Some(shape);
        if shape_changed || self.bank.is_none() {
            self.bank = Some(Bank::new(width, height));
        } else if let Some(bank) = &mut self.bank {
            bank.clear();
        }
        self.shape = Some(shape);
        self.accumulated_rois = 0;
        self.incomplete = false;
        self.state = State::Accumulating;
    }

    /// Accumulate one ROI. Returns `true` if the FOV is now ready for
    /// `complete` (this was the last ROI).
    pub fn accumulate(&mut self, input: RoiInput, shape_now: FovShape, temp_cfg: TempCompConfig) -> bool {
        if self.state == State::Idle {
            warn!("accumulate called while idle; dropping ROI");
            return false;
        }
        let Some(expected) = self.shape else {
            self.incomplete = true;
            return false;
        };
        if expected != shape_now {
            warn!("FOV shape changed mid-frame; marking incomplete");
            self.incomplete = true;
            return false;
        }

        let Some(bank) = &mut self.bank else {
            self.incomplete = true;
            return false;
        };

        if input.start_row + input.num_rows > bank.height || input.width != bank.width {
            warn!("ROI out of bounds for FOV; marking incomplete");
            self.incomplete = true;
            return false;
        }

        if self.accumulated_rois >= expected.fov_num_rois as u32 {
            warn!("more ROIs than expected for this FOV; marking incomplete");
            self.incomplete = true;
            return false;
        }

        if bank.start_row_seen[input.start_row] {
            warn!("duplicate ROI start row; marking incomplete");
            self.incomplete = true;
            return false;
        }
        bank.start_row_seen[input.start_row] = true;

        if self.accumulated_rois == 0 {
            self.temp_comp.start_frame(temp_cfg);
        }
        self.temp_comp.push_samples(input.thermistor_adc, input.vlda_adc, temp_cfg);

        for row in 0..input.num_rows {
            let src_row_base = row * bank.width;
            let dst_row = input.start_row + row;
            let dst_row_base = dst_row * bank.width;
            bank.active_row[dst_row] = true;
            for col in 0..bank.width {
                let t0 = input.freq0[src_row_base + col];
                let t1 = input.freq1[src_row_base + col];
                let s0 = phase::phase_from_triplet(t0.0, t0.1, t0.2).snr;
                let s1 = phase::phase_from_triplet(t1.0, t1.1, t1.2).snr;
                let snr2 = s0 * s0 + s1 * s1;
                let idx = dst_row_base + col;
                if snr2 > bank.snr2[idx] {
                    bank.snr2[idx] = snr2;
                    bank.freq0[idx] = t0;
                    bank.freq1[idx] = t1;
                    bank.source_roi_index[idx] = input.roi_index as i32;
                }
            }
        }
        bank.roi_timestamps.push(input.timestamp);

        self.accumulated_rois += 1;
        if self.accumulated_rois >= expected.fov_num_rois as u32 {
            self.state = State::PendingCompletion;
            true
        } else {
            false
        }
    }

    /// Run whole-frame DSP and produce a segment, or `None` if the FOV
    /// never completed cleanly. Leaves the engine `Idle`.
    pub fn complete(&mut self, fov_idx: usize, params: &FrameParams) -> Option<Segment> {
        self.state = State::Idle;
        let shape = self.shape?;
        let bank = self.bank.take()?;
        if self.incomplete || self.accumulated_rois < shape.fov_num_rois as u32 {
            debug!(fov_idx, "frame incomplete; no segment emitted");
            return None;
        }

        let width = bank.width;
        let height = bank.height;

        let (mut a0, mut b0, mut c0) = split_triplets(&bank.freq0);
        let (mut a1, mut b1, mut c1) = split_triplets(&bank.freq1);
        for plane in [&mut a0, &mut b0, &mut c0, &mut a1, &mut b1, &mut c1] {
            rowfill::fill_inactive_rows(plane, &bank.active_row, width, height);
        }

        let binning_factor = shape.binning;
        let (a0, bw, bh) = binning::bin_grid(&a0, width, height, binning_factor);
        let (b0, _, _) = binning::bin_grid(&b0, width, height, binning_factor);
        let (c0, _, _) = binning::bin_grid(&c0, width, height, binning_factor);
        let (a1, _, _) = binning::bin_grid(&a1, width, height, binning_factor);
        let (b1, _, _) = binning::bin_grid(&b1, width, height, binning_factor);
        let (c1, _, _) = binning::bin_grid(&c1, width, height, binning_factor);

        let n = bw * bh;
        let mut phi0 = vec![0.0f64; n];
        let mut phi1 = vec![0.0f64; n];
        let mut signal = itof_dsp::pool::acquire(n);
        let mut background = itof_dsp::pool::acquire(n);
        let mut snr = itof_dsp::pool::acquire(n);
        for i in 0..n {
            let s0 = phase::phase_from_triplet(a0[i], b0[i], c0[i]);
            let s1 = phase::phase_from_triplet(a1[i], b1[i], c1[i]);
            phi0[i] = s0.phase as f64;
            phi1[i] = s1.phase as f64;
            signal[i] = s0.signal + s1.signal;
            background[i] = s0.background + s1.background;
            snr[i] = (s0.snr * s0.snr + s1.snr * s1.snr).sqrt();
        }

        let sm_a0 = smoothing::smooth_5x7(&a0, bw, bh);
        let sm_b0 = smoothing::smooth_5x7(&b0, bw, bh);
        let sm_c0 = smoothing::smooth_5x7(&c0, bw, bh);
        let sm_a1 = smoothing::smooth_5x7(&a1, bw, bh);
        let sm_b1 = smoothing::smooth_5x7(&b1, bw, bh);
        let sm_c1 = smoothing::smooth_5x7(&c1, bw, bh);

        let f0_hz = mod_idx_hz(shape.f0_mod_idx);
        let f1_hz = mod_idx_hz(shape.f1_mod_idx);
        let gcf = itof_dsp::gcf_hz(f0_hz, f1_hz);
        let max_range = itof_dsp::max_unambiguous_range_m(gcf);

        let mut range_m = vec![0.0f64; n];
        let mut m_map = itof_dsp::pool::acquire(n);
        for i in 0..n {
            let phi0_sm = phase::phase_from_triplet(sm_a0[i], sm_b0[i], sm_c0[i]).phase as f64;
            let phi1_sm = phase::phase_from_triplet(sm_a1[i], sm_b1[i], sm_c1[i]).phase as f64;

            let psi0 = snap_corrected_phase(phi0[i], phi0_sm);
            let psi1 = snap_corrected_phase(phi1[i], phi1_sm);

            let sample = itof_dsp::range_from_phase_pair(phi0_sm, phi1_sm, psi0, psi1, f0_hz, f1_hz, gcf);
            range_m[i] = sample.range_m;
            m_map[i] = sample.m as f32;
        }

        let ghost_flags = if params.ghost_minmax_enabled {
            let valid = vec![true; n];
            ghost::recursive_minmax(&m_map, &valid, bw, bh, 3, 3, 1.5)
        } else {
            vec![false; n]
        };

        let mut range_f32: Vec<f32> = range_m.iter().map(|&v| v as f32).collect();
        if params.ghost_median_enabled {
            range_f32 = median::median_plus_2d(&range_f32, bw, bh, 3, 3);
        }
        range_f32 = nn_reject::nn_reject(&range_f32, bw, bh, params.nn_level);

        let temp_offset_mm = if !bank.roi_timestamps.is_empty() {
            self.temp_comp
                .complete(params.range_cal0, params.adc_cal_gain, params.adc_cal_offset)
        } else {
            0.0
        };

        let mask = self.calibration.mask();
        let mapping = self.calibration.mapping();
        let generation = self.calibration.generation();
        let mapping_is_new = generation != self.last_seen_calibration_generation;
        self.last_seen_calibration_generation = generation;

        let mut out_range = vec![0u16; n];
        let mut out_signal = vec![0u16; n];
        let mut out_background = vec![0u16; n];
        let mut out_snr = vec![0u16; n];
        let mut out_src = vec![0u16; n];

        for y in 0..bh {
            for x in 0..bw {
                let i = y * bw + x;
                let mut r_m = (range_f32[i] as f64 - (temp_offset_mm as f64 / 1000.0)).max(0.0);
                if max_range > 0.0 {
                    r_m %= max_range;
                }

                let src_y = (y * binning_factor as usize).min(height - 1);
                let src_x = (x * binning_factor as usize).min(width - 1);
                let src_idx = src_y * width + src_x;

                let masked = !params.disable_range_masking
                    && (ghost_flags[i]
                        || snr[i] < 2.0 * params.snr_threshold
                        || !mask.is_passthrough(src_x.min(mask.width - 1), src_y.min(mask.height - 1))
                        || r_m > params.range_limit);

                out_range[i] = if masked { 0 } else { (r_m * 1024.0).round().clamp(0.0, u16::MAX as f64) as u16 };
                out_signal[i] = signal[i].round().clamp(0.0, u16::MAX as f32) as u16;
                out_background[i] = background[i].round().clamp(0.0, u16::MAX as f32) as u16;
                out_snr[i] = (snr[i] / 2.0).round().clamp(0.0, u16::MAX as f32) as u16;
                out_src[i] = bank.source_roi_index[src_idx].max(0) as u16;
            }
        }

        Some(Segment {
            fov_idx,
            head_num: params.head_num,
            timestamp: *bank.roi_timestamps.last().expect("frame completion requires at least one accumulated ROI"),
            sensor_id: params.sensor_id,
            user_tag: params.user_tag,
            frame_completed: true,
            gcf_hz: gcf,
            max_unambiguous_range_m: max_range,
            image_size: ImageSize { rows: bh as u32, cols: bw as u32 },
            range: out_range,
            signal: out_signal,
            background: out_background,
            snr: out_snr,
            source_roi_index: out_src,
            roi_timestamps: bank.roi_timestamps,
            mapping_table_top_left: params.mapping_table_top_left,
            mapping_table_step: Coord {
                row: 2 * binning_factor as i32,
                col: 2 * binning_factor as i32,
            },
            fov_top_left: params.fov_top_left,
            fov_step: Coord { row: 1, col: 1 },
            mapping_table: mapping,
            mapping_table_is_new: mapping_is_new,
        })
    }
}

pub(crate) fn snap_corrected_phase(phi: f64, phi_smoothed: f64) -> f64 {
    let mut psi = phi;
    if (psi - phi_smoothed).abs() > 0.5 {
        if psi < phi_smoothed {
            psi += 1.0;
        } else {
            psi -= 1.0;
        }
    }
    psi
}

fn split_triplets(data: &[Triplet]) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut a = Vec::with_capacity(data.len());
    let mut b = Vec::with_capacity(data.len());
    let mut c = Vec::with_capacity(data.len());
    for &(x, y, z) in data {
        a.push(x);
        b.push(y);
        c.push(z);
    }
    (a, b, c)
}

enum ToWorker {
    Frame {
        fov_idx: usize,
        engine: Box<GridEngine>,
        params: Box<FrameParams>,
    },
}

type FromWorker = (Box<GridEngine>, Option<Segment>, usize);

/// Owns the worker thread that runs [`GridEngine::complete`] off the
/// ingest path. Uses a `thread_control` flag so the worker can be told to
/// stop between frames even while its channel stays open.
pub struct GridEngineHandle {
    tx_to_worker: Sender<ToWorker>,
    rx_from_worker: Receiver<FromWorker>,
    control: Control,
}

impl GridEngineHandle {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx_to_worker, rx_from_main) = mpsc::sync_channel::<ToWorker>(1);
        let (tx_to_main, rx_from_worker) = mpsc::sync_channel::<FromWorker>(1);
        let (flag, control): (Flag, Control) = make_pair();

        std::thread::Builder::new()
            .name(format!("itof-grid-{name}"))
            .spawn(move || {
                while flag.is_alive() {
                    let msg = match rx_from_main.recv_timeout(std::time::Duration::from_millis(200)) {
                        Ok(m) => m,
                        Err(mpsc::RecvTimeoutError::Timeout) => continue,
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    };
                    let ToWorker::Frame { fov_idx, mut engine, params } = msg;
                    let segment = engine.complete(fov_idx, &params);
                    if !flag.is_alive() {
                        break;
                    }
                    match tx_to_main.try_send((engine, segment, fov_idx)) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            error!("completed segment dropped: result channel full");
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
            })?;

        Ok(GridEngineHandle {
            tx_to_worker,
            rx_from_worker,
            control,
        })
    }

    /// Dispatch a completed frame for off-path DSP. `engine` is moved in
    /// and returned via `poll`.
    pub fn dispatch(&self, fov_idx: usize, engine: Box<GridEngine>, params: Box<FrameParams>) {
        if let Err(TrySendError::Full(_)) = self
            .tx_to_worker
            .try_send(ToWorker::Frame { fov_idx, engine, params })
        {
            error!("grid worker busy; frame dropped");
        }
    }

    /// Returns `(engine, segment)` for the most recently completed frame,
    /// if any is ready.
    pub fn poll(&self) -> Option<(Box<GridEngine>, Option<Segment>, usize)> {
        match self.rx_from_worker.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn shutdown(&self) {
        self.control.stop();
    }
}
