//! HDR stage: a one-ROI latency buffer that merges a saturated ROI with
//! its retake when the producer flags one.
//!
//! Modeled as an explicit two-state machine rather than a single boolean:
//! after a retake merge the pipeline must resynchronize exactly as it
//! does at startup, paying the one-ROI latency again.

/// A raw ROI's sample stream, in `itof_engine::raw_roi`'s wire order: per
/// pixel, component outer (A, B, C) and frequency inner (f0, f1) — six
/// words per pixel, repeated once per tap-rotation permutation block. HDR
/// merging only ever compares same-position samples across two submits of
/// the same shape, so the permutation/row layout above the pixel level is
/// opaque here; only the six-word pixel group matters. Samples are already
/// real 0..4095 values (the router extracts the wire's upper-12-bit
/// payload before handing ROIs to the HDR stage), so they compare directly
/// against `saturation_threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRoi {
    pub samples: Vec<u16>,
}

/// Words per pixel: 3 components × 2 frequencies.
const PIXEL_GROUP: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pristine,
    PendingRetakeResync,
}

pub struct HdrStage {
    state: State,
    held: Option<RawRoi>,
}

impl Default for HdrStage {
    fn default() -> Self {
        Self::new()
    }
}

/// What the caller should do with this `submit` call.
#[derive(Debug, PartialEq)]
pub enum HdrOutcome {
    /// Make no progress this call; the HDR stage absorbed the ROI.
    Skip,
    /// Forward this (possibly merged) ROI into the rest of the pipeline.
    Forward(RawRoi),
}

impl HdrStage {
    pub fn new() -> Self {
        HdrStage {
            state: State::Pristine,
            held: None,
        }
    }

    /// `saturation_threshold == 4095` disables HDR entirely (pass-through,
    /// zero latency). `previous_roi_saturated` is this ROI's own
    /// "previous ROI was saturated" metadata bit.
    pub fn submit(
        &mut self,
        roi: RawRoi,
        saturation_threshold: u16,
        previous_roi_saturated: bool,
        startup: bool,
    ) -> HdrOutcome {
        if saturation_threshold == 4095 {
            return HdrOutcome::Forward(roi);
        }

        if startup || self.state == State::PendingRetakeResync {
            self.state = State::Pristine;
            self.held = Some(roi);
            return HdrOutcome::Skip;
        }

        if !previous_roi_saturated {
            return match self.held.replace(roi) {
                Some(older) => HdrOutcome::Forward(older),
                None => HdrOutcome::Skip,
            };
        }

        let merged = match self.held.take() {
            Some(previous) => merge_retake(&previous, &roi, saturation_threshold),
            None => roi,
        };
        self.state = State::PendingRetakeResync;
        HdrOutcome::Forward(merged)
    }
}

/// Within one pixel group (`raw_roi`'s wire layout: component outer,
/// frequency inner — `[c0f0, c0f1, c1f0, c1f1, c2f0, c2f1]`), each
/// frequency's raw triplet is the strided slice `[freq, freq+2, freq+4]`.
/// The spec's "per raw triplet" saturation decision applies independently
/// per frequency: if any component of `previous`'s triplet at that
/// frequency exceeds `threshold`, replace that triplet with the
/// elementwise max of previous and current; the other frequency's triplet
/// in the same pixel group is left untouched unless it separately
/// saturates.
const FREQS: usize = 2;
const COMPONENTS: usize = 3;

fn merge_retake(previous: &RawRoi, current: &RawRoi, threshold: u16) -> RawRoi {
    let mut out = previous.samples.clone();
    for (p_chunk, c_chunk) in out.chunks_mut(PIXEL_GROUP).zip(current.samples.chunks(PIXEL_GROUP)) {
        for freq in 0..FREQS {
            let idx = [freq, freq + FREQS, freq + 2 * FREQS];
            let saturated = idx.iter().any(|&i| p_chunk[i] > threshold);
            if saturated {
                for &i in &idx {
                    p_chunk[i] = p_chunk[i].max(c_chunk[i]);
                }
            }
        }
    }
    debug_assert_eq!(COMPONENTS * FREQS, PIXEL_GROUP);
    RawRoi { samples: out }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roi(vals: &[u16]) -> RawRoi {
        RawRoi { samples: vals.to_vec() }
    }

    #[test]
    fn hdr_disabled_passes_through_with_zero_latency() {
        let mut hdr = HdrStage::new();
        let out = hdr.submit(roi(&[1, 2, 3, 4, 5, 6]), 4095, false, false);
        assert_eq!(out, HdrOutcome::Forward(roi(&[1, 2, 3, 4, 5, 6])));
    }

    #[test]
    fn startup_buffers_and_skips() {
        let mut hdr = HdrStage::new();
        let out = hdr.submit(roi(&[1, 2, 3, 4, 5, 6]), 4000, false, true);
        assert_eq!(out, HdrOutcome::Skip);
    }

    #[test]
    fn steady_state_forwards_the_older_roi() {
        let mut hdr = HdrStage::new();
        hdr.submit(roi(&[1, 2, 3, 4, 5, 6]), 4000, false, true); // startup: buffers roi A
        let out = hdr.submit(roi(&[7, 8, 9, 10, 11, 12]), 4000, false, false); // roi B
        assert_eq!(out, HdrOutcome::Forward(roi(&[1, 2, 3, 4, 5, 6])));
    }

    #[test]
    fn retake_merges_saturated_frequency_independently_and_resyncs() {
        let mut hdr = HdrStage::new();
        // previous: freq0 triplet (c0f0,c1f0,c2f0) = (4090,100,100), saturated;
        // freq1 triplet (c0f1,c1f1,c2f1) = (100,100,100), not saturated.
        hdr.submit(roi(&[4090, 100, 100, 100, 100, 100]), 4000, false, true);
        // retake: freq0 triplet = (3000,5000,50); freq1 triplet = (9999,9999,9999).
        let out = hdr.submit(roi(&[3000, 9999, 5000, 9999, 50, 9999]), 4000, true, false);
        // freq0 merges to the elementwise max; freq1 stays at previous despite
        // the retake's huge values, since its own previous triplet never saturated.
        assert_eq!(out, HdrOutcome::Forward(roi(&[4090, 100, 5000, 100, 100, 100])));

        // next submit resyncs exactly like startup: skip and buffer
        let out2 = hdr.submit(roi(&[1, 1, 1, 1, 1, 1]), 4000, false, false);
        assert_eq!(out2, HdrOutcome::Skip);
    }

    #[test]
    fn retake_leaves_non_saturated_pixel_groups_untouched() {
        let mut hdr = HdrStage::new();
        hdr.submit(roi(&[100, 200, 300, 100, 200, 300]), 4000, false, true);
        let out = hdr.submit(roi(&[999, 999, 999, 999, 999, 999]), 4000, true, false);
        assert_eq!(out, HdrOutcome::Forward(roi(&[100, 200, 300, 100, 200, 300])));
    }
}
