//! Raw ROI sample buffer: little-endian byte-to-word conversion and
//! per-pixel triplet extraction from the wire layout: row-major (row,
//! then column, then phase-component A/B/C), the two frequencies
//! interleaved at the component position, permutation blocks back-to-back.
//!
//! `RawRoiView` expects its `words` already stripped of the wire's 12-bit
//! packing (the caller, `FovRouter::process_roi`, right-shifts every raw
//! sample word by 4 once at the ROI decode boundary, matching the
//! metadata row's own upper-12-bits convention) — so every value seen here
//! is a real 0..4095 sample, directly comparable to metadata-derived
//! thresholds.

use itof_dsp::taprot;

use crate::grid_engine::Triplet;

const COMPONENTS: usize = 3;
const FREQS: usize = 2;
pub const ROI_WIDTH: usize = 640;

/// Convert a little-endian byte buffer into 16-bit words.
pub fn words_from_bytes(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}

/// Borrowed view over one ROI's raw sample words.
pub struct RawRoiView<'a> {
    words: &'a [u16],
    height: usize,
    num_perms: usize,
}

impl<'a> RawRoiView<'a> {
    /// `num_perms` is 1 for a producer that has already tap-rotated, 3 for
    /// one delivering the three raw phase-permutation captures.
    pub fn new(words: &'a [u16], height: usize, num_perms: usize) -> Self {
        let expected = height * ROI_WIDTH * COMPONENTS * FREQS * num_perms;
        assert_eq!(words.len(), expected, "raw ROI word count mismatch");
        RawRoiView { words, height, num_perms }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        ROI_WIDTH
    }

    pub fn num_perms(&self) -> usize {
        self.num_perms
    }

    fn pixel_base(&self, perm: usize, row: usize, col: usize) -> usize {
        let per_pixel = COMPONENTS * FREQS;
        let row_stride = ROI_WIDTH * per_pixel;
        let perm_stride = self.height * row_stride;
        perm * perm_stride + row * row_stride + col * per_pixel
    }

    fn raw_component(&self, perm: usize, row: usize, col: usize, freq: usize, component: usize) -> u16 {
        self.words[self.pixel_base(perm, row, col) + component * FREQS + freq]
    }

    fn raw_triplet(&self, perm: usize, row: usize, col: usize, freq: usize) -> (u16, u16, u16) {
        (
            self.raw_component(perm, row, col, freq, 0),
            self.raw_component(perm, row, col, freq, 1),
            self.raw_component(perm, row, col, freq, 2),
        )
    }

    /// The tap-rotated (or passed-through) float triplet at one pixel.
    pub fn triplet(&self, row: usize, col: usize, freq: usize) -> Triplet {
        if self.num_perms <= 1 {
            taprot::passthrough(self.raw_triplet(0, row, col, freq))
        } else {
            let perms = [
                taprot::passthrough(self.raw_triplet(0, row, col, freq)),
                taprot::passthrough(self.raw_triplet(1, row, col, freq)),
                taprot::passthrough(self.raw_triplet(2, row, col, freq)),
            ];
            taprot::accumulate_permutations(perms)
        }
    }

    /// All pixels of this ROI, row-major, for one frequency.
    pub fn all_triplets(&self, freq: usize) -> Vec<Triplet> {
        let mut out = Vec::with_capacity(self.height * ROI_WIDTH);
        for row in 0..self.height {
            for col in 0..ROI_WIDTH {
                out.push(self.triplet(row, col, freq));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_perm_buffer(height: usize, fill: u16) -> Vec<u16> {
        vec![fill; height * ROI_WIDTH * COMPONENTS * FREQS]
    }

    #[test]
    fn passthrough_buffer_converts_without_summing() {
        let words = single_perm_buffer(2, 1000);
        let view = RawRoiView::new(&words, 2, 1);
        assert_eq!(view.triplet(0, 0, 0), (1000.0, 1000.0, 1000.0));
        assert_eq!(view.all_triplets(0).len(), 2 * ROI_WIDTH);
    }

    #[test]
    fn words_from_bytes_is_little_endian() {
        let bytes = [0x34, 0x12, 0x00, 0x00];
        let words = words_from_bytes(&bytes);
        assert_eq!(words, vec![0x1234, 0x0000]);
    }

    #[test]
    fn three_permutation_buffer_sums_rotated_triplets() {
        let mut words = vec![0u16; 1 * ROI_WIDTH * COMPONENTS * FREQS * 3];
        // Set pixel (0,0), freq 0, for each permutation block to a distinct
        // constant triplet (same value across A/B/C simplifies the check).
        let view_stride = ROI_WIDTH * COMPONENTS * FREQS;
        for perm in 0..3 {
            let base = perm * view_stride;
            for component in 0..COMPONENTS {
                words[base + component * FREQS] = (perm as u16 + 1) * 10;
            }
        }
        let view = RawRoiView::new(&words, 1, 3);
        let (a, b, c) = view.triplet(0, 0, 0);
        assert_eq!(a + b + c, 60.0); // (10+10+10)+(20+20+20)... rotated sum is still 60 total
    }
}
