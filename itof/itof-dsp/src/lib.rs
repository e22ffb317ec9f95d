//! DSP kernels for the iTOF dual-frequency phase-to-range pipeline:
//! phase extraction, smoothing, median and min-max ghost filtering,
//! nearest-neighbor outlier rejection, phase unwrapping, row fill,
//! binning, and tap rotation. All kernels operate over flat row-major
//! slices with explicit width/height rather than a 2D array type.

pub mod binning;
pub mod ghost;
pub mod median;
pub mod nn_reject;
pub mod phase;
pub mod pool;
pub mod range;
pub mod rowfill;
pub mod smoothing;
pub mod taprot;

pub use phase::{phase_from_triplet, PhaseSample};
pub use range::{gcf_hz, max_unambiguous_range_m, range_from_phase_pair, RangeSample};
