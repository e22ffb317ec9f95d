//! Two-frequency phase unwrapping to an unambiguous range.

pub const SPEED_OF_LIGHT_M_PER_S: f64 = 299_792_458.0;

/// Greatest common factor of two positive integer-ish frequencies, computed
/// via Euclid's algorithm on their Hz values rounded to the nearest integer.
pub fn gcf_hz(f0: f64, f1: f64) -> f64 {
    let mut a = f0.round() as i64;
    let mut b = f1.round() as i64;
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.unsigned_abs() as f64
}

pub fn max_unambiguous_range_m(gcf_hz: f64) -> f64 {
    SPEED_OF_LIGHT_M_PER_S / (2.0 * gcf_hz)
}

/// Output of unwrapping one pixel's two-frequency phase pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSample {
    pub range_m: f64,
    pub m: i64,
}

/// Compute range from a smoothed phase pair (`phi0`, `phi1`) and a
/// corrected phase pair (`psi0`, `psi1`), given the two modulation
/// frequencies. Negative results clip to 0.
#[allow(clippy::too_many_arguments)]
pub fn range_from_phase_pair(
    phi0: f64,
    phi1: f64,
    psi0: f64,
    psi1: f64,
    f0_hz: f64,
    f1_hz: f64,
    gcf_hz: f64,
) -> RangeSample {
    let n0 = (f0_hz / gcf_hz).round();
    let n1 = (f1_hz / gcf_hz).round();
    let wrap = if phi1 < phi0 { 1.0 } else { 0.0 };

    let m = (n0 * phi1 - n1 * phi0 + n0 * wrap).round();

    let range_m = (SPEED_OF_LIGHT_M_PER_S / (4.0 * f1_hz)) * (m + psi1 + wrap)
        + (SPEED_OF_LIGHT_M_PER_S / (4.0 * f0_hz)) * (m + psi0);

    RangeSample {
        range_m: range_m.max(0.0),
        m: m as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gcf_of_adjacent_mhz_pair() {
        // modulation indices 8,9 scale to e.g. 80 MHz / 90 MHz -> GCF 10 MHz
        assert_eq!(gcf_hz(80_000_000.0, 90_000_000.0), 10_000_000.0);
    }

    #[test]
    fn max_unambiguous_range_matches_c_over_2gcf() {
        let gcf = 10_000_000.0;
        let expected = SPEED_OF_LIGHT_M_PER_S / (2.0 * gcf);
        assert_relative_eq!(max_unambiguous_range_m(gcf), expected);
    }

    #[test]
    fn zero_phase_pair_yields_zero_range() {
        let s = range_from_phase_pair(0.0, 0.0, 0.0, 0.0, 80_000_000.0, 90_000_000.0, 10_000_000.0);
        assert_relative_eq!(s.range_m, 0.0, epsilon = 1e-9);
        assert_eq!(s.m, 0);
    }

    #[test]
    fn negative_result_clips_to_zero() {
        let s = range_from_phase_pair(0.0, 0.0, -5.0, -5.0, 80_000_000.0, 90_000_000.0, 10_000_000.0);
        assert_eq!(s.range_m, 0.0);
    }
}
