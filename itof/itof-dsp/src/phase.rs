//! Per-pixel phase, signal, SNR and background from a raw 3-tap triplet.

/// Result of reducing one raw (A, B, C) triplet to phase-domain quantities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSample {
    /// Phase in turns, `[0, 1)`.
    pub phase: f32,
    pub signal: f32,
    pub snr: f32,
    pub background: f32,
}

/// Reduce one raw triplet. The minimum of the three components is treated
/// as `c` (the background reference); `a`, `b` are the other two, rotated
/// so their relative order matches the tap that became `c`.
pub fn phase_from_triplet(p0: f32, p1: f32, p2: f32) -> PhaseSample {
    let (a, b, c, frac) = if p2 <= p0 && p2 <= p1 {
        (p0, p1, p2, 0.0)
    } else if p0 <= p1 && p0 <= p2 {
        (p1, p2, p0, 1.0 / 3.0)
    } else {
        (p2, p0, p1, 2.0 / 3.0)
    };

    let signal = a + b - 2.0 * c;
    if signal <= 0.0 {
        return PhaseSample {
            phase: 0.0,
            signal,
            snr: 0.0,
            background: 0.0,
        };
    }

    let mut phase = (1.0 / 3.0) * ((b - c) / signal) + frac;
    if phase >= 1.0 {
        phase -= 1.0;
    } else if phase < 0.0 {
        phase += 1.0;
    }
    let snr = signal / (2.0 * c.max(1.0 / 65535.0)).sqrt();

    PhaseSample {
        phase,
        signal,
        snr,
        background: c,
    }
}
