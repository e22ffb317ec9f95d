//! Modulation-index-to-frequency lookup. The wire format only ever carries
//! the index (7, 8 or 9); the Hz values are a fixed property of the sensor
//! head, not something ROI metadata encodes.

pub fn mod_idx_hz(idx: u16) -> f64 {
    match idx {
        7 => 70_000_000.0,
        8 => 80_000_000.0,
        9 => 90_000_000.0,
        other => panic!("modulation index {other} out of range 7..=9"),
    }
}
