//! Nearest-neighbor outlier rejection over range data.

/// Per-level (window_size, min_neighbors, tolerance) lookup. Level 0 is the
/// identity (no rejection). Window grows and the required neighbor count
/// rises with level; levels index into `rtd_flags`'s `nn_level` field
/// (0..=5).
const LEVELS: [(usize, usize, f32); 6] = [
    (1, 0, 0.0),    // 0: no-op
    (3, 2, 0.02),
    (3, 3, 0.015),
    (5, 6, 0.01),
    (5, 9, 0.0075),
    (7, 14, 0.005),
];

/// Apply nearest-neighbor outlier rejection to `range` (meters, row-major
/// `width * height`). Pixels failing the neighbor-agreement test are set to
/// 0 (masked). Level 0 returns `range` unchanged.
pub fn nn_reject(range: &[f32], width: usize, height: usize, level: u8) -> Vec<f32> {
    assert_eq!(range.len(), width * height);
    let (win, min_neighbors, tol) = LEVELS[level.min(5) as usize];
    if level == 0 {
        return range.to_vec();
    }
    let r = win / 2;
    let mut out = range.to_vec();
    for y in 0..height {
        for x in 0..width {
            let center = range[y * width + x];
            if center == 0.0 {
                continue;
            }
            let thresh = 1.0 / 1024.0 + center * tol;
            let mut agree = 0usize;
            let y0 = y.saturating_sub(r);
            let y1 = (y + r + 1).min(height);
            let x0 = x.saturating_sub(r);
            let x1 = (x + r + 1).min(width);
            for yy in y0..y1 {
                for xx in x0..x1 {
                    if yy == y && xx == x {
                        continue;
                    }
                    let neighbor = range[yy * width + xx];
                    if (neighbor - center).abs() <= thresh {
                        agree += 1;
                    }
                }
            }
            if agree < min_neighbors {
                out[y * width + x] = 0.0;
            }
        }
    }
    out
}
