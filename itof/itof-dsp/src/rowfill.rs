//! Row-fill interpolation for rows of an unbinned FOV buffer that received
//! no ROI data.

/// Fill rows marked inactive in `active` (len `height`) by averaging the
/// nearest active neighbor above and below; if only one neighbor is
/// active, copy it; if neither is active, leave the row at zero.
pub fn fill_inactive_rows(data: &mut [f32], active: &[bool], width: usize, height: usize) {
    assert_eq!(active.len(), height);
    assert_eq!(data.len(), width * height);

    for y in 0..height {
        if active[y] {
            continue;
        }
        let above = (0..y).rev().find(|&yy| active[yy]);
        let below = (y + 1..height).find(|&yy| active[yy]);
        match (above, below) {
            (Some(a), Some(b)) => {
                for x in 0..width {
                    data[y * width + x] = 0.5 * (data[a * width + x] + data[b * width + x]);
                }
            }
            (Some(a), None) => {
                for x in 0..width {
                    data[y * width + x] = data[a * width + x];
                }
            }
            (None, Some(b)) => {
                for x in 0..width {
                    data[y * width + x] = data[b * width + x];
                }
            }
            (None, None) => {}
        }
    }
}
