//! Plus-shaped 2D median and 1D median filters over range data.

/// Plus-shaped median: the window is the union of a vertical arm of
/// `varm` pixels and a horizontal arm of `harm` pixels sharing the center
/// pixel (both odd). Border rows/columns where the full plus does not fit
/// are copied unchanged.
pub fn median_plus_2d(src: &[f32], width: usize, height: usize, varm: usize, harm: usize) -> Vec<f32> {
    assert!(varm % 2 == 1 && harm % 2 == 1);
    assert_eq!(src.len(), width * height);
    let vr = varm / 2;
    let hr = harm / 2;
    let mut out = src.to_vec();
    let mut window = Vec::with_capacity(varm + harm - 1);

    for y in vr..height.saturating_sub(vr) {
        for x in hr..width.saturating_sub(hr) {
            window.clear();
            for dy in 0..varm {
                let yy = y + dy - vr;
                window.push(src[yy * width + x]);
            }
            for dx in 0..harm {
                if dx == hr {
                    continue; // center already included by the vertical arm
                }
                let xx = x + dx - hr;
                window.push(src[y * width + xx]);
            }
            window.sort_by(|a, b| a.partial_cmp(b).unwrap());
            out[y * width + x] = window[window.len() / 2];
        }
    }
    out
}

/// 1D sliding-window median, odd `size`. Border elements (within `size/2`
/// of either end) are copied unchanged.
pub fn median_1d(src: &[f32], size: usize) -> Vec<f32> {
    assert!(size % 2 == 1);
    let r = size / 2;
    let mut out = src.to_vec();
    if src.len() <= 2 * r {
        return out;
    }
    let mut window = Vec::with_capacity(size);
    for i in r..src.len() - r {
        window.clear();
        window.extend_from_slice(&src[i - r..=i + r]);
        window.sort_by(|a, b| a.partial_cmp(b).unwrap());
        out[i] = window[window.len() / 2];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_1d_removes_impulse() {
        let src = [1.0, 1.0, 100.0, 1.0, 1.0, 1.0, 1.0];
        let out = median_1d(&src, 3);
        assert_eq!(out[2], 1.0);
        // border elements unchanged
        assert_eq!(out[0], src[0]);
        assert_eq!(out[6], src[6]);
    }

    #[test]
    fn median_plus_2d_removes_impulse() {
        let width = 7;
        let height = 7;
        let mut src = vec![1.0f32; width * height];
        src[3 * width + 3] = 999.0;
        let out = median_plus_2d(&src, width, height, 3, 3);
        assert_eq!(out[3 * width + 3], 1.0);
    }

    #[test]
    fn median_plus_2d_leaves_border_unchanged() {
        let width = 5;
        let height = 5;
        let src: Vec<f32> = (0..width * height).map(|i| i as f32).collect();
        let out = median_plus_2d(&src, width, height, 3, 3);
        assert_eq!(out[0], src[0]);
        assert_eq!(out[width - 1], src[width - 1]);
    }
}
