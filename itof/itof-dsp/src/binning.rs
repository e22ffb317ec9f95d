//! Grid (2D) and stripe (1D) binning. Only factors 1, 2, 4 are supported;
//! factor 4 is two successive factor-2 passes.

fn bin2x2(data: &[f32], width: usize, height: usize) -> (Vec<f32>, usize, usize) {
    assert_eq!(width % 2, 0);
    assert_eq!(height % 2, 0);
    let nw = width / 2;
    let nh = height / 2;
    let mut out = vec![0.0f32; nw * nh];
    for y in 0..nh {
        for x in 0..nw {
            let sum = data[(2 * y) * width + 2 * x]
                + data[(2 * y) * width + 2 * x + 1]
                + data[(2 * y + 1) * width + 2 * x]
                + data[(2 * y + 1) * width + 2 * x + 1];
            out[y * nw + x] = sum * 0.25;
        }
    }
    (out, nw, nh)
}

/// Bin a 2D grid buffer by `factor` (1, 2, or 4). Factor 4 is implemented
/// as two successive 2x2 passes.
pub fn bin_grid(data: &[f32], width: usize, height: usize, factor: u16) -> (Vec<f32>, usize, usize) {
    match factor {
        1 => (data.to_vec(), width, height),
        2 => bin2x2(data, width, height),
        4 => {
            let (once, w1, h1) = bin2x2(data, width, height);
            bin2x2(&once, w1, h1)
        }
        other => panic!("unsupported grid binning factor {other}"),
    }
}

fn bin1x2(data: &[f32], width: usize) -> (Vec<f32>, usize) {
    assert_eq!(width % 2, 0);
    let nw = width / 2;
    let mut out = vec![0.0f32; nw];
    for x in 0..nw {
        out[x] = 0.5 * (data[2 * x] + data[2 * x + 1]);
    }
    (out, nw)
}

/// Bin a 1D stripe row by `factor` (1, 2, or 4).
pub fn bin_stripe(data: &[f32], width: usize, factor: u16) -> (Vec<f32>, usize) {
    match factor {
        1 => (data.to_vec(), width),
        2 => bin1x2(data, width),
        4 => {
            let (once, w1) = bin1x2(data, width);
            bin1x2(&once, w1)
        }
        other => panic!("unsupported stripe binning factor {other}"),
    }
}
