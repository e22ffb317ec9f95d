//! Separable Gaussian smoothing over flat row-major `f32` buffers.

/// Discrete, normalized binomial approximation of a Gaussian for odd
/// kernel sizes 1,3,5,7,9,11,15.
fn kernel(size: usize) -> Vec<f32> {
    assert!(size % 2 == 1, "kernel size must be odd");
    let mut row = vec![1.0f64];
    for _ in 1..size {
        let mut next = vec![0.0f64; row.len() + 1];
        for (i, &c) in row.iter().enumerate() {
            next[i] += c;
            next[i + 1] += c;
        }
        row = next;
    }
    let sum: f64 = row.iter().sum();
    row.into_iter().map(|v| (v / sum) as f32).collect()
}

fn smooth_1d(src: &[f32], dst: &mut [f32], len: usize, stride: usize, count: usize, k: &[f32]) {
    let radius = k.len() / 2;
    for line in 0..count {
        let base = line * stride;
        for i in 0..len {
            if i < radius || i + radius >= len {
                dst[base + i] = src[base + i];
                continue;
            }
            let mut acc = 0.0f32;
            for (t, &w) in k.iter().enumerate() {
                acc += w * src[base + i + t - radius];
            }
            dst[base + i] = acc;
        }
    }
}

/// Smooth `src` (row-major, `width * height`) separably: horizontal pass
/// with kernel size `hk`, then vertical pass with kernel size `vk`. Border
/// pixels (within `radius` of any edge) are copied unchanged in each pass.
pub fn smooth_separable(src: &[f32], width: usize, height: usize, vk: usize, hk: usize) -> Vec<f32> {
    assert_eq!(src.len(), width * height);
    let hkernel = kernel(hk);
    let vkernel = kernel(vk);

    // Horizontal pass: rows are contiguous, stride == width.
    let mut tmp = vec![0.0f32; src.len()];
    smooth_1d(src, &mut tmp, width, width, height, &hkernel);

    // Vertical pass: operate on columns by transposing logically via a
    // column-major scratch buffer, then transpose back.
    let mut col_src = vec![0.0f32; src.len()];
    let mut col_dst = vec![0.0f32; src.len()];
    for y in 0..height {
        for x in 0..width {
            col_src[x * height + y] = tmp[y * width + x];
        }
    }
    smooth_1d(&col_src, &mut col_dst, height, height, width, &vkernel);
    let mut out = vec![0.0f32; src.len()];
    for x in 0..width {
        for y in 0..height {
            out[y * width + x] = col_dst[x * height + y];
        }
    }
    out
}

/// Same binomial weights `kernel(n)` would compute, as a fixed-size array
/// built from the closed-form coefficients instead of the iterative
/// doubling loop. Pascal's-triangle doubling in `f64` is exact for these
/// sizes (sums stay well under 2^53), so the coefficient/sum pairs below
/// are the same values `kernel(n)` arrives at; the division and cast are
/// the identical operation, just evaluated once per call instead of after
/// rebuilding the triangle.
fn kernel5() -> [f32; 5] {
    let sum = 16.0f64;
    [1.0, 4.0, 6.0, 4.0, 1.0].map(|c| (c / sum) as f32)
}

fn kernel7() -> [f32; 7] {
    let sum = 64.0f64;
    [1.0, 6.0, 15.0, 20.0, 15.0, 6.0, 1.0].map(|c| (c / sum) as f32)
}

fn kernel15() -> [f32; 15] {
    let sum = 16384.0f64;
    [1.0, 14.0, 91.0, 364.0, 1001.0, 2002.0, 3003.0, 3432.0, 3003.0, 2002.0, 1001.0, 364.0, 91.0, 14.0, 1.0]
        .map(|c| (c / sum) as f32)
}

/// Vertical pass over `src` (row-major `width * height`) without the
/// general path's transpose buffers: walks each column directly with
/// element stride `width`. Produces the same neighbor values in the same
/// summation order as smoothing a transposed copy with [`smooth_1d`], so
/// it is bit-identical to it, just without allocating or populating the
/// two `height * width`-sized transpose scratch buffers.
fn smooth_1d_cols(src: &[f32], dst: &mut [f32], width: usize, height: usize, k: &[f32]) {
    let radius = k.len() / 2;
    for col in 0..width {
        for i in 0..height {
            let idx = i * width + col;
            if i < radius || i + radius >= height {
                dst[idx] = src[idx];
                continue;
            }
            let mut acc = 0.0f32;
            for (t, &w) in k.iter().enumerate() {
                acc += w * src[(i + t - radius) * width + col];
            }
            dst[idx] = acc;
        }
    }
}

fn smooth_separable_fast(src: &[f32], width: usize, height: usize, vk: &[f32], hk: &[f32]) -> Vec<f32> {
    assert_eq!(src.len(), width * height);
    let mut tmp = vec![0.0f32; src.len()];
    smooth_1d(src, &mut tmp, width, width, height, hk);
    let mut out = vec![0.0f32; src.len()];
    smooth_1d_cols(&tmp, &mut out, width, height, vk);
    out
}

/// Specialized entry point for the common 5-tap vertical by 7-tap
/// horizontal kernel: fixed precomputed weights and a direct-strided
/// vertical pass instead of `smooth_separable`'s general transpose. Bit-
/// identical to `smooth_separable(src, width, height, 5, 7)`.
pub fn smooth_5x7(src: &[f32], width: usize, height: usize) -> Vec<f32> {
    smooth_separable_fast(src, width, height, &kernel5(), &kernel7())
}

/// Specialized entry point for the 7-tap vertical by 15-tap horizontal
/// kernel. Bit-identical to `smooth_separable(src, width, height, 7, 15)`.
pub fn smooth_7x15(src: &[f32], width: usize, height: usize) -> Vec<f32> {
    smooth_separable_fast(src, width, height, &kernel7(), &kernel15())
}
