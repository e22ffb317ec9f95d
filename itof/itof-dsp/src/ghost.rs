//! Recursive min-max ghost masking: flags pixels whose neighborhood spans
//! more than a threshold range, run forward and reversed and AND-combined
//! to suppress directional edge bias.

fn window_minmax(
    values: &[f32],
    valid: &[bool],
    width: usize,
    height: usize,
    vwin: usize,
    hwin: usize,
    x: usize,
    y: usize,
) -> (f32, f32) {
    let vr = vwin / 2;
    let hr = hwin / 2;
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let y0 = y.saturating_sub(vr);
    let y1 = (y + vr + 1).min(height);
    let x0 = x.saturating_sub(hr);
    let x1 = (x + hr + 1).min(width);
    for yy in y0..y1 {
        for xx in x0..x1 {
            let idx = yy * width + xx;
            if valid[idx] {
                min = min.min(values[idx]);
                max = max.max(values[idx]);
            }
        }
    }
    (min, max)
}

/// Flag a pixel as ghosted if `max - min` over its `vwin` by `hwin`
/// neighborhood exceeds `threshold`. A neighborhood with no valid samples
/// (min stays `+inf` or max stays `-inf`) is never flagged.
fn minmax_pass(
    values: &[f32],
    valid: &[bool],
    width: usize,
    height: usize,
    vwin: usize,
    hwin: usize,
    threshold: f32,
) -> Vec<bool> {
    let mut flags = vec![false; width * height];
    for y in 0..height {
        for x in 0..width {
            let (min, max) = window_minmax(values, valid, width, height, vwin, hwin, x, y);
            if min.is_infinite() || max.is_infinite() {
                continue;
            }
            flags[y * width + x] = (max - min) > threshold;
        }
    }
    flags
}

fn reverse_in_place(values: &[f32], valid: &[bool], width: usize, height: usize) -> (Vec<f32>, Vec<bool>) {
    let mut rv = values.to_vec();
    let mut rb = valid.to_vec();
    for y in 0..height {
        let row = y * width..(y + 1) * width;
        rv[row.clone()].reverse();
        rb[row].reverse();
    }
    rv.reverse_rows(height, width);
    rb.reverse_rows(height, width);
    (rv, rb)
}

trait ReverseRows {
    fn reverse_rows(&mut self, height: usize, width: usize);
}

impl<T: Copy> ReverseRows for Vec<T> {
    fn reverse_rows(&mut self, height: usize, width: usize) {
        for y in 0..height / 2 {
            let (top, bottom) = (y, height - 1 - y);
            for x in 0..width {
                self.swap(top * width + x, bottom * width + x);
            }
        }
    }
}

/// Run the min-max ghost pass both forward and on the row/column-reversed
/// field, then AND the two flag maps together (mapped back to original
/// orientation) to suppress bias from scan direction.
pub fn recursive_minmax(
    values: &[f32],
    valid: &[bool],
    width: usize,
    height: usize,
    vwin: usize,
    hwin: usize,
    threshold: f32,
) -> Vec<bool> {
    assert_eq!(values.len(), width * height);
    assert_eq!(valid.len(), width * height);

    let forward = minmax_pass(values, valid, width, height, vwin, hwin, threshold);

    let (rvalues, rvalid) = reverse_in_place(values, valid, width, height);
    let mut reverse = minmax_pass(&rvalues, &rvalid, width, height, vwin, hwin, threshold);
    reverse.reverse_rows(height, width);
    for row in reverse.chunks_mut(width) {
        row.reverse();
    }

    forward
        .iter()
        .zip(reverse.iter())
        .map(|(&f, &r)| f && r)
        .collect()
}
