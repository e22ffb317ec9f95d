//! Tap rotation: sums three phase-permuted sub-ROI captures into one raw
//! triplet per pixel, or passes a single already-accumulated capture
//! through as a float conversion.

/// One raw (A, B, C) capture.
pub type Triplet = (f32, f32, f32);

fn rotate_right(t: Triplet, by: usize) -> Triplet {
    let (a, b, c) = t;
    match by % 3 {
        0 => (a, b, c),
        1 => (c, a, b),
        _ => (b, c, a),
    }
}

/// Combine three permutation captures (assumed to carry cyclic phase-tap
/// rotations of 0, 1, 2 positions respectively) into one triplet by
/// elementwise sum after un-rotating each capture back to a common frame.
pub fn accumulate_permutations(perms: [Triplet; 3]) -> Triplet {
    let r0 = rotate_right(perms[0], 0);
    let r1 = rotate_right(perms[1], 1);
    let r2 = rotate_right(perms[2], 2);
    (r0.0 + r1.0 + r2.0, r0.1 + r1.1 + r2.1, r0.2 + r1.2 + r2.2)
}

/// Identity pass-through for producers that have already accumulated the
/// three permutations; only performs the integer-to-float conversion.
pub fn passthrough(t: (u16, u16, u16)) -> Triplet {
    (t.0 as f32, t.1 as f32, t.2 as f32)
}
