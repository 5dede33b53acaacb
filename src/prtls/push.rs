use crate::Float;

const ONE_THIRD: Float = 1.0 / 3.0;
const TWO_FIFTEENTHS: Float = 2.0 / 15.0;

/// 1 / γ for a momentum per mass in units of c.
#[inline(always)]
pub(crate) fn inv_gamma(u: [Float; 3]) -> Float {
    1.0 / (1.0 + (u[0] * u[0] + (u[1] * u[1] + u[2] * u[2]))).sqrt()
}

// Boris scalars. `v0` is q dt' / (2 m c γ) for the rotation interval dt'.
// v3 is tan(θ/2)/|cB| from a series in θ, v4 = 2 v3 / (1 + |v3 cB|²).
#[inline(always)]
fn rotation_scalars(v0: Float, cb: [Float; 3]) -> (Float, Float) {
    let v1 = cb[0] * cb[0] + (cb[1] * cb[1] + cb[2] * cb[2]);
    let v2 = (v0 * v0) * v1;
    let v3 = v0 * (1.0 + v2 * (ONE_THIRD + v2 * TWO_FIFTEENTHS));
    let mut v4 = v3 / (1.0 + v1 * (v3 * v3));
    v4 += v4;
    (v3, v4)
}

/// Rotates `u` about c·B. The result has the same norm as `u` for any
/// field strength or step, only the angle depends on `v0`.
#[inline(always)]
pub(crate) fn rotate(u: [Float; 3], cb: [Float; 3], v0: Float) -> [Float; 3] {
    let (v3, v4) = rotation_scalars(v0, cb);
    let [ux, uy, uz] = u;
    let w0 = ux + v3 * (uy * cb[2] - uz * cb[1]);
    let w1 = uy + v3 * (uz * cb[0] - ux * cb[2]);
    let w2 = uz + v3 * (ux * cb[1] - uy * cb[0]);
    [
        ux + v4 * (w1 * cb[2] - w2 * cb[1]),
        uy + v4 * (w2 * cb[0] - w0 * cb[2]),
        uz + v4 * (w0 * cb[1] - w1 * cb[0]),
    ]
}

/// Inverse of `rotate` for the same `cb` and `v0`.
#[inline(always)]
pub(crate) fn unrotate(u: [Float; 3], cb: [Float; 3], v0: Float) -> [Float; 3] {
    let (v3, v4) = rotation_scalars(v0, cb);
    let [ux, uy, uz] = u;
    let w0 = ux - v3 * (uy * cb[2] - uz * cb[1]);
    let w1 = uy - v3 * (uz * cb[0] - ux * cb[2]);
    let w2 = uz - v3 * (ux * cb[1] - uy * cb[0]);
    [
        ux - v4 * (w1 * cb[2] - w2 * cb[1]),
        uy - v4 * (w2 * cb[0] - w0 * cb[2]),
        uz - v4 * (w0 * cb[1] - w1 * cb[0]),
    ]
}
