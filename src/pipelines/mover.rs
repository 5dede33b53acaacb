use crate::accumulator::{accumulate_j, Accumulator};
use crate::grid::{Face, Grid, Neighbor};
use crate::prtls::{Mover, Particle};
use crate::Float;

/// How a call to `move_p` ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The whole displacement was deposited.
    Done,
    /// The crossing budget ran out with the particle parked on `pm.face`.
    Exhausted,
    /// The particle reached a face whose other side is not local.
    Exchange,
}

/// Walks particle `p` along `pm.disp`, one cell-bounded streak at a
/// time, depositing every streak into the voxel it was swept in.
///
/// At most `max_crossings` faces are crossed. A particle stopped on a
/// face has the crossed offset set exactly to ±1, `pm.face` records the
/// face and `pm.disp` holds what is left of the displacement, so the
/// same mover can be handed to `move_p` again later.
pub fn move_p(
    p: &mut Particle,
    pm: &mut Mover,
    accumulators: &mut [Accumulator],
    grid: &Grid,
    max_crossings: usize,
) -> Resolution {
    let q = p.w;
    let mut crossings = 0;
    loop {
        let s_mid = p.offset();
        let mut s_disp = pm.disp;
        let s_dir: [Float; 3] = [
            if s_disp[0] > 0.0 { 1.0 } else { -1.0 },
            if s_disp[1] > 0.0 { 1.0 } else { -1.0 },
            if s_disp[2] > 0.0 { 1.0 } else { -1.0 },
        ];

        // Twice the fraction of the streak left before each face. A NaN
        // never wins, so a non-finite displacement ends the track.
        let mut v3: Float = 2.0;
        let mut axis = 3;
        for k in 0..3 {
            let v = if s_disp[k] == 0.0 {
                Float::MAX
            } else {
                (s_dir[k] - s_mid[k]) / s_disp[k]
            };
            if v < v3 {
                v3 = v;
                axis = k;
            }
        }
        v3 *= 0.5;
        for d in s_disp.iter_mut() {
            *d *= v3;
        }

        let mid = [
            s_mid[0] + s_disp[0],
            s_mid[1] + s_disp[1],
            s_mid[2] + s_disp[2],
        ];
        if !cfg!(feature = "unchecked") {
            assert!(p.i < accumulators.len());
        }
        unsafe {
            accumulate_j(accumulators.get_unchecked_mut(p.i), q, s_disp, mid);
        }
        for k in 0..3 {
            pm.disp[k] -= s_disp[k];
        }
        p.set_offset([
            mid[0] + s_disp[0],
            mid[1] + s_disp[1],
            mid[2] + s_disp[2],
        ]);

        if axis == 3 {
            return Resolution::Done;
        }

        let face = Face::new(axis, s_dir[axis] > 0.0);
        *p.offset_mut(axis) = s_dir[axis];
        pm.face = Some(face);
        if crossings == max_crossings {
            return Resolution::Exhausted;
        }
        crossings += 1;

        match grid.neighbor(p.i, face) {
            Neighbor::Local(voxel) => {
                p.i = voxel;
                *p.offset_mut(axis) = -s_dir[axis];
            }
            Neighbor::Reflect => {
                let u = p.momentum_mut(axis);
                *u = -*u;
                pm.disp[axis] = -pm.disp[axis];
            }
            Neighbor::Remote => return Resolution::Exchange,
        }
    }
}

/// Resumes the first `nm` movers with a budget of `max_crossings`
/// each. Movers that are still unresolved are packed to the front of
/// `movers` in their original order and their number is returned.
pub fn resume_movers(
    grid: &Grid,
    particles: &mut [Particle],
    movers: &mut [Mover],
    nm: usize,
    accumulators: &mut [Accumulator],
    max_crossings: usize,
) -> usize {
    let mut kept = 0;
    for k in 0..nm {
        let mut pm = movers[k];
        if !cfg!(feature = "unchecked") {
            assert!(pm.i < particles.len());
        }
        let p = unsafe { particles.get_unchecked_mut(pm.i) };
        match move_p(p, &mut pm, accumulators, grid, max_crossings) {
            Resolution::Done => {}
            Resolution::Exhausted | Resolution::Exchange => {
                movers[kept] = pm;
                kept += 1;
            }
        }
    }
    kept
}
