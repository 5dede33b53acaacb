use super::mover::{move_p, Resolution};
use super::{MoverSegment, PipelineArgs};
use crate::accumulator::{accumulate_j, Accumulator};
use crate::prtls::push::{inv_gamma, rotate};
use crate::prtls::{Mover, Particle};

/// Everything one pipeline owns while it advances its share of a
/// species.
pub struct AdvanceSlot<'a> {
    /// Index of `particles[0]` in the species.
    pub offset: usize,
    pub particles: &'a mut [Particle],
    /// Index of `movers[0]` in the species mover array.
    pub mover_offset: usize,
    pub movers: &'a mut [Mover],
    /// This pipeline's accumulator replica.
    pub accumulators: &'a mut [Accumulator],
}

/// Boris push and charge-conserving deposit for one pipeline.
///
/// Momenta go from t - dt/2 to t + dt/2 and positions from t to
/// t + dt. A particle that leaves its voxel is handed to `move_p` with
/// as many crossings as there are free mover slots left. If it cannot
/// be finished it takes the next free slot, or is only counted when
/// there is none.
///
/// The budget is the number of slots still free when the particle is
/// reached, so whether a particle finishes depends on how many movers
/// the particles before it in the same slot have already stored.
pub fn advance_p_pipeline(args: &PipelineArgs, slot: AdvanceSlot) -> MoverSegment {
    let AdvanceSlot {
        offset,
        particles,
        mover_offset,
        movers,
        accumulators,
    } = slot;
    let grid = args.grid;
    let interpolators = args.interpolators;
    let qdt_2mc = args.q_m * grid.dt / (2.0 * grid.cvac);
    let cdt_d = grid.cdt_d();

    let mut nm = 0;
    let mut n_ignored = 0;
    for (k, p) in particles.iter_mut().enumerate() {
        if !cfg!(feature = "unchecked") {
            assert!(p.i < interpolators.len());
            assert!(p.i < accumulators.len());
        }
        let f = unsafe { interpolators.get_unchecked(p.i) };
        let s = p.offset();
        let e = f.electric(s[0], s[1], s[2]);
        let cb = f.magnetic(s[0], s[1], s[2]);
        let hax = [qdt_2mc * e[0], qdt_2mc * e[1], qdt_2mc * e[2]];

        let mut u = p.momentum();
        for (u, h) in u.iter_mut().zip(hax.iter()) {
            *u += h;
        }
        u = rotate(u, cb, qdt_2mc * inv_gamma(u));
        for (u, h) in u.iter_mut().zip(hax.iter()) {
            *u += h;
        }
        p.set_momentum(u);

        let rg = inv_gamma(u);
        let disp = [u[0] * cdt_d[0] * rg, u[1] * cdt_d[1] * rg, u[2] * cdt_d[2] * rg];
        let mid = [s[0] + disp[0], s[1] + disp[1], s[2] + disp[2]];
        let end = [mid[0] + disp[0], mid[1] + disp[1], mid[2] + disp[2]];

        // NaN fails the test and goes to the mover
        if end.iter().all(|x| x.abs() <= 1.0) {
            p.set_offset(end);
            unsafe {
                accumulate_j(accumulators.get_unchecked_mut(p.i), p.w, disp, mid);
            }
            continue;
        }

        let mut pm = Mover {
            disp,
            i: offset + k,
            face: None,
        };
        let free = movers.len() - nm;
        match move_p(p, &mut pm, accumulators, grid, free) {
            Resolution::Done => {}
            Resolution::Exhausted | Resolution::Exchange => {
                if nm < movers.len() {
                    movers[nm] = pm;
                    nm += 1;
                } else {
                    n_ignored += 1;
                }
            }
        }
    }

    MoverSegment {
        first: mover_offset,
        count: nm,
        n_ignored,
    }
}
