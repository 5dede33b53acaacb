use super::PipelineArgs;
use crate::prtls::push::{inv_gamma, rotate, unrotate};
use crate::prtls::Particle;

// Half an electric kick and half a magnetic rotation, the missing half
// step between a leapfrog momentum and the particle time level.
pub fn center_p_pipeline(args: &PipelineArgs, particles: &mut [Particle]) {
    let qdt_2mc = args.q_m * args.grid.dt / (2.0 * args.grid.cvac);
    let qdt_4mc = 0.5 * qdt_2mc;
    let interpolators = args.interpolators;

    for p in particles.iter_mut() {
        if !cfg!(feature = "unchecked") {
            assert!(p.i < interpolators.len());
        }
        let f = unsafe { interpolators.get_unchecked(p.i) };
        let e = f.electric(p.dx, p.dy, p.dz);
        let cb = f.magnetic(p.dx, p.dy, p.dz);
        let u = [
            p.ux + qdt_2mc * e[0],
            p.uy + qdt_2mc * e[1],
            p.uz + qdt_2mc * e[2],
        ];
        p.set_momentum(rotate(u, cb, qdt_4mc * inv_gamma(u)));
    }
}

pub fn uncenter_p_pipeline(args: &PipelineArgs, particles: &mut [Particle]) {
    let qdt_2mc = args.q_m * args.grid.dt / (2.0 * args.grid.cvac);
    let qdt_4mc = 0.5 * qdt_2mc;
    let interpolators = args.interpolators;

    for p in particles.iter_mut() {
        if !cfg!(feature = "unchecked") {
            assert!(p.i < interpolators.len());
        }
        let f = unsafe { interpolators.get_unchecked(p.i) };
        let e = f.electric(p.dx, p.dy, p.dz);
        let cb = f.magnetic(p.dx, p.dy, p.dz);
        // the rotation keeps |u|, so γ is the same before and after it
        let u = p.momentum();
        let u = unrotate(u, cb, qdt_4mc * inv_gamma(u));
        p.set_momentum([
            u[0] - qdt_2mc * e[0],
            u[1] - qdt_2mc * e[1],
            u[2] - qdt_2mc * e[2],
        ]);
    }
}
