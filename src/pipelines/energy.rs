use super::PipelineArgs;
use crate::prtls::Particle;

/// Sum of `w (γ - 1)` over `particles`, with momenta brought forward
/// by half an electric kick first.
///
/// γ - 1 is evaluated as `u² / (γ + 1)`, which stays accurate for cold
/// particles where `γ - 1` would cancel.
pub fn energy_p_pipeline(args: &PipelineArgs, particles: &[Particle]) -> f64 {
    let qdt_2mc = args.q_m * args.grid.dt / (2.0 * args.grid.cvac);
    let interpolators = args.interpolators;

    let mut en = 0.0f64;
    for p in particles.iter() {
        if !cfg!(feature = "unchecked") {
            assert!(p.i < interpolators.len());
        }
        let f = unsafe { interpolators.get_unchecked(p.i) };
        let e = f.electric(p.dx, p.dy, p.dz);
        let ux = (p.ux + qdt_2mc * e[0]) as f64;
        let uy = (p.uy + qdt_2mc * e[1]) as f64;
        let uz = (p.uz + qdt_2mc * e[2]) as f64;
        let u2 = ux * ux + (uy * uy + uz * uz);
        en += p.w as f64 * (u2 / ((1.0 + u2).sqrt() + 1.0));
    }
    en
}
