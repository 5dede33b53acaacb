use crate::accumulator::AccumulatorArray;
use crate::config::{Config, SpeciesCfg};
use crate::grid::Grid;
use crate::interp::{uniform_table, Interpolator};
use crate::pipelines::Pipelines;
use crate::prtls::{Particle, Species};
use crate::Float;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::prelude::*;
use rand_distr::StandardNormal;

// Crossings allowed per pass when finishing movers that ran out of
// crossings during the push.
const RESUME_CROSSINGS: usize = 8;

/// A single domain with a fixed, uniform field.
///
/// There is no field solve and no neighbouring domain: currents are
/// deposited and reduced every step but not fed back, and particles
/// that reach an `absorb` face are removed.
pub struct Sim {
    pub grid: Grid,
    pub interpolators: Vec<Interpolator>,
    pub accumulators: AccumulatorArray,
    pub species: Vec<Species>,
    pub pipelines: Pipelines,
    pub t: u32,
}

fn load_species(grid: &Grid, cfg: &SpeciesCfg, rng: &mut StdRng) -> Species {
    let mut sp = Species::new(&cfg.name, cfg.q, cfg.m, cfg.max_nm);
    let w = cfg.q * cfg.n0 * grid.dx * grid.dy * grid.dz / cfg.ppc as Float;
    sp.p.reserve(grid.n_interior() * cfg.ppc);
    for voxel in grid.interior_voxels() {
        for _ in 0..cfg.ppc {
            let offset = [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ];
            let mut u = cfg.ud;
            for u in u.iter_mut() {
                let r: Float = rng.sample(StandardNormal);
                *u += cfg.uth * r;
            }
            sp.p.push(Particle::new(voxel, offset, u, w));
        }
    }
    sp
}

impl Sim {
    pub fn new(cfg: &Config) -> Result<Sim> {
        cfg.validate()?;
        let grid = Grid::from_config(&cfg.grid);
        let pipelines = Pipelines::new(cfg.setup.n_pipeline)
            .with_context(|| format!("Could not set up {} pipelines", cfg.setup.n_pipeline))?;
        let accumulators = AccumulatorArray::new(pipelines.n_pipeline(), &grid);
        let interpolators = uniform_table(&grid, cfg.fields.e0, cfg.fields.cb0);

        let mut rng = StdRng::seed_from_u64(cfg.setup.seed);
        let mut species: Vec<Species> = cfg
            .species
            .iter()
            .map(|sp| load_species(&grid, sp, &mut rng))
            .collect();
        // loaded momenta are at t = 0, the push wants them at -dt/2
        for sp in species.iter_mut() {
            sp.uncenter(&pipelines, &interpolators, &grid);
        }

        Ok(Sim {
            grid,
            interpolators,
            accumulators,
            species,
            pipelines,
            t: 0,
        })
    }

    pub fn n_particles(&self) -> usize {
        self.species.iter().map(|sp| sp.p.len()).sum()
    }

    /// Advances every species one step and reduces the currents.
    ///
    /// A push that left particles without a mover slot is redone from
    /// the saved particles with a larger mover arena. Movers that ran
    /// out of crossings are resumed until only those leaving the domain
    /// remain, and those are absorbed.
    pub fn step(&mut self) -> Result<()> {
        self.accumulators.clear();
        for sp in self.species.iter_mut() {
            let saved_p = sp.p.clone();
            let saved_acc = self.accumulators.clone();
            let mut report = sp.advance(
                &self.pipelines,
                &self.interpolators,
                &self.grid,
                &mut self.accumulators,
            )?;
            while report.n_ignored > 0 {
                let max_nm = (2 * sp.max_nm()).max(self.pipelines.n_pipeline());
                warn!(
                    "t = {} {}: no mover slot for {} particles, redoing the push with max_nm = {}",
                    self.t, sp.name, report.n_ignored, max_nm
                );
                sp.p.copy_from_slice(&saved_p);
                self.accumulators.clone_from(&saved_acc);
                sp.set_max_nm(max_nm);
                report = sp.advance(
                    &self.pipelines,
                    &self.interpolators,
                    &self.grid,
                    &mut self.accumulators,
                )?;
            }

            let mut pending = report.nm;
            while sp.n_leaving(&self.grid) < pending {
                pending = sp.resume_movers(
                    &self.grid,
                    self.accumulators.total_mut(),
                    RESUME_CROSSINGS,
                );
            }
            let absorbed = sp.absorb_movers(&self.grid);
            if report.nm > 0 {
                debug!(
                    "t = {} {}: {} movers, {} absorbed",
                    self.t, sp.name, report.nm, absorbed
                );
            }
        }
        self.accumulators.reduce();
        self.t += 1;
        Ok(())
    }

    /// Kinetic energy of every species, in species order.
    pub fn kinetic_energies(&self) -> Vec<f64> {
        self.species
            .iter()
            .map(|sp| sp.energy(&self.pipelines, &self.interpolators, &self.grid))
            .collect()
    }

    pub fn center(&mut self) {
        for sp in self.species.iter_mut() {
            sp.center(&self.pipelines, &self.interpolators, &self.grid);
        }
    }
}

pub fn run(cfg: Config) -> Result<()> {
    let mut sim = Sim::new(&cfg)?;
    info!(
        "Loaded {} particles on {} cells with {} pipelines",
        sim.n_particles(),
        sim.grid.n_interior(),
        sim.pipelines.n_pipeline()
    );

    while sim.t < cfg.setup.t_final {
        if sim.t % cfg.setup.energy_interval == 0 {
            for (sp, en) in sim.species.iter().zip(sim.kinetic_energies()) {
                info!("t = {:5} {:>10} energy = {:.6e}", sim.t, sp.name, en);
            }
        }
        sim.step()?;
    }

    sim.center();
    for sp in sim.species.iter() {
        let mean_gamma = if sp.p.is_empty() {
            1.0
        } else {
            sp.p.iter().map(|p| p.gamma() as f64).sum::<f64>() / sp.p.len() as f64
        };
        info!(
            "t = {:5} {:>10} particles = {} mean gamma = {:.6}",
            sim.t,
            sp.name,
            sp.p.len(),
            mean_gamma
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bc: &str, n_pipeline: usize) -> Config {
        format!(
            r#"
            [grid]
            nx = 4
            ny = 4
            nz = 4
            dx = 1.0
            dy = 1.0
            dz = 1.0
            dt = 0.5
            cvac = 1.0
            particle_bc = ["{bc}", "{bc}", "{bc}"]

            [setup]
            t_final = 4
            n_pipeline = {n}
            energy_interval = 2
            seed = 7

            [fields]
            e0 = [0.0, 0.0, 0.0]
            cb0 = [0.0, 0.0, 0.5]

            [[species]]
            name = "electron"
            q = -1.0
            m = 1.0
            ppc = 8
            n0 = 1.0
            uth = 0.2
            max_nm = 256
            "#,
            bc = bc,
            n = n_pipeline
        )
        .parse()
        .unwrap()
    }

    #[test]
    fn loads_particles() {
        let sim = Sim::new(&config("periodic", 2)).unwrap();
        assert_eq!(sim.n_particles(), 4 * 4 * 4 * 8);
        let sp = &sim.species[0];
        assert!(sp.p.iter().all(|p| sim.grid.is_interior(p.i)));
        assert!(sp.p.iter().all(|p| p.offset().iter().all(|x| x.abs() <= 1.0)));
        // charge weight of one cell shared by 8 particles
        assert!(sp.p.iter().all(|p| p.w == -0.125));
    }

    #[test]
    fn same_seed_same_run() {
        let mut a = Sim::new(&config("periodic", 3)).unwrap();
        let mut b = Sim::new(&config("periodic", 3)).unwrap();
        for _ in 0..3 {
            a.step().unwrap();
            b.step().unwrap();
        }
        assert_eq!(a.species[0].p, b.species[0].p);
        assert_eq!(a.accumulators.total(), b.accumulators.total());
        assert_eq!(a.kinetic_energies(), b.kinetic_energies());
    }

    #[test]
    fn periodic_box_keeps_everyone() {
        let mut sim = Sim::new(&config("periodic", 2)).unwrap();
        let n = sim.n_particles();
        for _ in 0..4 {
            sim.step().unwrap();
        }
        assert_eq!(sim.t, 4);
        assert_eq!(sim.n_particles(), n);
        // a pure magnetic field does no work
        let before = Sim::new(&config("periodic", 2)).unwrap().kinetic_energies()[0];
        let after = sim.kinetic_energies()[0];
        assert!((after - before).abs() < 1E-4 * before.abs());
    }

    #[test]
    fn absorbing_box_loses_particles() {
        let mut sim = Sim::new(&config("absorb", 2)).unwrap();
        let n = sim.n_particles();
        for _ in 0..4 {
            sim.step().unwrap();
        }
        assert!(sim.n_particles() < n);
        assert!(sim.species[0].movers().is_empty());
        let sp = &sim.species[0];
        assert!(sp.p.iter().all(|p| sim.grid.is_interior(p.i)));
    }

    #[test]
    fn short_of_mover_slots_keeps_everyone() {
        // every particle crosses about ten cells per step
        let cfg: Config = r#"
            [grid]
            nx = 4
            ny = 4
            nz = 4
            dx = 0.05
            dy = 0.05
            dz = 0.05
            dt = 0.5
            cvac = 1.0

            [setup]
            t_final = 1
            n_pipeline = 2
            energy_interval = 1

            [[species]]
            name = "electron"
            q = -1.0
            m = 1.0
            ppc = 2
            n0 = 1.0
            uth = 0.0
            ud = [3.0, 0.0, 0.0]
            max_nm = 1
            "#
        .parse()
        .unwrap();
        let mut sim = Sim::new(&cfg).unwrap();
        let n = sim.n_particles();
        assert_eq!(n, 128);
        sim.step().unwrap();

        assert_eq!(sim.n_particles(), n);
        let sp = &sim.species[0];
        assert!(sp.movers().is_empty());
        assert!(sp.max_nm() > 1);
        assert!(sp.p.iter().all(|p| sim.grid.is_interior(p.i)));
        assert!(sp.p.iter().all(|p| p.offset().iter().all(|x| x.abs() <= 1.0)));

        // the whole displacement of every particle made it into jx
        let half_disp = 3.0 * sim.grid.cdt_d()[0] / (10.0 as Float).sqrt();
        let w: Float = sp.p.iter().map(|p| p.w).sum();
        let jx: Float = sim
            .accumulators
            .total()
            .iter()
            .map(|a| a.jx.iter().sum::<Float>())
            .sum();
        let expected = 4.0 * w * half_disp;
        assert!(((jx - expected) / expected).abs() < 1E-3);
    }

    #[test]
    fn run_to_completion() {
        assert!(run(config("reflect", 1)).is_ok());
    }
}
