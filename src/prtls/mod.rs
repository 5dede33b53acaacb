pub mod push;

use crate::accumulator::{Accumulator, AccumulatorArray};
use crate::grid::{Face, Grid, Neighbor};
use crate::interp::Interpolator;
use crate::pipelines::{mover, AdvanceReport, PipelineArgs, Pipelines};
use crate::Float;
use anyhow::Result;

/// A macro-particle.
///
/// `dx, dy, dz` are offsets inside voxel `i`, with the cell spanning
/// [-1, 1] on every axis. `ux, uy, uz` are the momentum per mass in
/// units of c (γ v / c) and `w` is the charge carried by the particle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct Particle {
    pub dx: Float,
    pub dy: Float,
    pub dz: Float,
    pub i: usize,
    pub ux: Float,
    pub uy: Float,
    pub uz: Float,
    pub w: Float,
}

impl Particle {
    pub fn new(i: usize, offset: [Float; 3], u: [Float; 3], w: Float) -> Particle {
        Particle {
            dx: offset[0],
            dy: offset[1],
            dz: offset[2],
            i,
            ux: u[0],
            uy: u[1],
            uz: u[2],
            w,
        }
    }

    #[inline(always)]
    pub fn offset(&self) -> [Float; 3] {
        [self.dx, self.dy, self.dz]
    }

    #[inline(always)]
    pub fn set_offset(&mut self, offset: [Float; 3]) {
        self.dx = offset[0];
        self.dy = offset[1];
        self.dz = offset[2];
    }

    #[inline(always)]
    pub fn momentum(&self) -> [Float; 3] {
        [self.ux, self.uy, self.uz]
    }

    #[inline(always)]
    pub fn set_momentum(&mut self, u: [Float; 3]) {
        self.ux = u[0];
        self.uy = u[1];
        self.uz = u[2];
    }

    #[inline(always)]
    pub(crate) fn offset_mut(&mut self, axis: usize) -> &mut Float {
        match axis {
            0 => &mut self.dx,
            1 => &mut self.dy,
            _ => &mut self.dz,
        }
    }

    #[inline(always)]
    pub(crate) fn momentum_mut(&mut self, axis: usize) -> &mut Float {
        match axis {
            0 => &mut self.ux,
            1 => &mut self.uy,
            _ => &mut self.uz,
        }
    }

    pub fn gamma(&self) -> Float {
        1.0 / push::inv_gamma(self.momentum())
    }
}

/// Displacement still owed to particle `i` after it stopped on a face.
///
/// `disp` is a half displacement in the same units as the offsets, so
/// the particle still has to travel `2 * disp`. `face` is the face the
/// particle is parked on, `None` only for a mover that has not been
/// started yet.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Mover {
    pub disp: [Float; 3],
    pub i: usize,
    pub face: Option<Face>,
}

/// All the particles of one kind together with their mover arena.
pub struct Species {
    pub name: String,
    pub q: Float,
    pub m: Float,
    pub p: Vec<Particle>,
    pub pm: Vec<Mover>,
    /// Movers in use at the front of `pm`.
    pub nm: usize,
}

impl Species {
    pub fn new(name: &str, q: Float, m: Float, max_nm: usize) -> Species {
        Species {
            name: name.to_string(),
            q,
            m,
            p: Vec::new(),
            pm: vec![Mover::default(); max_nm],
            nm: 0,
        }
    }

    pub fn q_m(&self) -> Float {
        self.q / self.m
    }

    pub fn max_nm(&self) -> usize {
        self.pm.len()
    }

    /// Resizes the mover arena. Pending movers past the new size are
    /// dropped.
    pub fn set_max_nm(&mut self, max_nm: usize) {
        self.pm.resize(max_nm, Mover::default());
        self.nm = self.nm.min(max_nm);
    }

    /// Movers left over by the last advance or resume.
    pub fn movers(&self) -> &[Mover] {
        &self.pm[..self.nm]
    }

    fn args<'a>(&self, interpolators: &'a [Interpolator], grid: &'a Grid) -> PipelineArgs<'a> {
        PipelineArgs {
            q_m: self.q_m(),
            interpolators,
            grid,
        }
    }

    /// Advances every particle by one step. Pending movers from a
    /// previous step are overwritten, so the caller must have dealt
    /// with them first.
    pub fn advance(
        &mut self,
        pipelines: &Pipelines,
        interpolators: &[Interpolator],
        grid: &Grid,
        accumulators: &mut AccumulatorArray,
    ) -> Result<AdvanceReport> {
        let args = self.args(interpolators, grid);
        let report = pipelines.advance_p(&args, &mut self.p, &mut self.pm, accumulators)?;
        self.nm = report.nm;
        Ok(report)
    }

    /// Moves momenta from the half step to the particle time level.
    pub fn center(&mut self, pipelines: &Pipelines, interpolators: &[Interpolator], grid: &Grid) {
        let args = self.args(interpolators, grid);
        pipelines.center_p(&args, &mut self.p);
    }

    pub fn uncenter(&mut self, pipelines: &Pipelines, interpolators: &[Interpolator], grid: &Grid) {
        let args = self.args(interpolators, grid);
        pipelines.uncenter_p(&args, &mut self.p);
    }

    /// Kinetic energy of the species in units of m c².
    pub fn energy(&self, pipelines: &Pipelines, interpolators: &[Interpolator], grid: &Grid) -> f64 {
        let args = self.args(interpolators, grid);
        let c = grid.cvac as f64;
        pipelines.energy_p(&args, &self.p) * (self.m as f64) * c * c / (self.q as f64)
    }

    /// Runs the pending movers again with a fresh crossing budget and
    /// keeps the ones that are still unresolved. Returns the new `nm`.
    pub fn resume_movers(
        &mut self,
        grid: &Grid,
        accumulators: &mut [Accumulator],
        max_crossings: usize,
    ) -> usize {
        self.nm = mover::resume_movers(
            grid,
            &mut self.p,
            &mut self.pm,
            self.nm,
            accumulators,
            max_crossings,
        );
        self.nm
    }

    fn leaves_domain(&self, grid: &Grid, pm: &Mover) -> bool {
        match pm.face {
            Some(face) => grid.neighbor(self.p[pm.i].i, face) == Neighbor::Remote,
            None => false,
        }
    }

    /// Number of pending movers parked on a face with nothing local on
    /// the other side.
    pub fn n_leaving(&self, grid: &Grid) -> usize {
        self.movers()
            .iter()
            .filter(|pm| self.leaves_domain(grid, pm))
            .count()
    }

    /// Deletes the particles of pending movers that are leaving the
    /// domain and returns how many were removed. The other movers stay
    /// pending with their particle indices updated. The order of the
    /// surviving particles is kept.
    pub fn absorb_movers(&mut self, grid: &Grid) -> usize {
        let mut doomed = Vec::new();
        let mut kept = 0;
        for k in 0..self.nm {
            let pm = self.pm[k];
            if self.leaves_domain(grid, &pm) {
                doomed.push(pm.i);
            } else {
                self.pm[kept] = pm;
                kept += 1;
            }
        }
        doomed.sort_unstable();
        doomed.dedup();
        for pm in self.pm[..kept].iter_mut() {
            pm.i -= doomed.partition_point(|&d| d < pm.i);
        }
        let mut index = 0;
        self.p.retain(|_| {
            let keep = doomed.binary_search(&index).is_err();
            index += 1;
            keep
        });
        self.nm = kept;
        doomed.len()
    }
}
