pub mod accumulator;
pub mod config;
pub mod grid;
pub mod interp;
pub mod pipelines;
pub mod prtls;
pub mod sim;

// We use a type alias for f64/Float to easily support
// double and single precision.
#[cfg(feature = "dprec")]
pub type Float = f64;

#[cfg(not(feature = "dprec"))]
pub type Float = f32;

// Particles are handed to pipelines in blocks of this size so that
// worker boundaries stay aligned.
pub const PRTL_CHUNK_SIZE: usize = 16;

pub use crate::accumulator::{Accumulator, AccumulatorArray};
pub use crate::config::Config;
pub use crate::grid::{Face, Grid, Neighbor, ParticleBc};
pub use crate::interp::Interpolator;
pub use crate::pipelines::{AdvanceReport, MoverSegment, PipelineArgs, Pipelines};
pub use crate::prtls::{Mover, Particle, Species};
pub use crate::sim::{run, Sim};

#[cfg(all(test, not(feature = "dprec")))]
pub(crate) const E_TOL: Float = 1E-5;

#[cfg(all(test, feature = "dprec"))]
pub(crate) const E_TOL: Float = 1E-11;

#[cfg(test)]
pub(crate) fn build_test_grid() -> Grid {
    // A small periodic grid used by the unit tests. The cell sizes
    // are chosen so that c dt / d is a different number on every axis.
    Grid::new([4, 3, 5], [1.0, 0.5, 2.0], 0.5, 1.0)
}
