use crate::grid::ParticleBc;
use crate::Float;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Deserialize)]
pub struct Config {
    pub grid: GridCfg,
    pub setup: Setup,
    #[serde(default)]
    pub fields: FieldsCfg,
    pub species: Vec<SpeciesCfg>,
}

#[derive(Deserialize)]
pub struct GridCfg {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub dx: Float,
    pub dy: Float,
    pub dz: Float,
    pub dt: Float,
    pub cvac: Float,
    /// Particle boundary condition on the x, y and z faces.
    #[serde(default = "periodic")]
    pub particle_bc: [ParticleBc; 3],
}

fn periodic() -> [ParticleBc; 3] {
    [ParticleBc::Periodic; 3]
}

#[derive(Deserialize)]
pub struct Setup {
    pub t_final: u32,
    pub n_pipeline: usize,
    pub energy_interval: u32,
    #[serde(default)]
    pub seed: u64,
}

/// A uniform background field. `cb` is c times the magnetic field.
#[derive(Deserialize, Default)]
pub struct FieldsCfg {
    pub e0: [Float; 3],
    pub cb0: [Float; 3],
}

#[derive(Deserialize)]
pub struct SpeciesCfg {
    pub name: String,
    pub q: Float,
    pub m: Float,
    /// Particles per cell.
    pub ppc: usize,
    /// Number density, sets the charge weight of each particle.
    pub n0: Float,
    /// Thermal spread of each momentum component.
    pub uth: Float,
    /// Drift momentum.
    #[serde(default)]
    pub ud: [Float; 3],
    pub max_nm: usize,
}

impl Config {
    pub fn new() -> Result<Config> {
        Config::from_file("config.toml")
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let contents = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Could not open the {} file", path.as_ref().display())
        })?;
        contents.parse()
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.grid;
        if g.nx == 0 || g.ny == 0 || g.nz == 0 {
            return Err(anyhow::Error::msg("Number of cells must be positive on every axis"));
        }
        if !(g.dx > 0.0 && g.dy > 0.0 && g.dz > 0.0) {
            return Err(anyhow::Error::msg("Cell sizes must be positive"));
        }
        if !(g.dt > 0.0) {
            return Err(anyhow::Error::msg("Time step must be positive"));
        }
        if !(g.cvac > 0.0) {
            return Err(anyhow::Error::msg("Speed of light must be positive"));
        }
        if self.setup.n_pipeline == 0 {
            return Err(anyhow::Error::msg("Need at least one pipeline"));
        }
        if self.setup.energy_interval == 0 {
            return Err(anyhow::Error::msg("Energy interval must be positive"));
        }
        for sp in self.species.iter() {
            if sp.m == 0.0 {
                return Err(anyhow::Error::msg(format!("Species {} has zero mass", sp.name)));
            }
            if sp.q == 0.0 {
                return Err(anyhow::Error::msg(format!("Species {} has zero charge", sp.name)));
            }
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Config> {
        let cfg: Config = toml::from_str(s).with_context(|| "Could not parse Config file")?;
        cfg.validate()?;
        Ok(cfg)
    }
}
