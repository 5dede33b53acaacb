use crate::config::GridCfg;
use crate::Float;
use serde::Deserialize;
use strength_reduce::StrengthReducedUsize;

/// What happens to a particle that reaches a face of the local domain.
///
/// - `Periodic`: the particle re-enters from the opposite face.
/// - `Reflect`: the normal momentum and the remaining displacement are
/// flipped and the particle stays in its cell.
/// - `Absorb`: the particle is parked on the face and handed back to the
/// caller, which either exchanges it with a neighbouring domain or
/// deletes it.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParticleBc {
    Periodic,
    Reflect,
    Absorb,
}

/// The six faces of a voxel. The negative faces come first so that
/// `face as usize` is `axis` for the lower face and `axis + 3` for the
/// upper one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Face {
    NegX,
    NegY,
    NegZ,
    PosX,
    PosY,
    PosZ,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::NegX,
        Face::NegY,
        Face::NegZ,
        Face::PosX,
        Face::PosY,
        Face::PosZ,
    ];

    #[inline(always)]
    pub fn new(axis: usize, positive: bool) -> Face {
        if !cfg!(feature = "unchecked") {
            assert!(axis < 3);
        }
        Face::ALL[axis + if positive { 3 } else { 0 }]
    }

    #[inline(always)]
    pub fn axis(self) -> usize {
        self as usize % 3
    }

    #[inline(always)]
    pub fn is_positive(self) -> bool {
        self as usize >= 3
    }

    pub fn opposite(self) -> Face {
        Face::new(self.axis(), !self.is_positive())
    }
}

/// Result of looking across a face of a local voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Neighbor {
    /// Voxel index of the cell on the other side.
    Local(usize),
    Reflect,
    /// The other side belongs to somebody else.
    Remote,
}

/// Geometry of the local domain.
///
/// The domain has `nx * ny * nz` interior cells surrounded by one
/// layer of ghost cells. Voxels are stored x-fastest:
/// `voxel = ix + (nx + 2) * (iy + (ny + 2) * iz)` with the interior at
/// `1..=n` on every axis. Node `(ix, iy, iz)` sits on the lower corner
/// of voxel `(ix, iy, iz)`.
#[derive(Clone, Debug)]
pub struct Grid {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub dx: Float,
    pub dy: Float,
    pub dz: Float,
    pub rdx: Float,
    pub rdy: Float,
    pub rdz: Float,
    pub dt: Float,
    pub cvac: Float,
    bc: [ParticleBc; 6],
    sx: StrengthReducedUsize,
    sy: StrengthReducedUsize,
}

impl Grid {
    /// A grid with periodic particle boundaries on every face.
    pub fn new(n: [usize; 3], d: [Float; 3], dt: Float, cvac: Float) -> Grid {
        Grid {
            nx: n[0],
            ny: n[1],
            nz: n[2],
            dx: d[0],
            dy: d[1],
            dz: d[2],
            rdx: 1.0 / d[0],
            rdy: 1.0 / d[1],
            rdz: 1.0 / d[2],
            dt,
            cvac,
            bc: [ParticleBc::Periodic; 6],
            sx: StrengthReducedUsize::new(n[0] + 2),
            sy: StrengthReducedUsize::new(n[1] + 2),
        }
    }

    pub fn from_config(cfg: &GridCfg) -> Grid {
        let mut grid = Grid::new(
            [cfg.nx, cfg.ny, cfg.nz],
            [cfg.dx, cfg.dy, cfg.dz],
            cfg.dt,
            cfg.cvac,
        );
        for (axis, &bc) in cfg.particle_bc.iter().enumerate() {
            grid = grid.with_axis_bc(axis, bc);
        }
        grid
    }

    pub fn with_particle_bc(mut self, face: Face, bc: ParticleBc) -> Grid {
        self.bc[face as usize] = bc;
        self
    }

    pub fn with_axis_bc(self, axis: usize, bc: ParticleBc) -> Grid {
        self.with_particle_bc(Face::new(axis, false), bc)
            .with_particle_bc(Face::new(axis, true), bc)
    }

    pub fn particle_bc(&self, face: Face) -> ParticleBc {
        self.bc[face as usize]
    }

    #[inline(always)]
    pub fn n_cells(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Number of voxels including the ghost layer.
    pub fn n_voxel(&self) -> usize {
        (self.nx + 2) * (self.ny + 2) * (self.nz + 2)
    }

    pub fn n_interior(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    #[inline(always)]
    pub fn voxel(&self, ix: usize, iy: usize, iz: usize) -> usize {
        ix + (self.nx + 2) * (iy + (self.ny + 2) * iz)
    }

    #[inline(always)]
    pub fn coords(&self, voxel: usize) -> (usize, usize, usize) {
        let ix = voxel % self.sx;
        let rest = voxel / self.sx;
        (ix, rest % self.sy, rest / self.sy)
    }

    pub fn is_interior(&self, voxel: usize) -> bool {
        let (ix, iy, iz) = self.coords(voxel);
        (1..=self.nx).contains(&ix) && (1..=self.ny).contains(&iy) && (1..=self.nz).contains(&iz)
    }

    /// Interior voxels in storage order.
    pub fn interior_voxels(&self) -> impl Iterator<Item = usize> + '_ {
        (1..=self.nz).flat_map(move |iz| {
            (1..=self.ny).flat_map(move |iy| (1..=self.nx).map(move |ix| self.voxel(ix, iy, iz)))
        })
    }

    /// Converts a momentum per mass into a normalized half displacement
    /// per unit Lorentz factor, one entry per axis.
    #[inline(always)]
    pub fn cdt_d(&self) -> [Float; 3] {
        [
            self.cvac * self.dt * self.rdx,
            self.cvac * self.dt * self.rdy,
            self.cvac * self.dt * self.rdz,
        ]
    }

    /// What lies across `face` of the interior voxel `voxel`.
    pub fn neighbor(&self, voxel: usize, face: Face) -> Neighbor {
        let (ix, iy, iz) = self.coords(voxel);
        let mut c = [ix, iy, iz];
        let n = self.n_cells();
        let axis = face.axis();
        if face.is_positive() {
            if c[axis] < n[axis] {
                c[axis] += 1;
                return Neighbor::Local(self.voxel(c[0], c[1], c[2]));
            }
        } else if c[axis] > 1 {
            c[axis] -= 1;
            return Neighbor::Local(self.voxel(c[0], c[1], c[2]));
        }

        match self.bc[face as usize] {
            ParticleBc::Periodic => {
                c[axis] = if face.is_positive() { 1 } else { n[axis] };
                Neighbor::Local(self.voxel(c[0], c[1], c[2]))
            }
            ParticleBc::Reflect => Neighbor::Reflect,
            ParticleBc::Absorb => Neighbor::Remote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_test_grid;

    #[test]
    fn voxel_order() {
        let grid = build_test_grid();
        let mut index = 0;
        for iz in 0..grid.nz + 2 {
            for iy in 0..grid.ny + 2 {
                for ix in 0..grid.nx + 2 {
                    assert_eq!(grid.voxel(ix, iy, iz), index);
                    assert_eq!(grid.coords(index), (ix, iy, iz));
                    index += 1;
                }
            }
        }
        assert_eq!(index, grid.n_voxel());
    }

    #[test]
    fn interior_voxels() {
        let grid = build_test_grid();
        let interior: Vec<usize> = grid.interior_voxels().collect();
        assert_eq!(interior.len(), grid.n_interior());
        assert!(interior.iter().all(|&v| grid.is_interior(v)));
        assert!(interior.windows(2).all(|w| w[0] < w[1]));
        assert!(!grid.is_interior(0));
        assert!(!grid.is_interior(grid.voxel(grid.nx + 1, 1, 1)));
    }

    #[test]
    fn faces() {
        for (k, &face) in Face::ALL.iter().enumerate() {
            assert_eq!(face as usize, k);
            assert_eq!(face.axis(), k % 3);
            assert_eq!(face.is_positive(), k >= 3);
            assert_eq!(Face::new(face.axis(), face.is_positive()), face);
            assert_eq!(face.opposite().opposite(), face);
            assert_ne!(face.opposite(), face);
        }
    }

    #[test]
    fn neighbors_interior_and_periodic() {
        let grid = build_test_grid();
        let v = grid.voxel(2, 2, 3);
        assert_eq!(grid.neighbor(v, Face::PosX), Neighbor::Local(grid.voxel(3, 2, 3)));
        assert_eq!(grid.neighbor(v, Face::NegY), Neighbor::Local(grid.voxel(2, 1, 3)));
        assert_eq!(grid.neighbor(v, Face::PosZ), Neighbor::Local(grid.voxel(2, 2, 4)));

        // wrap around
        let corner = grid.voxel(grid.nx, 1, grid.nz);
        assert_eq!(grid.neighbor(corner, Face::PosX), Neighbor::Local(grid.voxel(1, 1, grid.nz)));
        assert_eq!(grid.neighbor(corner, Face::NegY), Neighbor::Local(grid.voxel(grid.nx, grid.ny, grid.nz)));
        assert_eq!(grid.neighbor(corner, Face::PosZ), Neighbor::Local(grid.voxel(grid.nx, 1, 1)));
    }

    #[test]
    fn neighbors_at_walls() {
        let grid = build_test_grid()
            .with_axis_bc(0, ParticleBc::Reflect)
            .with_particle_bc(Face::PosZ, ParticleBc::Absorb);
        let v = grid.voxel(1, 1, grid.nz);
        assert_eq!(grid.neighbor(v, Face::NegX), Neighbor::Reflect);
        assert_eq!(grid.neighbor(v, Face::PosZ), Neighbor::Remote);
        assert_eq!(grid.neighbor(v, Face::NegZ), Neighbor::Local(grid.voxel(1, 1, grid.nz - 1)));
        // only the upper z face absorbs
        let bottom = grid.voxel(1, 1, 1);
        assert_eq!(grid.neighbor(bottom, Face::NegZ), Neighbor::Local(grid.voxel(1, 1, grid.nz)));
        assert_eq!(grid.particle_bc(Face::PosX), ParticleBc::Reflect);
    }

    #[test]
    fn displacement_factors() {
        let grid = build_test_grid();
        let cdt_d = grid.cdt_d();
        assert!((cdt_d[0] - 0.5).abs() < crate::E_TOL);
        assert!((cdt_d[1] - 1.0).abs() < crate::E_TOL);
        assert!((cdt_d[2] - 0.25).abs() < crate::E_TOL);
    }
}
