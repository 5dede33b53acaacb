use crate::grid::Grid;
use crate::Float;

/// Trilinear field coefficients for one voxel.
///
/// E components vary bilinearly in the two transverse offsets and
/// c·B components vary linearly along their own axis, which is what a
/// Yee mesh supplies at the cell level. Offsets are the particle's
/// cell-relative coordinates in [-1, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct Interpolator {
    pub ex: Float,
    pub dexdy: Float,
    pub dexdz: Float,
    pub d2exdydz: Float,
    pub ey: Float,
    pub deydz: Float,
    pub deydx: Float,
    pub d2eydzdx: Float,
    pub ez: Float,
    pub dezdx: Float,
    pub dezdy: Float,
    pub d2ezdxdy: Float,
    pub cbx: Float,
    pub dcbxdx: Float,
    pub cby: Float,
    pub dcbydy: Float,
    pub cbz: Float,
    pub dcbzdz: Float,
}

impl Interpolator {
    /// Coefficients of a spatially constant field.
    pub fn uniform(e: [Float; 3], cb: [Float; 3]) -> Interpolator {
        Interpolator {
            ex: e[0],
            ey: e[1],
            ez: e[2],
            cbx: cb[0],
            cby: cb[1],
            cbz: cb[2],
            ..Default::default()
        }
    }

    #[inline(always)]
    pub fn electric(&self, dx: Float, dy: Float, dz: Float) -> [Float; 3] {
        [
            (self.ex + dy * self.dexdy) + dz * (self.dexdz + dy * self.d2exdydz),
            (self.ey + dz * self.deydz) + dx * (self.deydx + dz * self.d2eydzdx),
            (self.ez + dx * self.dezdx) + dy * (self.dezdy + dx * self.d2ezdxdy),
        ]
    }

    /// c·B at the given offsets.
    #[inline(always)]
    pub fn magnetic(&self, dx: Float, dy: Float, dz: Float) -> [Float; 3] {
        [
            self.cbx + dx * self.dcbxdx,
            self.cby + dy * self.dcbydy,
            self.cbz + dz * self.dcbzdz,
        ]
    }
}

/// One uniform record per voxel, ghosts included.
pub fn uniform_table(grid: &Grid, e: [Float; 3], cb: [Float; 3]) -> Vec<Interpolator> {
    vec![Interpolator::uniform(e, cb); grid.n_voxel()]
}
