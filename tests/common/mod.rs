#![allow(dead_code)]

use pic_pipelines::{Accumulator, Float, Grid, Particle};

#[cfg(not(feature = "dprec"))]
pub const E_TOL: Float = 1E-5;

#[cfg(feature = "dprec")]
pub const E_TOL: Float = 1E-11;

pub fn cube_grid(n: usize, d: Float, dt: Float, cvac: Float) -> Grid {
    // This is a small periodic box so that tests do not need
    // a config file.
    Grid::new([n, n, n], [d, d, d], dt, cvac)
}

/// Position in units of half cells, ghost layer included.
pub fn global_position(grid: &Grid, p: &Particle) -> [f64; 3] {
    let (ix, iy, iz) = grid.coords(p.i);
    [
        2.0 * ix as f64 + p.dx as f64,
        2.0 * iy as f64 + p.dy as f64,
        2.0 * iz as f64 + p.dz as f64,
    ]
}

fn wrap(i: usize, n: usize) -> usize {
    (i + n - 1) % n
}

/// Adds `sign` times the linearly weighted charge of every particle to
/// the node array of a periodic grid.
pub fn deposit_rho(grid: &Grid, particles: &[Particle], sign: f64, rho: &mut [f64]) {
    let (nx, ny, nz) = (grid.nx, grid.ny, grid.nz);
    for p in particles {
        let (ix, iy, iz) = grid.coords(p.i);
        let s = [p.dx as f64, p.dy as f64, p.dz as f64];
        for c in 0..2 {
            for b in 0..2 {
                for a in 0..2 {
                    let sa = if a == 0 { -1.0 } else { 1.0 };
                    let sb = if b == 0 { -1.0 } else { 1.0 };
                    let sc = if c == 0 { -1.0 } else { 1.0 };
                    let r = p.w as f64 / 8.0
                        * (1.0 + sa * s[0])
                        * (1.0 + sb * s[1])
                        * (1.0 + sc * s[2]);
                    let node = wrap(ix + a, nx) + nx * (wrap(iy + b, ny) + ny * wrap(iz + c, nz));
                    rho[node] += sign * r;
                }
            }
        }
    }
}

/// Net accumulator flow into every node of a periodic grid. For a
/// charge-conserving deposit this is four times the change of the
/// node charge.
pub fn node_inflow(grid: &Grid, acc: &[Accumulator]) -> Vec<f64> {
    let (nx, ny, nz) = (grid.nx, grid.ny, grid.nz);
    let mut div = vec![0.0; nx * ny * nz];
    let node = |x: usize, y: usize, z: usize| wrap(x, nx) + nx * (wrap(y, ny) + ny * wrap(z, nz));
    for v in grid.interior_voxels() {
        let (ix, iy, iz) = grid.coords(v);
        let a = &acc[v];
        for k in 0..4 {
            let (lo, hi) = (k % 2, k / 2);
            div[node(ix + 1, iy + lo, iz + hi)] += a.jx[k] as f64;
            div[node(ix, iy + lo, iz + hi)] -= a.jx[k] as f64;
            div[node(ix + hi, iy + 1, iz + lo)] += a.jy[k] as f64;
            div[node(ix + hi, iy, iz + lo)] -= a.jy[k] as f64;
            div[node(ix + lo, iy + hi, iz + 1)] += a.jz[k] as f64;
            div[node(ix + lo, iy + hi, iz)] -= a.jz[k] as f64;
        }
    }
    div
}
