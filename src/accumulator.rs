use crate::grid::Grid;
use crate::Float;
use rayon::prelude::*;
use std::ops::AddAssign;

const ONE_THIRD: Float = 1.0 / 3.0;

/// Current moments deposited in one voxel during a step.
///
/// Each component lives on the four cell edges parallel to it:
/// ```text
/// jx: (y-,z-) (y+,z-) (y-,z+) (y+,z+)
/// jy: (z-,x-) (z+,x-) (z-,x+) (z+,x+)
/// jz: (x-,y-) (x+,y-) (x-,y+) (x+,y+)
/// ```
/// The stored values are four times the charge that crossed the
/// corresponding quadrant of the cell. Converting them to a current
/// density is left to the field solver.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct Accumulator {
    pub jx: [Float; 4],
    pub jy: [Float; 4],
    pub jz: [Float; 4],
}

impl AddAssign for Accumulator {
    fn add_assign(&mut self, other: Accumulator) {
        for (a, b) in self
            .jx
            .iter_mut()
            .chain(self.jy.iter_mut())
            .chain(self.jz.iter_mut())
            .zip(other.jx.iter().chain(other.jy.iter()).chain(other.jz.iter()))
        {
            *a += b;
        }
    }
}

#[inline(always)]
fn accumulate_axis(j: &mut [Float; 4], qu: Float, m1: Float, m2: Float, v5: Float) {
    let mut v1 = qu * m1; //         q u m1
    let mut v0 = qu - v1; //         q u (1-m1)
    v1 += qu; //                     q u (1+m1)
    let mut v4 = 1.0 + m2;
    let mut v2 = v0 * v4; //         q u (1-m1)(1+m2)
    let mut v3 = v1 * v4; //         q u (1+m1)(1+m2)
    v4 = 1.0 - m2;
    v0 *= v4; //                     q u (1-m1)(1-m2)
    v1 *= v4; //                     q u (1+m1)(1-m2)
    v0 += v5;
    v1 -= v5;
    v2 -= v5;
    v3 += v5;
    j[0] += v0;
    j[1] += v1;
    j[2] += v2;
    j[3] += v3;
}

/// Charge-conserving deposit of one straight streak.
///
/// `disp` is half the streak length and `mid` its midpoint, both in
/// cell-relative coordinates. The `ux uy uz / 3` term makes the
/// deposit satisfy the discrete continuity equation exactly for
/// linear-weighted charge.
#[inline(always)]
pub fn accumulate_j(a: &mut Accumulator, q: Float, disp: [Float; 3], mid: [Float; 3]) {
    let v5 = q * disp[0] * disp[1] * disp[2] * ONE_THIRD;
    accumulate_axis(&mut a.jx, q * disp[0], mid[1], mid[2], v5);
    accumulate_axis(&mut a.jy, q * disp[1], mid[2], mid[0], v5);
    accumulate_axis(&mut a.jz, q * disp[2], mid[0], mid[1], v5);
}

/// Accumulators for every voxel, one private replica per pipeline.
///
/// Pipelines never share a replica, so deposition needs no atomics.
/// After the particle pass `reduce` folds every replica into the first
/// one, which is what the field solver reads.
#[derive(Clone)]
pub struct AccumulatorArray {
    a: Vec<Accumulator>,
    n_pipeline: usize,
    stride: usize,
}

impl AccumulatorArray {
    pub fn new(n_pipeline: usize, grid: &Grid) -> AccumulatorArray {
        let n_pipeline = n_pipeline.max(1);
        let stride = grid.n_voxel();
        AccumulatorArray {
            a: vec![Accumulator::default(); n_pipeline * stride],
            n_pipeline,
            stride,
        }
    }

    pub fn n_pipeline(&self) -> usize {
        self.n_pipeline
    }

    /// Number of voxels in a replica.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn clear(&mut self) {
        self.a
            .par_iter_mut()
            .for_each(|acc| *acc = Accumulator::default());
    }

    pub fn replica(&self, rank: usize) -> &[Accumulator] {
        &self.a[rank * self.stride..(rank + 1) * self.stride]
    }

    pub fn replicas_mut(&mut self) -> std::slice::ChunksMut<'_, Accumulator> {
        self.a.chunks_mut(self.stride)
    }

    /// Sums every replica into replica 0 and zeroes the others. Each
    /// voxel is summed in rank order so the result does not depend on
    /// scheduling.
    pub fn reduce(&mut self) {
        let stride = self.stride;
        let (total, rest) = self.a.split_at_mut(stride);
        total.par_iter_mut().enumerate().for_each(|(v, acc)| {
            for other in rest.iter().skip(v).step_by(stride) {
                *acc += *other;
            }
        });
        rest.par_iter_mut()
            .for_each(|acc| *acc = Accumulator::default());
    }

    /// The reduced accumulators. Only meaningful after `reduce`.
    pub fn total(&self) -> &[Accumulator] {
        self.replica(0)
    }

    pub fn total_mut(&mut self) -> &mut [Accumulator] {
        let stride = self.stride;
        &mut self.a[..stride]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_test_grid, E_TOL};

    fn sum(j: &[Float; 4]) -> Float {
        j.iter().sum()
    }

    #[test]
    fn straight_x_streak() {
        let mut a = Accumulator::default();
        accumulate_j(&mut a, 2.0, [0.25, 0.0, 0.0], [0.0, 0.5, -0.5]);
        // q ux (1 -+ dy)(1 -+ dz)
        let expected: [Float; 4] = [
            2.0 * 0.25 * 0.5 * 1.5,
            2.0 * 0.25 * 1.5 * 1.5,
            2.0 * 0.25 * 0.5 * 0.5,
            2.0 * 0.25 * 1.5 * 0.5,
        ];
        for (v, e) in a.jx.iter().zip(expected.iter()) {
            assert!((v - e).abs() < E_TOL);
        }
        assert_eq!(a.jy, [0.0; 4]);
        assert_eq!(a.jz, [0.0; 4]);
    }

    #[test]
    fn deposit_sums_to_charge_times_displacement() {
        let mut a = Accumulator::default();
        let q = -1.5;
        let disp = [0.1, -0.3, 0.2];
        accumulate_j(&mut a, q, disp, [0.4, -0.2, 0.7]);
        assert!((sum(&a.jx) - 4.0 * q * disp[0]).abs() < E_TOL);
        assert!((sum(&a.jy) - 4.0 * q * disp[1]).abs() < E_TOL);
        assert!((sum(&a.jz) - 4.0 * q * disp[2]).abs() < E_TOL);
    }

    #[test]
    fn replicas_reduce_in_order() {
        let grid = build_test_grid();
        let mut acc = AccumulatorArray::new(3, &grid);
        assert_eq!(acc.stride(), grid.n_voxel());
        for (rank, replica) in acc.replicas_mut().enumerate() {
            replica[7].jx[1] = (rank + 1) as Float;
            replica[0].jz[3] = 1.0;
        }
        acc.reduce();
        assert_eq!(acc.total()[7].jx[1], 6.0);
        assert_eq!(acc.total()[0].jz[3], 3.0);
        for rank in 1..3 {
            assert!(acc.replica(rank).iter().all(|a| *a == Accumulator::default()));
        }
        acc.clear();
        assert!(acc.total().iter().all(|a| *a == Accumulator::default()));
    }
}
