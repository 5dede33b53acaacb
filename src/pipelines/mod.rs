pub mod advance;
pub mod center;
pub mod energy;
pub mod mover;

use crate::accumulator::AccumulatorArray;
use crate::grid::Grid;
use crate::interp::Interpolator;
use crate::prtls::{Mover, Particle};
use crate::{Float, PRTL_CHUNK_SIZE};
use advance::{advance_p_pipeline, AdvanceSlot};
use anyhow::{Context, Result};
use itertools::izip;
use log::warn;
use rayon::prelude::*;
use std::ops::Range;

/// Read-only inputs shared by every pipeline of a kernel call.
pub struct PipelineArgs<'a> {
    pub q_m: Float,
    pub interpolators: &'a [Interpolator],
    pub grid: &'a Grid,
}

/// Unresolved movers left by one pipeline.
///
/// `count` movers start at `first` in the species mover array.
/// `n_ignored` more particles stopped on a face but found no free slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoverSegment {
    pub first: usize,
    pub count: usize,
    pub n_ignored: usize,
}

impl MoverSegment {
    pub fn unresolved(&self) -> usize {
        self.count + self.n_ignored
    }
}

/// What came back from an advance once every pipeline finished.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdvanceReport {
    /// Movers now packed at the front of the mover array, in rank order.
    pub nm: usize,
    pub n_ignored: usize,
    /// Per pipeline, as the pipelines returned them.
    pub segments: Vec<MoverSegment>,
}

impl AdvanceReport {
    pub fn unresolved(&self) -> usize {
        self.nm + self.n_ignored
    }
}

/// The part of `0..n` handled by pipeline `rank`.
///
/// Whole blocks of `block` items are dealt out as evenly as possible
/// and the last pipeline also takes the partial block at the end. The
/// ranges of all ranks are contiguous, disjoint and cover `0..n`.
pub fn distribute(n: usize, block: usize, rank: usize, n_pipeline: usize) -> Range<usize> {
    if !cfg!(feature = "unchecked") {
        assert!(block > 0);
        assert!(rank < n_pipeline);
    }
    let n_block = n / block;
    let base = n_block / n_pipeline;
    let extra = n_block % n_pipeline;
    let start = rank * base + rank.min(extra);
    let end = if rank + 1 == n_pipeline {
        n
    } else {
        (start + base + if rank < extra { 1 } else { 0 }) * block
    };
    start * block..end
}

/// Cuts `slice` into the given sorted, non-overlapping ranges.
pub(crate) fn split_mut<'a, T>(mut slice: &'a mut [T], ranges: &[Range<usize>]) -> Vec<&'a mut [T]> {
    let mut out = Vec::with_capacity(ranges.len());
    let mut consumed = 0;
    for r in ranges {
        let (_, rest) = std::mem::take(&mut slice).split_at_mut(r.start - consumed);
        let (head, tail) = rest.split_at_mut(r.end - r.start);
        out.push(head);
        slice = tail;
        consumed = r.end;
    }
    out
}

/// A fixed pool of worker threads that runs the particle kernels.
///
/// Every call splits the particles with `distribute` and gives each
/// pipeline its own range. Results are put back together in rank
/// order, so for a fixed number of pipelines the outcome does not
/// depend on thread scheduling.
pub struct Pipelines {
    n_pipeline: usize,
    pool: rayon::ThreadPool,
}

impl Pipelines {
    pub fn new(n_pipeline: usize) -> Result<Pipelines> {
        if n_pipeline == 0 {
            return Err(anyhow::Error::msg("Need at least one pipeline"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_pipeline)
            .thread_name(|i| format!("pipeline-{}", i))
            .build()
            .context("Could not start the pipeline thread pool")?;
        Ok(Pipelines { n_pipeline, pool })
    }

    pub fn n_pipeline(&self) -> usize {
        self.n_pipeline
    }

    fn particle_ranges(&self, n: usize) -> Vec<Range<usize>> {
        (0..self.n_pipeline)
            .map(|rank| distribute(n, PRTL_CHUNK_SIZE, rank, self.n_pipeline))
            .collect()
    }

    /// Advances `particles` one step. Pipeline `rank` deposits into
    /// accumulator replica `rank` and stores its movers in its own
    /// share of `movers`. Afterwards the movers of all pipelines are
    /// packed to the front of `movers` in rank order.
    ///
    /// Fails without touching anything when `accumulators` has fewer
    /// replicas than there are pipelines.
    pub fn advance_p(
        &self,
        args: &PipelineArgs,
        particles: &mut [Particle],
        movers: &mut [Mover],
        accumulators: &mut AccumulatorArray,
    ) -> Result<AdvanceReport> {
        if accumulators.n_pipeline() < self.n_pipeline {
            return Err(anyhow::Error::msg(format!(
                "{} accumulator replicas for {} pipelines",
                accumulators.n_pipeline(),
                self.n_pipeline
            )));
        }
        let p_ranges = self.particle_ranges(particles.len());
        let m_ranges: Vec<Range<usize>> = (0..self.n_pipeline)
            .map(|rank| distribute(movers.len(), 1, rank, self.n_pipeline))
            .collect();

        let slots: Vec<AdvanceSlot> = izip!(
            p_ranges.iter(),
            split_mut(particles, &p_ranges),
            m_ranges.iter(),
            split_mut(movers, &m_ranges),
            accumulators.replicas_mut()
        )
        .map(|(pr, particles, mr, movers, accumulators)| AdvanceSlot {
            offset: pr.start,
            particles,
            mover_offset: mr.start,
            movers,
            accumulators,
        })
        .collect();

        let segments: Vec<MoverSegment> = self.pool.install(|| {
            slots
                .into_par_iter()
                .map(|slot| advance_p_pipeline(args, slot))
                .collect()
        });

        let mut nm = 0;
        let mut n_ignored = 0;
        for (rank, seg) in segments.iter().enumerate() {
            if seg.n_ignored > 0 {
                warn!("Pipeline {} ran out of storage for {} movers", rank, seg.n_ignored);
            }
            movers.copy_within(seg.first..seg.first + seg.count, nm);
            nm += seg.count;
            n_ignored += seg.n_ignored;
        }
        Ok(AdvanceReport {
            nm,
            n_ignored,
            segments,
        })
    }

    pub fn center_p(&self, args: &PipelineArgs, particles: &mut [Particle]) {
        let ranges = self.particle_ranges(particles.len());
        let chunks = split_mut(particles, &ranges);
        self.pool.install(|| {
            chunks
                .into_par_iter()
                .for_each(|chunk| center::center_p_pipeline(args, chunk))
        });
    }

    pub fn uncenter_p(&self, args: &PipelineArgs, particles: &mut [Particle]) {
        let ranges = self.particle_ranges(particles.len());
        let chunks = split_mut(particles, &ranges);
        self.pool.install(|| {
            chunks
                .into_par_iter()
                .for_each(|chunk| center::uncenter_p_pipeline(args, chunk))
        });
    }

    /// Sum of `w (γ - 1)` over `particles`. The pipeline subtotals are
    /// added in rank order.
    pub fn energy_p(&self, args: &PipelineArgs, particles: &[Particle]) -> f64 {
        let subtotals: Vec<f64> = self.pool.install(|| {
            self.particle_ranges(particles.len())
                .into_par_iter()
                .map(|r| energy::energy_p_pipeline(args, &particles[r]))
                .collect()
        });
        subtotals.iter().sum()
    }
}
