//! Branch-pass dispatch: serial, or partitioned over a rayon pool
//!
//! The parallel path splits the branch slice into `workers` contiguous
//! chunks, `[i*N/W, (i+1)*N/W)` with floor rounding, and runs each chunk as
//! one task on a pool built once by [`UpdateStrategy::parallel`]. The call
//! returns only after every chunk has finished.

use std::ops::Range;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::core::error::Result;
use crate::engine::branch::{Branch, BranchModel, StepContext};

/// How a branch pass is executed
#[derive(Debug, Clone, Default)]
pub enum UpdateStrategy {
    /// Visit branches in storage order on the calling thread
    #[default]
    Serial,
    /// Fan chunks out over a dedicated pool and join before returning
    Parallel {
        workers: usize,
        pool: Arc<ThreadPool>,
    },
}

impl UpdateStrategy {
    /// Build a parallel strategy backed by a fresh pool of `workers` threads
    ///
    /// `workers == 0` yields [`UpdateStrategy::Serial`].
    pub fn parallel(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Ok(Self::Serial);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("branch-worker-{i}"))
            .build()?;
        Ok(Self::Parallel {
            workers,
            pool: Arc::new(pool),
        })
    }

    /// Number of chunks a pass is split into (1 when serial)
    pub fn workers(&self) -> usize {
        match self {
            Self::Serial => 1,
            Self::Parallel { workers, .. } => *workers,
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel { .. })
    }

    /// Run one local update per branch
    pub(crate) fn run<M>(&self, branches: &mut [Branch], model: &M, ctx: &StepContext<'_>)
    where
        M: BranchModel,
    {
        match self {
            Self::Serial => {
                for branch in branches.iter_mut() {
                    branch.time_step(model, ctx);
                }
            }
            Self::Parallel { workers, pool } => {
                let chunks = split_chunks(branches, *workers);
                pool.scope(|scope| {
                    for chunk in chunks {
                        scope.spawn(move |_| {
                            for branch in chunk.iter_mut() {
                                branch.time_step(model, ctx);
                            }
                        });
                    }
                });
            }
        }
    }
}

/// Contiguous index ranges covering `0..len`, one per worker
///
/// Ranges are empty when there are more workers than items.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    if workers == 0 {
        return vec![0..len];
    }
    (0..workers)
        .map(|i| (i * len / workers)..((i + 1) * len / workers))
        .collect()
}

/// Carve `items` into disjoint mutable chunks following [`partition`]
fn split_chunks<T>(items: &mut [T], workers: usize) -> Vec<&mut [T]> {
    let ranges = partition(items.len(), workers);
    let mut chunks = Vec::with_capacity(ranges.len());
    let mut rest = items;
    for range in ranges {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
        chunks.push(head);
        rest = tail;
    }
    chunks
}
