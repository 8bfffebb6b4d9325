//! Independent what-if runs distributed across workers.
//!
//! Every run assembles its own team and owns all of its simulation state, so
//! runs never share anything but the read-only catalog.

use rayon::prelude::*;
use tracing::info;

use crate::combat::{run_rotation, RunReport};
use crate::data::{assemble_team, DefinitionCatalog, TeamConfig};
use crate::error::Result;
use crate::parallel::pool::WorkerPool;

/// Split `total` items into up to `num_batches` ranges `[start, end)`.
/// Batches are as equal in size as possible; later batches may be smaller.
///
/// # Example
/// ```
/// # use rotasim::parallel::batch_ranges;
/// let ranges = batch_ranges(100, 4);
/// assert_eq!(ranges, vec![(0, 25), (25, 50), (50, 75), (75, 100)]);
/// ```
pub fn batch_ranges(total: usize, num_batches: usize) -> Vec<(usize, usize)> {
    if total == 0 || num_batches == 0 {
        return Vec::new();
    }
    let num_batches = num_batches.min(total);
    let base = total / num_batches;
    let remainder = total % num_batches;
    let mut ranges = Vec::with_capacity(num_batches);
    let mut start = 0;
    for i in 0..num_batches {
        let size = base + usize::from(i < remainder);
        let end = start + size;
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Number of progress checkpoints logged during a batch.
const PROGRESS_CHUNKS: usize = 4;

pub fn run_one(catalog: &DefinitionCatalog, team: &TeamConfig) -> Result<RunReport> {
    let prepared = assemble_team(catalog, team)?;
    Ok(run_rotation(&prepared))
}

/// Runs every team in parallel. Results keep the input order.
pub fn run_batch(
    catalog: &DefinitionCatalog,
    teams: &[TeamConfig],
    pool: &WorkerPool,
) -> Vec<Result<RunReport>> {
    pool.install(|| {
        let mut results = Vec::with_capacity(teams.len());
        for (start, end) in batch_ranges(teams.len(), PROGRESS_CHUNKS) {
            let chunk: Vec<Result<RunReport>> = teams[start..end]
                .par_iter()
                .map(|team| run_one(catalog, team))
                .collect();
            results.extend(chunk);
            info!(done = end, total = teams.len(), "batch progress");
        }
        results
    })
}
