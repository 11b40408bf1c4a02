//! Collective operations between ranks.
//!
//! Each rank holds one endpoint implementing [`Collective`]. Every operation
//! is blocking and must be entered by all ranks in the same order:
//!
//! - `broadcast`: root's buffer is copied into every rank's buffer. Returns
//!   on each rank once its copy is complete.
//! - `gather_varcount`: every rank sends `counts[rank]` values; root returns
//!   them concatenated in rank order, the other ranks return `None`.
//! - `barrier`: returns once every rank has entered it.

use crate::config::Dimensions;
use crate::error::{MatvecError, Result};

/// The coordinating rank.
pub const ROOT: usize = 0;

// Message tags
pub const TAG_DIMENSIONS: u32 = 1;
pub const TAG_VECTOR_DATA: u32 = 2;
pub const TAG_RESULT_DATA: u32 = 3;
pub const TAG_BARRIER: u32 = 4;

pub trait Collective {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn barrier(&self) -> Result<()>;

    /// Replace `buf` on every rank with root's `buf`.
    fn broadcast(&self, buf: &mut [f64], root: usize) -> Result<()>;

    /// Send root's dimensions to every rank.
    fn broadcast_dimensions(&self, dims: Dimensions, root: usize) -> Result<Dimensions>;

    /// Gather variable-length contributions onto `root`, placed at the prefix
    /// sum of `counts`.
    fn gather_varcount(
        &self,
        local: &[f64],
        counts: &[usize],
        root: usize,
    ) -> Result<Option<Vec<f64>>>;

    fn is_root(&self) -> bool {
        self.rank() == ROOT
    }
}

/// Exclusive prefix sums of `counts`.
pub fn displacements(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0usize, |acc, &count| {
            let displ = *acc;
            *acc += count;
            Some(displ)
        })
        .collect()
}

/// Gather needs exactly one count per rank.
pub fn check_layout(counts: &[usize], size: usize) -> Result<()> {
    if counts.len() != size {
        return Err(MatvecError::Communication(format!(
            "{} receive counts for {} ranks",
            counts.len(),
            size
        )));
    }
    Ok(())
}

/// Check a rank's contribution against the agreed counts.
pub fn check_count(rank: usize, len: usize, counts: &[usize]) -> Result<()> {
    match counts.get(rank) {
        Some(&expected) if expected == len => Ok(()),
        Some(&expected) => Err(MatvecError::Communication(format!(
            "rank {} contributed {} values, expected {}",
            rank, len, expected
        ))),
        None => Err(MatvecError::Communication(format!(
            "no receive count for rank {} ({} counts)",
            rank,
            counts.len()
        ))),
    }
}
