use mpi::datatype::PartitionMut;
use mpi::traits::*;
use mpi::Count;

use crate::collective::{check_count, check_layout, displacements, Collective};
use crate::config::Dimensions;
use crate::error::{MatvecError, Result};

/// [`Collective`] over an MPI communicator.
///
/// MPI's default error handler aborts the job on a failed collective, so
/// every operation here either completes or never returns.
pub struct MpiCollective<C: Communicator> {
    world: C,
    rank: usize,
    size: usize,
}

impl<C: Communicator> MpiCollective<C> {
    pub fn new(world: C) -> Self {
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiCollective { world, rank, size }
    }

    fn to_counts(values: &[usize]) -> Result<Vec<Count>> {
        values
            .iter()
            .map(|&v| {
                Count::try_from(v).map_err(|_| {
                    MatvecError::Communication(format!("{} exceeds the MPI count range", v))
                })
            })
            .collect()
    }
}

impl<C: Communicator> Collective for MpiCollective<C> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<()> {
        self.world.barrier();
        Ok(())
    }

    fn broadcast(&self, buf: &mut [f64], root: usize) -> Result<()> {
        let root_process = self.world.process_at_rank(root as i32);
        root_process.broadcast_into(buf);
        Ok(())
    }

    fn broadcast_dimensions(&self, dims: Dimensions, root: usize) -> Result<Dimensions> {
        let root_process = self.world.process_at_rank(root as i32);
        let mut msg = if self.rank == root {
            [dims.rows as u64, dims.cols as u64]
        } else {
            [0u64; 2]
        };

        root_process.broadcast_into(&mut msg[..]);

        Ok(Dimensions {
            rows: msg[0] as usize,
            cols: msg[1] as usize,
        })
    }

    fn gather_varcount(
        &self,
        local: &[f64],
        counts: &[usize],
        root: usize,
    ) -> Result<Option<Vec<f64>>> {
        check_layout(counts, self.size)?;
        check_count(self.rank, local.len(), counts)?;
        let root_process = self.world.process_at_rank(root as i32);

        if self.rank != root {
            root_process.gather_varcount_into(local);
            return Ok(None);
        }

        let recv_counts = Self::to_counts(counts)?;
        let displs = Self::to_counts(&displacements(counts))?;
        let mut gathered = vec![0.0f64; counts.iter().sum()];
        {
            let mut partition = PartitionMut::new(&mut gathered[..], recv_counts, &displs[..]);
            root_process.gather_varcount_into_root(local, &mut partition);
        }
        Ok(Some(gathered))
    }
}
