use log::debug;
use rayon::ThreadPool;

use crate::collective::{Collective, ROOT};
use crate::config::Dimensions;
use crate::coordinator::generate_vector;
use crate::distribution::{counts_and_displacements, RowPartition};
use crate::error::Result;
use crate::matrix::LocalMatrix;
use crate::stream::SkipAhead;

/// One rank's share of the product.
///
/// Every rank, the coordinator included, runs the same steps in the same
/// order: generate its rows, receive the vector, multiply, contribute to the
/// gather. All buffers are sized in [`Worker::new`].
pub struct Worker<C: Collective> {
    comm: C,
    dims: Dimensions,
    partition: RowPartition,
    seed: u64,
    skip: SkipAhead,
    pool: ThreadPool,
    local_matrix: LocalMatrix,
    vector: Vec<f64>,
    local_result: Vec<f64>,
    global_result: Option<Vec<f64>>,
}

impl<C: Collective> Worker<C> {
    /// Create a worker with a dedicated pool of `threads` threads
    pub fn new(
        comm: C,
        dims: Dimensions,
        seed: u64,
        threads: usize,
        skip: SkipAhead,
    ) -> Result<Self> {
        let rank = comm.rank();
        let partition = RowPartition::new(rank, dims.rows, comm.size());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |t| format!("rank-{}-worker-{}", rank, t))
            .build()?;

        debug!(
            "[Rank {}] Owns rows [{}, {}) of {}x{}",
            rank,
            partition.offset,
            partition.offset + partition.rows,
            dims.rows,
            dims.cols
        );

        Ok(Worker {
            local_matrix: LocalMatrix::new(partition, dims.cols),
            vector: vec![0.0; dims.cols],
            local_result: vec![0.0; partition.rows],
            global_result: None,
            comm,
            dims,
            partition,
            seed,
            skip,
            pool,
        })
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    pub fn partition(&self) -> RowPartition {
        self.partition
    }

    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    pub fn local_matrix(&self) -> &LocalMatrix {
        &self.local_matrix
    }

    pub fn vector(&self) -> &[f64] {
        &self.vector
    }

    pub fn local_result(&self) -> &[f64] {
        &self.local_result
    }

    /// The assembled result; only present on the root after the gather.
    pub fn take_global_result(&mut self) -> Option<Vec<f64>> {
        self.global_result.take()
    }

    /// Fill this rank's rows from the matrix stream
    pub fn initialize_local_matrix(&mut self) {
        self.local_matrix
            .fill_from_stream(self.seed, &self.pool, self.skip);
        debug!(
            "[Rank {}] Generated {} values",
            self.rank(),
            self.local_matrix.data.len()
        );
    }

    /// Root generates the vector, then every rank receives a copy
    pub fn initialize_vector(&mut self) -> Result<()> {
        if self.comm.rank() == ROOT {
            self.vector = generate_vector(self.dims.cols, self.seed);
        }
        self.comm.broadcast(&mut self.vector, ROOT)?;
        debug!("[Rank {}] Received vector of {}", self.rank(), self.vector.len());
        Ok(())
    }

    /// Multiply the local rows by the vector
    pub fn multiply_local(&mut self) -> Result<()> {
        self.local_matrix
            .multiply_into(&self.vector, &mut self.local_result, &self.pool)
    }

    /// Collect every rank's partial result on the root, in row order
    pub fn gather_results(&mut self) -> Result<()> {
        let (counts, _) = counts_and_displacements(self.dims.rows, self.comm.size());
        self.global_result = self
            .comm
            .gather_varcount(&self.local_result, &counts, ROOT)?;
        if let Some(result) = &self.global_result {
            debug!("[Rank {}] Assembled {} results", self.rank(), result.len());
        }
        Ok(())
    }

    pub fn barrier(&self) -> Result<()> {
        self.comm.barrier()
    }

    /// Memory held by this rank's buffers, in MiB
    pub fn memory_usage_mb(&self) -> f64 {
        let values = self.vector.len()
            + self.local_result.len()
            + self.global_result.as_ref().map_or(0, Vec::len);
        let bytes = self.local_matrix.size_bytes() + values * std::mem::size_of::<f64>();
        bytes as f64 / (1024.0 * 1024.0)
    }
}
