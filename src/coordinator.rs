use std::time::Duration;

use log::{info, warn};

use crate::collective::{Collective, ROOT};
use crate::config::{RunConfig, TOLERANCE};
use crate::error::{MatvecError, Result};
use crate::report::{RunSummary, Timer};
use crate::stream;
use crate::verify::{verify_all_rows, verify_first_row};
use crate::worker::Worker;

/// Seed of the vector stream, kept apart from the matrix stream.
pub fn vector_seed(seed: u64) -> u64 {
    seed.wrapping_add(1)
}

/// The shared input vector, generated on the root only.
pub fn generate_vector(cols: usize, seed: u64) -> Vec<f64> {
    stream::generate(vector_seed(seed), 0, cols)
}

/// Drives the full protocol on every rank and does the root-only work:
/// choosing the dimensions, timing, verification.
pub struct Coordinator {
    config: RunConfig,
}

impl Coordinator {
    /// Create a new coordinator
    pub fn new(config: RunConfig) -> Self {
        Coordinator { config }
    }

    /// Run one product. Every rank must call this with its own endpoint.
    ///
    /// Returns the summary on the root and `None` on every other rank.
    pub fn run<C: Collective>(&self, comm: C) -> Result<Option<RunSummary>> {
        let is_root = comm.is_root();
        let dims = comm.broadcast_dimensions(self.config.dimensions(), ROOT)?;

        let mut worker = Worker::new(
            comm,
            dims,
            self.config.seed,
            self.config.thread_count(),
            self.config.skip,
        )?;

        if is_root {
            info!(
                "[Coordinator] {}x{} over {} ranks x {} threads",
                worker.dims().rows,
                worker.dims().cols,
                worker.size(),
                worker.threads()
            );
        }

        worker.initialize_local_matrix();
        worker.initialize_vector()?;
        worker.barrier()?;

        let timer = Timer::start();
        worker.multiply_local()?;
        worker.gather_results()?;
        worker.barrier()?;
        let elapsed = timer.elapsed();

        if !is_root {
            return Ok(None);
        }

        let memory_mb = worker.memory_usage_mb();
        let result = worker.take_global_result().ok_or_else(|| {
            MatvecError::Communication("root finished the gather without a result".into())
        })?;

        let verification = if self.config.verify_all {
            verify_all_rows(
                self.config.seed,
                worker.vector(),
                &result,
                TOLERANCE,
                worker.pool(),
                self.config.skip,
            )
        } else {
            verify_first_row(self.config.seed, worker.vector(), &result, TOLERANCE)
        };

        if verification.passed() {
            info!("[Coordinator] Verified, error = {:e}", verification.error);
        } else {
            warn!(
                "[Coordinator] Row {} off by {:e} (expected {}, got {})",
                verification.row, verification.error, verification.expected, verification.actual
            );
        }

        Ok(Some(RunSummary {
            dims,
            ranks: worker.size(),
            threads: worker.threads(),
            elapsed,
            memory_mb,
            baseline: self
                .config
                .baseline
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
            vector: worker.vector().to_vec(),
            result,
            verification,
        }))
    }
}
