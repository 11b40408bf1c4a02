use clap::Parser;

use crate::error::{MatvecError, Result};
use crate::stream::SkipAhead;

pub const DEFAULT_SEED: u64 = 42;

/// Absolute tolerance of the result check.
pub const TOLERANCE: f64 = 1e-6;

/// Global matrix shape, chosen by the coordinator and broadcast to all ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub rows: usize,
    pub cols: usize,
}

/// Hybrid distributed + multithreaded matrix-vector multiplication.
#[derive(Debug, Clone, Parser)]
#[command(name = "hybrid-matvec", version, about)]
pub struct RunConfig {
    /// Number of matrix rows
    #[arg(default_value_t = 1000, env = "MATVEC_ROWS")]
    pub rows: usize,

    /// Number of matrix columns
    #[arg(default_value_t = 1000, env = "MATVEC_COLS")]
    pub cols: usize,

    /// Seed of the matrix stream; the vector uses seed + 1
    #[arg(long, default_value_t = DEFAULT_SEED, env = "MATVEC_SEED")]
    pub seed: u64,

    /// Threads per rank (defaults to the number of logical CPUs)
    #[arg(long, env = "MATVEC_THREADS")]
    pub threads: Option<usize>,

    /// Simulated ranks when running without MPI
    #[arg(long, default_value_t = 1, env = "MATVEC_RANKS")]
    pub ranks: usize,

    /// Check every row against an independently generated reference
    #[arg(long, env = "MATVEC_VERIFY_ALL")]
    pub verify_all: bool,

    /// How generators are advanced to their offset
    #[arg(long, value_enum, default_value_t = SkipAhead::Discard, env = "MATVEC_SKIP")]
    pub skip: SkipAhead,

    /// Single-worker time in seconds; enables speedup and efficiency output
    #[arg(long, env = "MATVEC_BASELINE")]
    pub baseline: Option<f64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            rows: 1000,
            cols: 1000,
            seed: DEFAULT_SEED,
            threads: None,
            ranks: 1,
            verify_all: false,
            skip: SkipAhead::Discard,
            baseline: None,
        }
    }
}

impl RunConfig {
    pub fn new(rows: usize, cols: usize) -> Self {
        RunConfig {
            rows,
            cols,
            ..RunConfig::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_ranks(mut self, ranks: usize) -> Self {
        self.ranks = ranks;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_baseline(mut self, secs: f64) -> Self {
        self.baseline = Some(secs);
        self
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Threads per rank after applying the default.
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(rayon::current_num_threads)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(MatvecError::Config(format!(
                "matrix dimensions must be positive, got {}x{}",
                self.rows, self.cols
            )));
        }
        if self.threads == Some(0) {
            return Err(MatvecError::Config("thread count must be positive".into()));
        }
        if self.ranks == 0 {
            return Err(MatvecError::Config("rank count must be positive".into()));
        }
        if let Some(secs) = self.baseline {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(MatvecError::Config(format!(
                    "baseline must be a positive number of seconds, got {}",
                    secs
                )));
            }
        }
        self.rows.checked_mul(self.cols).ok_or_else(|| {
            MatvecError::Config(format!("{}x{} overflows the index space", self.rows, self.cols))
        })?;
        Ok(())
    }
}
