//! Single-process baseline: one generator, whole matrix, plain loops.
//!
//! The distributed path must reproduce this result for any rank and thread
//! count.

use crate::coordinator::vector_seed;
use crate::stream;

#[derive(Debug, Clone)]
pub struct SequentialMatvec {
    pub rows: usize,
    pub cols: usize,
    pub matrix: Vec<f64>,
    pub vector: Vec<f64>,
    pub result: Vec<f64>,
}

impl SequentialMatvec {
    /// Generate the full matrix from `seed` and the vector from `seed + 1`.
    pub fn new(rows: usize, cols: usize, seed: u64) -> Self {
        SequentialMatvec {
            rows,
            cols,
            matrix: stream::generate(seed, 0, rows * cols),
            vector: stream::generate(vector_seed(seed), 0, cols),
            result: vec![0.0; rows],
        }
    }

    pub fn multiply(&mut self) {
        for i in 0..self.rows {
            let mut sum = 0.0;
            for j in 0..self.cols {
                sum += self.matrix[i * self.cols + j] * self.vector[j];
            }
            self.result[i] = sum;
        }
    }

    /// Generate and multiply in one call.
    pub fn compute(rows: usize, cols: usize, seed: u64) -> Vec<f64> {
        let mut reference = SequentialMatvec::new(rows, cols, seed);
        reference.multiply();
        reference.result
    }

    pub fn memory_usage_mb(&self) -> f64 {
        let values = self.matrix.len() + self.vector.len() + self.result.len();
        (values * std::mem::size_of::<f64>()) as f64 / (1024.0 * 1024.0)
    }
}
