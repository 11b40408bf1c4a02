use rayon::prelude::*;
use rayon::ThreadPool;

use crate::distribution::{chunk_ranges, split_mut, RowPartition};
use crate::error::{MatvecError, Result};
use crate::kernel;
use crate::stream::{self, SkipAhead};

/// The block of rows of the global matrix owned by one rank.
///
/// Stored row-major as `rows × cols` values. `row_offset` is the global index
/// of local row 0.
#[derive(Debug, Clone)]
pub struct LocalMatrix {
    pub data: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
    pub row_offset: usize,
}

impl LocalMatrix {
    /// Create a zero-filled block
    pub fn new(partition: RowPartition, cols: usize) -> Self {
        LocalMatrix {
            data: vec![0.0; partition.rows * cols],
            rows: partition.rows,
            cols,
            row_offset: partition.offset,
        }
    }

    /// Create a block from existing row-major data
    pub fn from_vec(data: Vec<f64>, partition: RowPartition, cols: usize) -> Result<Self> {
        if data.len() != partition.rows * cols {
            return Err(MatvecError::Dimension {
                len: data.len(),
                rows: partition.rows,
                cols,
            });
        }
        Ok(LocalMatrix {
            data,
            rows: partition.rows,
            cols,
            row_offset: partition.offset,
        })
    }

    /// Generate the partition of the matrix stream for `seed`.
    pub fn generate(
        partition: RowPartition,
        cols: usize,
        seed: u64,
        pool: &ThreadPool,
        skip: SkipAhead,
    ) -> Self {
        let mut matrix = LocalMatrix::new(partition, cols);
        matrix.fill_from_stream(seed, pool, skip);
        matrix
    }

    /// Overwrite the block with its values from the matrix stream for `seed`.
    ///
    /// The flat `rows × cols` range is cut into one chunk per pool thread.
    /// Each chunk builds its own generator positioned at
    /// `row_offset * cols + chunk_start`, so the values do not depend on the
    /// thread count.
    pub fn fill_from_stream(&mut self, seed: u64, pool: &ThreadPool, skip: SkipAhead) {
        let base = self.row_offset * self.cols;
        let ranges = chunk_ranges(self.data.len(), pool.current_num_threads());
        let chunks = split_mut(&mut self.data, &ranges);

        pool.install(|| {
            chunks
                .into_par_iter()
                .zip(ranges)
                .for_each(|(chunk, range)| {
                    stream::fill_with(seed, base + range.start, chunk, skip);
                });
        });
    }

    /// Write `self * x` into `out`, one slot per local row.
    pub fn multiply_into(&self, x: &[f64], out: &mut [f64], pool: &ThreadPool) -> Result<()> {
        if x.len() != self.cols {
            return Err(MatvecError::Dimension {
                len: x.len(),
                rows: 1,
                cols: self.cols,
            });
        }
        if out.len() != self.rows {
            return Err(MatvecError::Dimension {
                len: out.len(),
                rows: self.rows,
                cols: 1,
            });
        }
        kernel::matvec_rows(pool, &self.data, self.cols, x, out);
        Ok(())
    }

    /// Size of the block in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f64>()
    }
}
