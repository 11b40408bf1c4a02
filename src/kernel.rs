//! Row-parallel dense matrix-vector kernel.

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::distribution::{chunk_ranges, split_mut};

const LANES: usize = 4;

/// Dot product with `LANES` independent accumulators.
///
/// The fixed-width chunks keep the accumulators free of loop-carried
/// dependencies so the compiler can keep them in one vector register; the
/// horizontal sum is pairwise. Summation order differs from a naive loop, so
/// callers compare against a tolerance rather than bit-for-bit.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have the same length");

    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let a_tail = a_chunks.remainder();
    let b_tail = b_chunks.remainder();

    let mut acc = [0.0f64; LANES];
    for (ca, cb) in a_chunks.zip(b_chunks) {
        for lane in 0..LANES {
            acc[lane] += ca[lane] * cb[lane];
        }
    }

    let tail: f64 = a_tail.iter().zip(b_tail).map(|(x, y)| x * y).sum();
    (acc[0] + acc[1]) + (acc[2] + acc[3]) + tail
}

/// `out[i] = dot(row i of data, x)` for a row-major `out.len() × cols` block.
///
/// Rows are split into one static contiguous block per pool thread. Each
/// block writes only its own slice of `out`.
pub fn matvec_rows(pool: &ThreadPool, data: &[f64], cols: usize, x: &[f64], out: &mut [f64]) {
    debug_assert_eq!(data.len(), out.len() * cols);
    debug_assert_eq!(x.len(), cols);

    if cols == 0 {
        out.fill(0.0);
        return;
    }

    let ranges = chunk_ranges(out.len(), pool.current_num_threads());
    let blocks = split_mut(out, &ranges);

    pool.install(|| {
        blocks
            .into_par_iter()
            .zip(ranges)
            .for_each(|(block, range)| {
                for (slot, row) in block.iter_mut().zip(range) {
                    *slot = dot(&data[row * cols..(row + 1) * cols], x);
                }
            });
    });
}
