//! Independent checks of a gathered result.
//!
//! Expected values are rebuilt straight from the matrix stream with a naive
//! sequential dot product, bypassing the partitioned generator and the
//! vectorised kernel.

use std::fmt;

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::distribution::chunk_ranges;
use crate::stream::{self, SkipAhead};

/// Outcome of comparing one result element against its recomputed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verification {
    pub row: usize,
    pub expected: f64,
    pub actual: f64,
    pub error: f64,
    pub tolerance: f64,
}

impl Verification {
    pub fn new(row: usize, expected: f64, actual: f64, tolerance: f64) -> Self {
        Verification {
            row,
            expected,
            actual,
            error: (actual - expected).abs(),
            tolerance,
        }
    }

    /// Nothing to compare (empty result).
    pub fn vacuous(tolerance: f64) -> Self {
        Verification::new(0, 0.0, 0.0, tolerance)
    }

    pub fn passed(&self) -> bool {
        self.error <= self.tolerance
    }

    fn worse(self, other: Verification) -> Verification {
        // NaN errors must win so they are reported as failures.
        if other.error > self.error || other.error.is_nan() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            write!(f, "✓ Verification passed (error = {:.2e})", self.error)
        } else {
            write!(
                f,
                "ERROR: result[{}] = {}, expected = {}, error = {:e}",
                self.row, self.actual, self.expected, self.error
            )
        }
    }
}

fn naive_dot(row: &[f64], x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for (a, b) in row.iter().zip(x) {
        sum += a * b;
    }
    sum
}

/// Rebuild global row 0 from a fresh generator and compare it with
/// `result[0]`.
pub fn verify_first_row(seed: u64, x: &[f64], result: &[f64], tolerance: f64) -> Verification {
    let Some(&actual) = result.first() else {
        return Verification::vacuous(tolerance);
    };
    let row = stream::generate(seed, 0, x.len());
    Verification::new(0, naive_dot(&row, x), actual, tolerance)
}

/// Rebuild every row and return the comparison with the largest error.
///
/// Rows are split into one contiguous block per pool thread; each block
/// positions a single generator at its first row and walks forward.
pub fn verify_all_rows(
    seed: u64,
    x: &[f64],
    result: &[f64],
    tolerance: f64,
    pool: &ThreadPool,
    skip: SkipAhead,
) -> Verification {
    let cols = x.len();
    let ranges = chunk_ranges(result.len(), pool.current_num_threads());

    let worst = pool.install(|| {
        ranges
            .into_par_iter()
            .filter(|range| !range.is_empty())
            .map(|range| {
                let mut rng = stream::stream_at(seed, range.start * cols, skip);
                let mut row = vec![0.0; cols];
                let mut worst: Option<Verification> = None;
                for i in range {
                    for value in row.iter_mut() {
                        *value = stream::sample(&mut rng);
                    }
                    let check = Verification::new(i, naive_dot(&row, x), result[i], tolerance);
                    worst = Some(match worst {
                        Some(w) => w.worse(check),
                        None => check,
                    });
                }
                worst
            })
            .reduce(
                || None,
                |a, b| match (a, b) {
                    (Some(a), Some(b)) => Some(a.worse(b)),
                    (a, None) => a,
                    (None, b) => b,
                },
            )
    });

    worst.unwrap_or_else(|| Verification::vacuous(tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(threads: usize) -> ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
    }

    fn sequential_result(seed: u64, rows: usize, x: &[f64]) -> Vec<f64> {
        let matrix = stream::generate(seed, 0, rows * x.len());
        matrix.chunks(x.len()).map(|row| naive_dot(row, x)).collect()
    }

    #[test]
    fn test_first_row_passes_on_correct_result() {
        let x = stream::generate(43, 0, 5);
        let result = sequential_result(42, 3, &x);
        let check = verify_first_row(42, &x, &result, 1e-6);
        assert!(check.passed());
        assert_eq!(check.error, 0.0);
    }

    #[test]
    fn test_first_row_reports_mismatch() {
        let x = stream::generate(43, 0, 5);
        let mut result = sequential_result(42, 3, &x);
        result[0] += 1e-3;
        let check = verify_first_row(42, &x, &result, 1e-6);
        assert!(!check.passed());
        assert!((check.error - 1e-3).abs() < 1e-12);
        assert!(check.to_string().starts_with("ERROR: result[0]"));
    }

    #[test]
    fn test_all_rows_finds_late_corruption() {
        let x = stream::generate(43, 0, 6);
        let mut result = sequential_result(42, 20, &x);
        assert!(verify_all_rows(42, &x, &result, 1e-6, &pool(3), SkipAhead::Discard).passed());

        // Row 0 stays correct, so only the full check can see this.
        result[17] -= 0.5;
        assert!(verify_first_row(42, &x, &result, 1e-6).passed());
        for threads in [1, 4] {
            let check = verify_all_rows(42, &x, &result, 1e-6, &pool(threads), SkipAhead::Jump);
            assert!(!check.passed());
            assert_eq!(check.row, 17);
        }
    }

    #[test]
    fn test_empty_result_is_vacuous() {
        assert!(verify_first_row(42, &[0.5], &[], 1e-6).passed());
        assert!(verify_all_rows(42, &[0.5], &[], 1e-6, &pool(2), SkipAhead::Discard).passed());
    }

    #[test]
    fn test_nan_fails() {
        let check = Verification::new(0, 1.0, f64::NAN, 1e-6);
        assert!(!check.passed());
    }
}
