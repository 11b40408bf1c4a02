//! Timing and console formatting for the coordinating rank.

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::Dimensions;
use crate::verify::Verification;

/// Vectors up to this length are printed in full runs.
pub const PRINT_LIMIT: usize = 20;

/// Elements shown when a vector is printed.
pub const PRINT_ELEMENTS: usize = 10;

/// Wall-clock stopwatch
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Timer {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Billions of floating-point operations per second for one product
/// (one multiply and one add per matrix element).
pub fn gflops(dims: Dimensions, elapsed_secs: f64) -> f64 {
    (2.0 * dims.rows as f64 * dims.cols as f64) / elapsed_secs / 1e9
}

pub fn speedup(baseline_secs: f64, elapsed_secs: f64) -> f64 {
    baseline_secs / elapsed_secs
}

/// Speedup per worker, in percent.
pub fn efficiency(speedup: f64, workers: usize) -> f64 {
    speedup / workers as f64 * 100.0
}

/// `name = [a, b, ...]` with at most `max_print` elements at 4 decimals.
pub fn format_vector(name: &str, values: &[f64], max_print: usize) -> String {
    let shown: Vec<String> = values
        .iter()
        .take(max_print)
        .map(|v| format!("{:.4}", v))
        .collect();
    let ellipsis = if values.len() > max_print { ", ..." } else { "" };
    format!("{} = [{}{}]", name, shown.join(", "), ellipsis)
}

/// Configuration banner printed before the run.
pub fn banner(dims: Dimensions, ranks: usize, threads: usize) -> String {
    format!(
        "=== Hybrid matrix-vector multiplication (ranks + threads) ===\n\
         Matrix size: {} x {}\n\
         Ranks: {}\n\
         Threads per rank: {}\n\
         Total parallelism: {} x {} = {} workers\n\
         Rows per rank: ~{}",
        dims.rows,
        dims.cols,
        ranks,
        threads,
        ranks,
        threads,
        ranks * threads,
        dims.rows / ranks.max(1)
    )
}

/// Everything the coordinating rank knows after a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub dims: Dimensions,
    pub ranks: usize,
    pub threads: usize,
    pub elapsed: Duration,
    /// Buffers held by the coordinating rank, in MiB
    pub memory_mb: f64,
    pub baseline: Option<Duration>,
    pub vector: Vec<f64>,
    pub result: Vec<f64>,
    pub verification: Verification,
}

impl RunSummary {
    pub fn workers(&self) -> usize {
        self.ranks * self.threads
    }

    pub fn gflops(&self) -> f64 {
        gflops(self.dims, self.elapsed.as_secs_f64())
    }

    /// Speedup and efficiency against a single-worker time.
    pub fn scaling(&self, baseline: Duration) -> (f64, f64) {
        let s = speedup(baseline.as_secs_f64(), self.elapsed.as_secs_f64());
        (s, efficiency(s, self.workers()))
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dims.cols <= PRINT_LIMIT {
            writeln!(f, "{}", format_vector("Vector", &self.vector, PRINT_ELEMENTS))?;
        }
        if self.dims.rows <= PRINT_LIMIT {
            writeln!(f, "{}", format_vector("Result", &self.result, PRINT_ELEMENTS))?;
        }
        writeln!(f, "{}", self.verification)?;
        writeln!(f)?;
        writeln!(f, "=== Performance ===")?;
        writeln!(f, "Elapsed: {:.6} seconds", self.elapsed.as_secs_f64())?;
        writeln!(f, "Memory on rank 0: {:.2} MB", self.memory_mb)?;
        if let Some(baseline) = self.baseline {
            let (speedup, efficiency) = self.scaling(baseline);
            writeln!(f, "Speedup: {:.2}x", speedup)?;
            writeln!(f, "Efficiency: {:.1}%", efficiency)?;
        }
        write!(f, "Performance: {:.3} GFLOPS", self.gflops())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gflops() {
        let dims = Dimensions {
            rows: 1000,
            cols: 1000,
        };
        assert!((gflops(dims, 0.5) - 0.004).abs() < 1e-15);
    }

    #[test]
    fn test_scaling() {
        assert_eq!(speedup(4.0, 2.0), 2.0);
        assert_eq!(efficiency(2.0, 4), 50.0);
    }

    #[test]
    fn test_format_vector_truncates() {
        let values: Vec<f64> = (0..12).map(|v| v as f64 / 3.0).collect();
        assert_eq!(
            format_vector("Result", &values, 10),
            "Result = [0.0000, 0.3333, 0.6667, 1.0000, 1.3333, 1.6667, 2.0000, 2.3333, 2.6667, 3.0000, ...]"
        );
    }

    #[test]
    fn test_format_vector_short() {
        assert_eq!(format_vector("Vector", &[0.5, 0.25], 10), "Vector = [0.5000, 0.2500]");
        assert_eq!(format_vector("Vector", &[], 10), "Vector = []");
    }

    #[test]
    fn test_banner() {
        let text = banner(Dimensions { rows: 100, cols: 50 }, 4, 2);
        assert!(text.contains("Matrix size: 100 x 50"));
        assert!(text.contains("4 x 2 = 8 workers"));
        assert!(text.contains("Rows per rank: ~25"));
    }

    fn summary(baseline: Option<Duration>) -> RunSummary {
        RunSummary {
            dims: Dimensions { rows: 2, cols: 2 },
            ranks: 2,
            threads: 2,
            elapsed: Duration::from_millis(500),
            memory_mb: 1.5,
            baseline,
            vector: vec![0.5, 0.5],
            result: vec![1.0, 2.0],
            verification: Verification::new(0, 1.0, 1.0, 1e-6),
        }
    }

    #[test]
    fn test_summary_display() {
        let text = summary(None).to_string();
        assert!(text.contains("Vector = [0.5000, 0.5000]"));
        assert!(text.contains("Result = [1.0000, 2.0000]"));
        assert!(text.contains("Verification passed"));
        assert!(text.contains("Elapsed: 0.500000 seconds"));
        assert!(text.contains("Memory on rank 0: 1.50 MB"));
        assert!(text.contains("Performance: 0.000 GFLOPS"));
        assert!(!text.contains("Speedup"));
    }

    #[test]
    fn test_summary_display_with_baseline() {
        let summary = summary(Some(Duration::from_secs(1)));
        assert_eq!(summary.scaling(Duration::from_secs(1)), (2.0, 50.0));

        let text = summary.to_string();
        assert!(text.contains("Speedup: 2.00x"));
        assert!(text.contains("Efficiency: 50.0%"));
    }
}
