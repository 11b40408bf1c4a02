#![allow(dead_code)]

use hybrid_matvec::distribution::RowPartition;
use hybrid_matvec::stream::SkipAhead;
use hybrid_matvec::{Dimensions, LocalCluster, Worker};

/// What one simulated rank holds at the end of a run
#[derive(Debug, Clone)]
pub struct RankState {
    pub rank: usize,
    pub partition: RowPartition,
    pub local_matrix: Vec<f64>,
    pub vector: Vec<f64>,
    pub local_result: Vec<f64>,
    pub global_result: Option<Vec<f64>>,
}

/// Run the whole pipeline on `ranks` in-process ranks with `threads` threads
/// each, and return every rank's final state in rank order.
pub fn simulate(
    rows: usize,
    cols: usize,
    ranks: usize,
    threads: usize,
    seed: u64,
    skip: SkipAhead,
) -> Vec<RankState> {
    let dims = Dimensions { rows, cols };
    LocalCluster::run(ranks, |comm| {
        let mut worker = Worker::new(comm, dims, seed, threads, skip).unwrap();
        worker.initialize_local_matrix();
        worker.initialize_vector().unwrap();
        worker.barrier().unwrap();
        worker.multiply_local().unwrap();
        worker.gather_results().unwrap();
        worker.barrier().unwrap();

        RankState {
            rank: worker.rank(),
            partition: worker.partition(),
            local_matrix: worker.local_matrix().data.clone(),
            vector: worker.vector().to_vec(),
            local_result: worker.local_result().to_vec(),
            global_result: worker.take_global_result(),
        }
    })
    .unwrap()
}

/// The gathered result of a simulated run
pub fn distributed_result(
    rows: usize,
    cols: usize,
    ranks: usize,
    threads: usize,
    seed: u64,
) -> Vec<f64> {
    simulate(rows, cols, ranks, threads, seed, SkipAhead::Discard)
        .into_iter()
        .next()
        .and_then(|root| root.global_result)
        .expect("root should hold the gathered result")
}

pub fn assert_close(actual: &[f64], expected: &[f64], tolerance: f64) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "element {} differs: {} vs {} (error {:e})",
            i,
            a,
            e,
            (a - e).abs()
        );
    }
}
