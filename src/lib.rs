pub mod collective;
pub mod config;
pub mod coordinator;
pub mod distribution;
pub mod error;
pub mod kernel;
pub mod local;
pub mod matrix;
#[cfg(feature = "mpi")]
pub mod mpi_backend;
pub mod reference;
pub mod report;
pub mod stream;
pub mod verify;
pub mod worker;

pub use collective::Collective;
pub use config::{Dimensions, RunConfig};
pub use coordinator::Coordinator;
pub use error::{MatvecError, Result};
pub use local::LocalCluster;
pub use matrix::LocalMatrix;
pub use worker::Worker;
