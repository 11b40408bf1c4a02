use thiserror::Error;

/// Errors produced while setting up or running a distributed product.
#[derive(Debug, Error)]
pub enum MatvecError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Communication failure: {0}")]
    Communication(String),

    #[error("Failed to build thread pool: {0}")]
    ThreadPool(String),

    #[error("Data length {len} does not match dimensions {rows}x{cols}")]
    Dimension { len: usize, rows: usize, cols: usize },
}

pub type Result<T> = std::result::Result<T, MatvecError>;

impl From<rayon::ThreadPoolBuildError> for MatvecError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        MatvecError::ThreadPool(e.to_string())
    }
}
