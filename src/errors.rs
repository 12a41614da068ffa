//! Errors
//!
//! Custom error types used throughout the `huber_aggregator` crate.
use thiserror::Error;

/// Errors that can occur while aggregating Huber loss statistics.
#[derive(Debug, Error, PartialEq)]
pub enum AggregatorError {
    /// Constructor arguments are missing or inconsistent.
    #[error("Invalid aggregator configuration: {0}")]
    InvalidConfiguration(String),
    /// The coefficient vector is not stored densely.
    #[error("Coefficients must be a dense vector, but a {0} vector was provided.")]
    UnsupportedCoefficientRepresentation(String),
    /// Block feature count differs from the aggregator feature count.
    #[error("Dimension mismatch: expected {expected} features, but the block has {found}.")]
    DimensionMismatch { expected: usize, found: usize },
    /// Block matrix does not store one instance per row.
    #[error("Block matrix must be transposed, with one instance per stored row.")]
    InvalidBlockLayout,
    /// Negative instance weight.
    #[error("Instance {index} has weight {weight}, weights must be non-negative.")]
    InvalidWeight { index: usize, weight: f64 },
    /// Two aggregators with a different configuration were merged.
    #[error("Unable to merge aggregators: {0}")]
    IncompatibleAggregators(String),
    /// Normalized loss or gradient requested before any weighted instance was seen.
    #[error("The effective number of instances should be greater than 0.0, but was 0.0.")]
    EmptyAggregate,
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Unable to write to file.
    #[error("Unable to write to file: {0}")]
    UnableToWrite(String),
    /// Unable to read from file.
    #[error("Unable to read from file {0}")]
    UnableToRead(String),
    /// Unable to build the worker thread pool.
    #[error("Unable to build thread pool: {0}")]
    ThreadPool(String),
}
