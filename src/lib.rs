//! Mergeable aggregation of the Huber robust regression loss and gradient
//! over blocks of training instances.
//!
//! A [`HuberBlockAggregator`] folds instance blocks into running sums with
//! `add` and combines with other aggregators through `merge`, so partitions
//! can be reduced in parallel in any order. [`HuberLossFunction`] wires the
//! aggregator to partitioned data for an outer gradient-based optimizer.

// Modules
pub mod aggregator;
pub mod coefficients;
pub mod config;
pub mod constants;
pub mod data;
pub mod errors;
pub mod linalg;
pub mod loss_function;
pub mod regularization;
pub mod scaling;
pub mod utils;

// Individual classes, and functions
pub use aggregator::{AggregateState, HuberBlockAggregator};
pub use coefficients::{CoefficientLayout, Coefficients, HuberParameters};
pub use config::{ConfigIO, HuberConfig};
pub use data::{BlockMatrix, DenseMatrix, Instance, InstanceBlock, SparseMatrix};
pub use errors::AggregatorError;
pub use loss_function::HuberLossFunction;
pub use scaling::{FeatureScaling, FeatureSummary};
