//! Configuration
//!
//! Settings for Huber loss evaluation over partitioned instance blocks.
use crate::constants::{DEFAULT_EPSILON, DEFAULT_MAX_BLOCK_ROWS, MIN_CONFIG_EPSILON};
use crate::errors::AggregatorError;
use crate::utils::{validate_float_above, validate_float_parameter};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}
fn default_fit_intercept() -> bool {
    true
}
fn default_reg_param() -> f64 {
    0.0
}
fn default_standardization() -> bool {
    true
}
fn default_max_block_rows() -> usize {
    DEFAULT_MAX_BLOCK_ROWS
}
fn default_num_threads() -> Option<usize> {
    None
}

/// Configuration for `HuberLossFunction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuberConfig {
    /// Huber sensitivity, the quadratic region spans `sigma * epsilon`.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Whether to fit an intercept.
    #[serde(default = "default_fit_intercept")]
    pub fit_intercept: bool,
    /// L2 regularization strength.
    #[serde(default = "default_reg_param")]
    pub reg_param: f64,
    /// Whether the penalty applies to the rescaled weights.
    #[serde(default = "default_standardization")]
    pub standardization: bool,
    /// Maximum number of instances per block.
    #[serde(default = "default_max_block_rows")]
    pub max_block_rows: usize,
    /// Number of threads for parallel reduction.
    #[serde(default = "default_num_threads")]
    pub num_threads: Option<usize>,
}

impl Default for HuberConfig {
    fn default() -> Self {
        HuberConfig {
            epsilon: DEFAULT_EPSILON,
            fit_intercept: true,
            reg_param: 0.0,
            standardization: true,
            max_block_rows: DEFAULT_MAX_BLOCK_ROWS,
            num_threads: None,
        }
    }
}

impl HuberConfig {
    /// Set the Huber sensitivity.
    /// * `epsilon` - Must be greater than one.
    pub fn set_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set whether to fit an intercept.
    pub fn set_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Set the L2 regularization strength.
    pub fn set_reg_param(mut self, reg_param: f64) -> Self {
        self.reg_param = reg_param;
        self
    }

    /// Set whether the penalty applies to rescaled weights.
    pub fn set_standardization(mut self, standardization: bool) -> Self {
        self.standardization = standardization;
        self
    }

    /// Set the maximum number of instances per block.
    pub fn set_max_block_rows(mut self, max_block_rows: usize) -> Self {
        self.max_block_rows = max_block_rows;
        self
    }

    /// Set the number of threads.
    /// * `num_threads` - `None` uses the default number of threads.
    pub fn set_num_threads(mut self, num_threads: Option<usize>) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Check every parameter is within its valid range.
    pub fn validate(&self) -> Result<(), AggregatorError> {
        validate_float_above(self.epsilon, MIN_CONFIG_EPSILON, "epsilon")?;
        validate_float_parameter(self.reg_param, 0.0, f64::INFINITY, "reg_param")?;
        if self.max_block_rows == 0 {
            return Err(AggregatorError::InvalidParameter(
                "max_block_rows".to_string(),
                "a positive number of rows".to_string(),
                self.max_block_rows.to_string(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(AggregatorError::InvalidParameter(
                "num_threads".to_string(),
                "a positive number of threads or None".to_string(),
                "0".to_string(),
            ));
        }
        Ok(())
    }
}

/// IO
pub trait ConfigIO: Serialize + DeserializeOwned + Sized {
    /// Save as a json object to a file.
    ///
    /// * `path` - Path to save to.
    fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<(), AggregatorError> {
        fs::write(path, self.json_dump()?).map_err(|e| AggregatorError::UnableToWrite(e.to_string()))
    }

    /// Dump as a json object
    fn json_dump(&self) -> Result<String, AggregatorError> {
        serde_json::to_string(self).map_err(|e| AggregatorError::UnableToWrite(e.to_string()))
    }

    /// Load from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, AggregatorError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| AggregatorError::UnableToRead(e.to_string()))
    }

    /// Load from a path to a json object.
    ///
    /// * `path` - Path to load from.
    fn load_config<P: AsRef<Path>>(path: P) -> Result<Self, AggregatorError> {
        let json_str = fs::read_to_string(path).map_err(|e| AggregatorError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl ConfigIO for HuberConfig {}
