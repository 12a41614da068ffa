//! Coefficients
//!
//! Coefficient vectors and their layout: linear weights, optional intercept, then sigma.
use crate::constants::DEFAULT_SIGMA;
use crate::errors::AggregatorError;
use crate::linalg::dot;
use crate::scaling::FeatureScaling;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A coefficient vector, stored densely or sparsely.
#[derive(Debug, Clone, PartialEq)]
pub enum Coefficients {
    Dense(Arc<[f64]>),
    Sparse {
        size: usize,
        indices: Vec<usize>,
        values: Vec<f64>,
    },
}

impl Coefficients {
    /// Create a dense coefficient vector.
    pub fn dense(values: Vec<f64>) -> Self {
        Coefficients::Dense(Arc::from(values))
    }

    /// Starting point of an optimization: zero weights and intercept, unit sigma.
    pub fn initial(num_features: usize, fit_intercept: bool) -> Self {
        let mut values = vec![0.0; CoefficientLayout::new(num_features, fit_intercept).dim()];
        if let Some(sigma) = values.last_mut() {
            *sigma = DEFAULT_SIGMA;
        }
        Coefficients::dense(values)
    }

    pub fn len(&self) -> usize {
        match self {
            Coefficients::Dense(v) => v.len(),
            Coefficients::Sparse { size, .. } => *size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the storage kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Coefficients::Dense(_) => "dense",
            Coefficients::Sparse { .. } => "sparse",
        }
    }

    /// Shared dense values, only available for dense storage.
    pub fn as_dense(&self) -> Result<&Arc<[f64]>, AggregatorError> {
        match self {
            Coefficients::Dense(v) => Ok(v),
            Coefficients::Sparse { .. } => Err(AggregatorError::UnsupportedCoefficientRepresentation(
                self.kind().to_string(),
            )),
        }
    }

    /// Convert to dense storage.
    pub fn to_dense(&self) -> Coefficients {
        match self {
            Coefficients::Dense(v) => Coefficients::Dense(Arc::clone(v)),
            Coefficients::Sparse { size, indices, values } => {
                let mut dense = vec![0.0; *size];
                for (i, v) in indices.iter().zip(values.iter()) {
                    dense[*i] = *v;
                }
                Coefficients::dense(dense)
            }
        }
    }
}

/// Positions of the linear weights, intercept and sigma in a coefficient vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoefficientLayout {
    pub num_features: usize,
    pub fit_intercept: bool,
}

impl CoefficientLayout {
    pub fn new(num_features: usize, fit_intercept: bool) -> Self {
        CoefficientLayout {
            num_features,
            fit_intercept,
        }
    }

    /// Length of the coefficient vector.
    pub fn dim(&self) -> usize {
        if self.fit_intercept {
            self.num_features + 2
        } else {
            self.num_features + 1
        }
    }

    pub fn intercept_index(&self) -> Option<usize> {
        self.fit_intercept.then_some(self.num_features)
    }

    pub fn sigma_index(&self) -> usize {
        self.dim() - 1
    }

    /// Map a solution in rescaled feature space back to the original feature space.
    ///
    /// The intercept absorbs the virtual centering offset `intercept - dot(w, scaled_mean)`.
    pub fn to_original_scale(
        &self,
        solution: &[f64],
        scaling: &FeatureScaling,
    ) -> Result<HuberParameters, AggregatorError> {
        if solution.len() != self.dim() {
            return Err(AggregatorError::DimensionMismatch {
                expected: self.dim(),
                found: solution.len(),
            });
        }
        if scaling.num_features() != self.num_features {
            return Err(AggregatorError::InvalidConfiguration(format!(
                "scaling has {} features, expected {}",
                scaling.num_features(),
                self.num_features
            )));
        }
        let linear = &solution[..self.num_features];
        let coefficients = linear
            .iter()
            .zip(scaling.inverse_std().iter())
            .map(|(w, i)| w * i)
            .collect();
        let intercept = match (self.intercept_index(), scaling.scaled_mean()) {
            (Some(idx), Some(mean)) => solution[idx] - dot(linear, mean),
            (Some(_), None) => {
                return Err(AggregatorError::InvalidConfiguration(
                    "scaled mean is required when fitting an intercept".to_string(),
                ))
            }
            (None, _) => 0.0,
        };
        Ok(HuberParameters {
            coefficients,
            intercept,
            scale: solution[self.sigma_index()],
        })
    }
}

/// Huber regression parameters in the original feature space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuberParameters {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub scale: f64,
}

impl HuberParameters {
    /// Linear prediction for raw, unscaled features.
    pub fn predict(&self, features: &[f64]) -> f64 {
        dot(&self.coefficients, features) + self.intercept
    }
}
