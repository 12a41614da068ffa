//! Huber Block Aggregator
//!
//! Accumulates the loss and gradient of the Huber objective with a jointly
//! estimated scale `sigma`, over blocks of instances. For a residual
//! `r = label - margin` and weight `w`:
//!
//! * `|r| <= sigma * epsilon`: `0.5 * w * (sigma + r^2 / sigma)`
//! * otherwise: `0.5 * w * (sigma + 2 * epsilon * |r| - sigma * epsilon^2)`
//!
//! Features are stored rescaled by their inverse standard deviation but not
//! centered. When fitting an intercept, centering is applied virtually: the
//! margin is offset by `intercept - dot(w, scaled_mean)` and the weight
//! gradient is corrected by `multiplier_sum * scaled_mean`.
//!
//! Aggregators over disjoint partitions combine with [`HuberBlockAggregator::merge`],
//! which is associative and commutative.
use crate::coefficients::{CoefficientLayout, Coefficients};
use crate::data::InstanceBlock;
use crate::errors::AggregatorError;
use crate::linalg::{axpy, dot, gemv, gemv_transposed};
use crate::scaling::FeatureScaling;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Raw, unnormalized sums of an aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateState {
    /// Weighted sum of per instance losses.
    pub loss_sum: f64,
    /// Sum of instance weights.
    pub weight_sum: f64,
    /// Sum of partial derivatives for every coefficient, including intercept and sigma.
    pub gradient_sum: Vec<f64>,
}

impl AggregateState {
    pub fn zeros(dim: usize) -> Self {
        AggregateState {
            loss_sum: 0.0,
            weight_sum: 0.0,
            gradient_sum: vec![0.0; dim],
        }
    }

    fn absorb(&mut self, other: &AggregateState) {
        self.loss_sum += other.loss_sum;
        self.weight_sum += other.weight_sum;
        axpy(1.0, &other.gradient_sum, &mut self.gradient_sum);
    }
}

/// Streaming, mergeable aggregator of Huber loss and gradient over instance blocks.
///
/// Coefficients and scaling statistics are shared read-only. An aggregator is
/// not synchronized: `add` and `merge` take `&mut self`.
#[derive(Debug, Clone)]
pub struct HuberBlockAggregator {
    layout: CoefficientLayout,
    epsilon: f64,
    coefficients: Arc<[f64]>,
    inverse_std: Arc<[f64]>,
    scaled_mean: Option<Arc<[f64]>>,
    linear: Vec<f64>,
    margin_offset: f64,
    state: AggregateState,
}

impl HuberBlockAggregator {
    /// Create a new aggregator.
    ///
    /// * `inverse_std` - Inverse standard deviation of every feature.
    /// * `scaled_mean` - Mean times inverse standard deviation, required when fitting an intercept.
    /// * `fit_intercept` - Whether the coefficients hold an intercept.
    /// * `epsilon` - Huber sensitivity, the quadratic region spans `sigma * epsilon`.
    /// * `coefficients` - Dense coefficient vector: weights, optional intercept, sigma.
    pub fn new(
        inverse_std: Arc<[f64]>,
        scaled_mean: Option<Arc<[f64]>>,
        fit_intercept: bool,
        epsilon: f64,
        coefficients: &Coefficients,
    ) -> Result<Self, AggregatorError> {
        let num_features = inverse_std.len();
        if fit_intercept {
            match &scaled_mean {
                None => {
                    return Err(AggregatorError::InvalidConfiguration(
                        "scaled mean is required when fitting an intercept".to_string(),
                    ))
                }
                Some(mean) if mean.len() != num_features => {
                    return Err(AggregatorError::InvalidConfiguration(format!(
                        "scaled mean has length {}, but inverse std has length {}",
                        mean.len(),
                        num_features
                    )))
                }
                Some(_) => (),
            }
        }
        let coefficients = Arc::clone(coefficients.as_dense()?);
        let layout = CoefficientLayout::new(num_features, fit_intercept);
        if coefficients.len() != layout.dim() {
            return Err(AggregatorError::InvalidConfiguration(format!(
                "expected {} coefficients for {} features, but {} were provided",
                layout.dim(),
                num_features,
                coefficients.len()
            )));
        }
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(AggregatorError::InvalidConfiguration(format!(
                "epsilon must be positive, but {} was provided",
                epsilon
            )));
        }

        let linear = coefficients[..num_features].to_vec();
        let margin_offset = match (layout.intercept_index(), &scaled_mean) {
            (Some(idx), Some(mean)) => coefficients[idx] - dot(&linear, mean),
            _ => f64::NAN,
        };

        Ok(HuberBlockAggregator {
            layout,
            epsilon,
            coefficients,
            inverse_std,
            scaled_mean,
            linear,
            margin_offset,
            state: AggregateState::zeros(layout.dim()),
        })
    }

    /// Create a new aggregator from shared scaling statistics.
    pub fn from_scaling(
        scaling: &FeatureScaling,
        fit_intercept: bool,
        epsilon: f64,
        coefficients: &Coefficients,
    ) -> Result<Self, AggregatorError> {
        Self::new(
            Arc::clone(scaling.inverse_std()),
            scaling.scaled_mean().cloned(),
            fit_intercept,
            epsilon,
            coefficients,
        )
    }

    /// An aggregator with the same configuration and coefficients, and zero sums.
    pub fn empty_like(&self) -> Self {
        HuberBlockAggregator {
            layout: self.layout,
            epsilon: self.epsilon,
            coefficients: Arc::clone(&self.coefficients),
            inverse_std: Arc::clone(&self.inverse_std),
            scaled_mean: self.scaled_mean.clone(),
            linear: self.linear.clone(),
            margin_offset: self.margin_offset,
            state: AggregateState::zeros(self.layout.dim()),
        }
    }

    /// Fold one block of instances into the running sums.
    ///
    /// The block must store one instance per row, have as many features as
    /// the aggregator and carry non-negative weights. A rejected block leaves
    /// the sums untouched.
    pub fn add(&mut self, block: &InstanceBlock) -> Result<&mut Self, AggregatorError> {
        if !block.matrix.is_transposed() {
            return Err(AggregatorError::InvalidBlockLayout);
        }
        let num_features = self.layout.num_features;
        if block.num_features() != num_features {
            return Err(AggregatorError::DimensionMismatch {
                expected: num_features,
                found: block.num_features(),
            });
        }
        if let Some((index, &weight)) = block.weights.iter().enumerate().find(|(_, w)| !(**w >= 0.0)) {
            return Err(AggregatorError::InvalidWeight { index, weight });
        }
        if block.weights.iter().all(|w| *w == 0.0) {
            return Ok(self);
        }

        let size = block.size();
        let epsilon = self.epsilon;
        // Margins first, overwritten in place by the multipliers.
        let mut buffer = if self.layout.fit_intercept {
            vec![self.margin_offset; size]
        } else {
            vec![0.0; size]
        };
        gemv(1.0, &block.matrix, &self.linear, 1.0, &mut buffer);

        let sigma = self.coefficients[self.layout.sigma_index()];
        let threshold = sigma * epsilon;
        let mut loss_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut multiplier_sum = 0.0;
        let mut sigma_gradient_sum = 0.0;
        for ((slot, &label), &weight) in buffer.iter_mut().zip(block.labels.iter()).zip(block.weights.iter()) {
            if weight == 0.0 {
                *slot = 0.0;
                continue;
            }
            let linear_loss = label - *slot;
            let multiplier = if linear_loss.abs() <= threshold {
                let scaled = linear_loss / sigma;
                loss_sum += 0.5 * weight * (sigma + linear_loss * linear_loss / sigma);
                sigma_gradient_sum += 0.5 * weight * (1.0 - scaled * scaled);
                -weight * linear_loss / sigma
            } else {
                let sign = if linear_loss >= 0.0 { -1.0 } else { 1.0 };
                loss_sum += 0.5 * weight * (sigma + 2.0 * epsilon * linear_loss.abs() - sigma * epsilon * epsilon);
                sigma_gradient_sum += 0.5 * weight * (1.0 - epsilon * epsilon);
                weight * sign * epsilon
            };
            *slot = multiplier;
            multiplier_sum += multiplier;
            weight_sum += weight;
        }

        self.state.loss_sum += loss_sum;
        self.state.weight_sum += weight_sum;

        let dim = self.layout.dim();
        let gradient = &mut self.state.gradient_sum;
        gemv_transposed(1.0, &block.matrix, &buffer, 1.0, &mut gradient[..num_features]);
        if let (Some(idx), Some(mean)) = (self.layout.intercept_index(), &self.scaled_mean) {
            axpy(-multiplier_sum, mean, &mut gradient[..num_features]);
            gradient[idx] += multiplier_sum;
        }
        gradient[dim - 1] += sigma_gradient_sum;

        Ok(self)
    }

    /// Combine the sums of another aggregator with the same configuration into this one.
    pub fn merge(&mut self, other: &HuberBlockAggregator) -> Result<&mut Self, AggregatorError> {
        if self.layout != other.layout {
            return Err(AggregatorError::IncompatibleAggregators(format!(
                "{:?} differs from {:?}",
                self.layout, other.layout
            )));
        }
        if self.epsilon != other.epsilon {
            return Err(AggregatorError::IncompatibleAggregators(format!(
                "epsilon {} differs from {}",
                self.epsilon, other.epsilon
            )));
        }
        self.merge_state(&other.state)
    }

    /// Combine raw sums, for example partial sums received from another worker.
    pub fn merge_state(&mut self, other: &AggregateState) -> Result<&mut Self, AggregatorError> {
        if self.state.gradient_sum.len() != other.gradient_sum.len() {
            return Err(AggregatorError::IncompatibleAggregators(format!(
                "gradient length {} differs from {}",
                self.state.gradient_sum.len(),
                other.gradient_sum.len()
            )));
        }
        self.state.absorb(other);
        Ok(self)
    }

    pub fn loss_sum(&self) -> f64 {
        self.state.loss_sum
    }

    pub fn weight_sum(&self) -> f64 {
        self.state.weight_sum
    }

    pub fn gradient_sum(&self) -> &[f64] {
        &self.state.gradient_sum
    }

    pub fn state(&self) -> &AggregateState {
        &self.state
    }

    pub fn into_state(self) -> AggregateState {
        self.state
    }

    /// Weighted mean loss.
    pub fn loss(&self) -> Result<f64, AggregatorError> {
        if self.state.weight_sum == 0.0 {
            return Err(AggregatorError::EmptyAggregate);
        }
        Ok(self.state.loss_sum / self.state.weight_sum)
    }

    /// Weighted mean gradient.
    pub fn gradient(&self) -> Result<Vec<f64>, AggregatorError> {
        if self.state.weight_sum == 0.0 {
            return Err(AggregatorError::EmptyAggregate);
        }
        let w = self.state.weight_sum;
        Ok(self.state.gradient_sum.iter().map(|g| g / w).collect())
    }

    pub fn num_features(&self) -> usize {
        self.layout.num_features
    }

    pub fn fit_intercept(&self) -> bool {
        self.layout.fit_intercept
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Length of the coefficient and gradient vectors.
    pub fn dim(&self) -> usize {
        self.layout.dim()
    }

    /// Virtual centering offset added to every margin, only defined when fitting an intercept.
    pub fn margin_offset(&self) -> Option<f64> {
        self.layout.fit_intercept.then_some(self.margin_offset)
    }
}
