//! Feature scaling
//!
//! Per-feature rescaling statistics shared read-only by every aggregator of an iteration.
use crate::data::Instance;
use crate::errors::AggregatorError;
use std::sync::Arc;

/// Weighted summary of feature columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSummary {
    /// Weighted mean of every feature.
    pub mean: Vec<f64>,
    /// Weighted, unbiased standard deviation of every feature.
    pub std: Vec<f64>,
    /// Sum of instance weights.
    pub weight_sum: f64,
}

impl FeatureSummary {
    /// Summarize the features of weighted instances.
    ///
    /// The variance uses reliability weights: `sum w (x - mean)^2 / (W - sum w^2 / W)`.
    pub fn from_instances(instances: &[Instance], num_features: usize) -> Result<Self, AggregatorError> {
        let mut weight_sum = 0.0;
        let mut weight_square_sum = 0.0;
        let mut mean = vec![0.0; num_features];
        for (index, instance) in instances.iter().enumerate() {
            if instance.features.len() != num_features {
                return Err(AggregatorError::DimensionMismatch {
                    expected: num_features,
                    found: instance.features.len(),
                });
            }
            if !(instance.weight >= 0.0) {
                return Err(AggregatorError::InvalidWeight {
                    index,
                    weight: instance.weight,
                });
            }
            weight_sum += instance.weight;
            weight_square_sum += instance.weight * instance.weight;
            for (m, x) in mean.iter_mut().zip(instance.features.iter()) {
                *m += instance.weight * x;
            }
        }
        if weight_sum == 0.0 {
            return Err(AggregatorError::EmptyAggregate);
        }
        mean.iter_mut().for_each(|m| *m /= weight_sum);

        let mut m2 = vec![0.0; num_features];
        for instance in instances {
            for ((s, x), m) in m2.iter_mut().zip(instance.features.iter()).zip(mean.iter()) {
                let d = x - m;
                *s += instance.weight * d * d;
            }
        }
        let denominator = weight_sum - weight_square_sum / weight_sum;
        let std = m2
            .iter()
            .map(|s| {
                if denominator > 0.0 {
                    (s / denominator).max(0.0).sqrt()
                } else {
                    0.0
                }
            })
            .collect();

        Ok(FeatureSummary { mean, std, weight_sum })
    }
}

/// Rescaling statistics: inverse standard deviation and, when fitting an
/// intercept, the scaled mean `mean * inverse_std`.
#[derive(Debug, Clone)]
pub struct FeatureScaling {
    inverse_std: Arc<[f64]>,
    scaled_mean: Option<Arc<[f64]>>,
}

impl FeatureScaling {
    /// Create scaling statistics from precomputed arrays.
    pub fn new(inverse_std: Arc<[f64]>, scaled_mean: Option<Arc<[f64]>>) -> Self {
        FeatureScaling {
            inverse_std,
            scaled_mean,
        }
    }

    /// Derive scaling statistics from a feature summary.
    ///
    /// Constant features get an inverse standard deviation of zero.
    pub fn from_summary(summary: &FeatureSummary, fit_intercept: bool) -> Self {
        let inverse_std: Vec<f64> = summary
            .std
            .iter()
            .map(|s| if *s != 0.0 { 1.0 / s } else { 0.0 })
            .collect();
        let scaled_mean = if fit_intercept {
            let scaled: Vec<f64> = summary.mean.iter().zip(inverse_std.iter()).map(|(m, i)| m * i).collect();
            Some(Arc::from(scaled))
        } else {
            None
        };
        FeatureScaling {
            inverse_std: Arc::from(inverse_std),
            scaled_mean,
        }
    }

    pub fn num_features(&self) -> usize {
        self.inverse_std.len()
    }

    pub fn inverse_std(&self) -> &Arc<[f64]> {
        &self.inverse_std
    }

    pub fn scaled_mean(&self) -> Option<&Arc<[f64]>> {
        self.scaled_mean.as_ref()
    }

    /// Standard deviation recovered from the inverse, zero for constant features.
    pub fn features_std(&self) -> Vec<f64> {
        self.inverse_std
            .iter()
            .map(|i| if *i != 0.0 { 1.0 / i } else { 0.0 })
            .collect()
    }

    /// Multiply features by the inverse standard deviation. Features are not centered.
    pub fn scale_instance(&self, instance: &Instance) -> Instance {
        let features = instance
            .features
            .iter()
            .zip(self.inverse_std.iter())
            .map(|(x, i)| x * i)
            .collect();
        Instance::new(instance.label, instance.weight, features)
    }

    pub fn scale_instances(&self, instances: &[Instance]) -> Vec<Instance> {
        instances.iter().map(|i| self.scale_instance(i)).collect()
    }
}
