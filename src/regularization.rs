//! L2 regularization of the linear weights.
use crate::errors::AggregatorError;
use crate::utils::validate_float_parameter;
use std::sync::Arc;

/// L2 penalty `0.5 * reg_param * sum(w^2)`, applied to the linear weights only.
///
/// The intercept and sigma are never penalized. Without standardization the
/// penalty is expressed in the original feature space, `w_j^2 / std_j^2`.
#[derive(Debug, Clone)]
pub struct L2Regularization {
    reg_param: f64,
    num_features: usize,
    features_std: Option<Arc<[f64]>>,
}

impl L2Regularization {
    /// * `reg_param` - Regularization strength.
    /// * `num_features` - Number of leading coefficients to penalize.
    /// * `standardization` - Penalize the rescaled weights directly.
    /// * `features_std` - Feature standard deviations, required without standardization.
    pub fn new(
        reg_param: f64,
        num_features: usize,
        standardization: bool,
        features_std: Option<Arc<[f64]>>,
    ) -> Result<Self, AggregatorError> {
        validate_float_parameter(reg_param, 0.0, f64::INFINITY, "reg_param")?;
        let features_std = if standardization {
            None
        } else {
            match features_std {
                Some(std) if std.len() == num_features => Some(std),
                _ => {
                    return Err(AggregatorError::InvalidConfiguration(
                        "feature standard deviations are required without standardization".to_string(),
                    ))
                }
            }
        };
        Ok(L2Regularization {
            reg_param,
            num_features,
            features_std,
        })
    }

    pub fn should_apply(&self, index: usize) -> bool {
        index < self.num_features
    }

    /// Penalty value and its gradient, the gradient has the length of `coefficients`.
    pub fn calculate(&self, coefficients: &[f64]) -> (f64, Vec<f64>) {
        let mut gradient = vec![0.0; coefficients.len()];
        if self.reg_param == 0.0 {
            return (0.0, gradient);
        }
        let mut sum = 0.0;
        for (j, (coef, g)) in coefficients.iter().zip(gradient.iter_mut()).enumerate() {
            if !self.should_apply(j) {
                continue;
            }
            match &self.features_std {
                None => {
                    sum += coef * coef;
                    *g = self.reg_param * coef;
                }
                Some(std) => {
                    let s = std[j];
                    if s != 0.0 {
                        let temp = coef / (s * s);
                        sum += coef * temp;
                        *g = self.reg_param * temp;
                    }
                }
            }
        }
        (0.5 * self.reg_param * sum, gradient)
    }
}
