use crate::errors::AggregatorError;

pub fn fmt_vec_output(v: &[f64]) -> String {
    let mut res = String::new();
    if let Some(last) = v.len().checked_sub(1) {
        if last == 0 {
            return format!("{:.4}", v[0]);
        }
        for n in &v[..last] {
            res.push_str(format!("{:.4}", n).as_str());
            res.push_str(", ");
        }
        res.push_str(format!("{:.4}", &v[last]).as_str());
    }
    res
}

// Validation
/// Validate a finite value strictly above `min`.
pub fn validate_float_above(value: f64, min: f64, parameter: &str) -> Result<(), AggregatorError> {
    if value.is_finite() && value > min {
        Ok(())
    } else {
        Err(AggregatorError::InvalidParameter(
            parameter.to_string(),
            format!("finite real value above {}", min),
            value.to_string(),
        ))
    }
}

pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), AggregatorError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(AggregatorError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}
