//! Huber Loss Function
//!
//! Regularized Huber loss and gradient over partitions of instance blocks.
//! Every partition is folded into its own aggregator and the aggregators are
//! merged with a parallel reduction.
use crate::aggregator::HuberBlockAggregator;
use crate::coefficients::{CoefficientLayout, Coefficients, HuberParameters};
use crate::config::HuberConfig;
use crate::data::{blockify, BlockMatrix, Instance, InstanceBlock};
use crate::errors::AggregatorError;
use crate::linalg::axpy;
use crate::regularization::L2Regularization;
use crate::scaling::{FeatureScaling, FeatureSummary};
use crate::utils::fmt_vec_output;
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::Arc;

/// Loss function an outer optimizer evaluates at successive coefficient vectors.
pub struct HuberLossFunction {
    config: HuberConfig,
    scaling: FeatureScaling,
    partitions: Vec<Vec<InstanceBlock>>,
    regularization: Option<L2Regularization>,
    pool: ThreadPool,
}

impl HuberLossFunction {
    /// Create a loss function over already scaled blocks.
    ///
    /// * `config` - Loss configuration.
    /// * `scaling` - Rescaling statistics the blocks were scaled with.
    /// * `partitions` - Blocks grouped by partition.
    pub fn new(
        config: HuberConfig,
        scaling: FeatureScaling,
        partitions: Vec<Vec<InstanceBlock>>,
    ) -> Result<Self, AggregatorError> {
        config.validate()?;
        if config.fit_intercept && scaling.scaled_mean().is_none() {
            return Err(AggregatorError::InvalidConfiguration(
                "scaled mean is required when fitting an intercept".to_string(),
            ));
        }
        let num_features = scaling.num_features();
        let regularization = if config.reg_param > 0.0 {
            Some(L2Regularization::new(
                config.reg_param,
                num_features,
                config.standardization,
                Some(Arc::from(scaling.features_std())),
            )?)
        } else {
            None
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads.unwrap_or(0))
            .build()
            .map_err(|e| AggregatorError::ThreadPool(e.to_string()))?;

        Ok(HuberLossFunction {
            config,
            scaling,
            partitions,
            regularization,
            pool,
        })
    }

    /// Summarize and scale raw instances, then split them into partitions of blocks.
    ///
    /// * `config` - Loss configuration.
    /// * `instances` - Raw, unscaled instances.
    /// * `num_features` - Number of features of every instance.
    /// * `num_partitions` - Number of contiguous partitions to reduce in parallel.
    pub fn from_instances(
        config: HuberConfig,
        instances: &[Instance],
        num_features: usize,
        num_partitions: usize,
    ) -> Result<Self, AggregatorError> {
        config.validate()?;
        if num_partitions == 0 {
            return Err(AggregatorError::InvalidParameter(
                "num_partitions".to_string(),
                "a positive number of partitions".to_string(),
                num_partitions.to_string(),
            ));
        }
        let summary = FeatureSummary::from_instances(instances, num_features)?;
        let constant = summary.std.iter().filter(|s| **s == 0.0).count();
        if constant > 0 {
            warn!("{} features are constant and will not contribute to the margin.", constant);
        }
        let scaling = FeatureScaling::from_summary(&summary, config.fit_intercept);
        let scaled = scaling.scale_instances(instances);

        let chunk = scaled.len().div_ceil(num_partitions).max(1);
        let partitions = scaled
            .chunks(chunk)
            .map(|part| blockify(part, num_features, config.max_block_rows))
            .collect::<Result<Vec<_>, _>>()?;
        let (sparse_blocks, stored_values) = partitions
            .iter()
            .flatten()
            .filter_map(|block| match &block.matrix {
                BlockMatrix::Sparse(m) => Some(m.nnz()),
                BlockMatrix::Dense(_) => None,
            })
            .fold((0usize, 0usize), |(count, nnz), block_nnz| (count + 1, nnz + block_nnz));
        info!(
            "Prepared {} instances in {} partitions and {} blocks, {} sparse with {} stored values.",
            instances.len(),
            partitions.len(),
            partitions.iter().map(|p| p.len()).sum::<usize>(),
            sparse_blocks,
            stored_values
        );
        Self::new(config, scaling, partitions)
    }

    pub fn num_features(&self) -> usize {
        self.scaling.num_features()
    }

    pub fn layout(&self) -> CoefficientLayout {
        CoefficientLayout::new(self.num_features(), self.config.fit_intercept)
    }

    pub fn scaling(&self) -> &FeatureScaling {
        &self.scaling
    }

    pub fn config(&self) -> &HuberConfig {
        &self.config
    }

    /// Starting point for the optimizer.
    pub fn initial_coefficients(&self) -> Coefficients {
        Coefficients::initial(self.num_features(), self.config.fit_intercept)
    }

    /// Map a solution back to the original feature space.
    pub fn to_original_scale(&self, solution: &[f64]) -> Result<HuberParameters, AggregatorError> {
        self.layout().to_original_scale(solution, &self.scaling)
    }

    /// Aggregate raw sums over every partition.
    pub fn aggregate(&self, coefficients: &Coefficients) -> Result<HuberBlockAggregator, AggregatorError> {
        let template = HuberBlockAggregator::from_scaling(
            &self.scaling,
            self.config.fit_intercept,
            self.config.epsilon,
            coefficients,
        )?;
        self.pool.install(|| {
            self.partitions
                .par_iter()
                .map(|blocks| -> Result<HuberBlockAggregator, AggregatorError> {
                    let mut aggregator = template.empty_like();
                    for block in blocks {
                        aggregator.add(block)?;
                    }
                    Ok(aggregator)
                })
                .try_reduce(
                    || template.empty_like(),
                    |mut left: HuberBlockAggregator, right: HuberBlockAggregator| {
                        left.merge(&right)?;
                        Ok(left)
                    },
                )
        })
    }

    /// Mean loss and gradient, plus the regularization penalty.
    ///
    /// * `coefficients` - Dense coefficients: weights, optional intercept, sigma.
    pub fn evaluate(&self, coefficients: &[f64]) -> Result<(f64, Vec<f64>), AggregatorError> {
        let aggregator = self.aggregate(&Coefficients::dense(coefficients.to_vec()))?;
        let mut loss = aggregator.loss()?;
        let mut gradient = aggregator.gradient()?;
        if let Some(regularization) = &self.regularization {
            let (penalty, penalty_gradient) = regularization.calculate(coefficients);
            loss += penalty;
            axpy(1.0, &penalty_gradient, &mut gradient);
        }
        debug!(
            "Huber loss {:.6} over weight {:.4}, gradient [{}]",
            loss,
            aggregator.weight_sum(),
            fmt_vec_output(&gradient)
        );
        Ok((loss, gradient))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn instances(n: usize, num_features: usize, seed: u64) -> Vec<Instance> {
        let mut rng = StdRng::seed_from_u64(seed);
        let truth: Vec<f64> = (0..num_features).map(|_| rng.gen_range(-2.0..2.0)).collect();
        (0..n)
            .map(|i| {
                let features: Vec<f64> = (0..num_features)
                    .map(|j| {
                        if (i + j) % 3 == 0 {
                            0.0
                        } else {
                            rng.gen_range(0.0..4.0) + j as f64
                        }
                    })
                    .collect();
                let noise = if i % 10 == 0 { 30.0 } else { rng.gen_range(-0.5..0.5) };
                let label = features.iter().zip(truth.iter()).map(|(x, w)| x * w).sum::<f64>() + 3.0 + noise;
                Instance::new(label, rng.gen_range(0.5..1.5), features)
            })
            .collect()
    }

    fn finite_difference_check(function: &HuberLossFunction, point: &[f64]) {
        let (_, gradient) = function.evaluate(point).unwrap();
        let h = 1e-6;
        for j in 0..point.len() {
            let mut up = point.to_vec();
            let mut down = point.to_vec();
            up[j] += h;
            down[j] -= h;
            let numeric = (function.evaluate(&up).unwrap().0 - function.evaluate(&down).unwrap().0) / (2.0 * h);
            assert!(
                (numeric - gradient[j]).abs() < 1e-4 * (1.0 + gradient[j].abs()),
                "coefficient {}: numeric {} analytic {}",
                j,
                numeric,
                gradient[j]
            );
        }
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let data = instances(200, 3, 42);
        for (fit_intercept, reg_param, standardization) in
            [(true, 0.0, true), (false, 0.0, true), (true, 0.3, true), (true, 0.3, false)]
        {
            let config = HuberConfig::default()
                .set_fit_intercept(fit_intercept)
                .set_reg_param(reg_param)
                .set_standardization(standardization)
                .set_max_block_rows(16);
            let function = HuberLossFunction::from_instances(config, &data, 3, 4).unwrap();
            let mut point = vec![0.4, -0.3, 1.2];
            if fit_intercept {
                point.push(2.5);
            }
            point.push(1.7);
            finite_difference_check(&function, &point);
        }
    }

    #[test]
    fn test_gradient_sparse_blocks() {
        // Mostly zero features are stored sparse.
        let mut data = instances(60, 12, 9);
        for instance in data.iter_mut() {
            for (j, x) in instance.features.iter_mut().enumerate() {
                if j % 4 != 0 {
                    *x = 0.0;
                }
            }
        }
        let function = HuberLossFunction::from_instances(HuberConfig::default(), &data, 12, 3).unwrap();
        assert!(function.partitions.iter().flatten().all(|b| b.matrix.is_sparse()));
        let mut point = vec![0.1; 12];
        point.push(-1.0);
        point.push(2.0);
        finite_difference_check(&function, &point);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let data = instances(300, 4, 1);
        let config = HuberConfig::default().set_max_block_rows(32).set_num_threads(Some(4));
        let function = HuberLossFunction::from_instances(config, &data, 4, 7).unwrap();
        let coefficients = Coefficients::dense(vec![0.5, 0.5, -0.5, 1.0, 2.0, 1.5]);
        let parallel = function.aggregate(&coefficients).unwrap();

        let mut sequential = HuberBlockAggregator::from_scaling(function.scaling(), true, 1.35, &coefficients).unwrap();
        for block in function.partitions.iter().flatten() {
            sequential.add(block).unwrap();
        }
        assert!((parallel.loss_sum() - sequential.loss_sum()).abs() < 1e-8 * sequential.loss_sum().abs());
        assert!((parallel.weight_sum() - sequential.weight_sum()).abs() < 1e-10 * sequential.weight_sum());
        for (p, s) in parallel.gradient_sum().iter().zip(sequential.gradient_sum().iter()) {
            assert!((p - s).abs() < 1e-8 * (1.0 + s.abs()));
        }
    }

    #[test]
    fn test_original_scale_margins() {
        let data = instances(50, 2, 5);
        let function = HuberLossFunction::from_instances(HuberConfig::default(), &data, 2, 2).unwrap();
        let solution = [0.8, -1.1, 0.6, 1.2];
        let params = function.to_original_scale(&solution).unwrap();
        assert_eq!(params.scale, 1.2);

        // Margin on scaled storage with virtual centering equals the raw prediction.
        let aggregator =
            HuberBlockAggregator::from_scaling(function.scaling(), true, 1.35, &Coefficients::dense(solution.to_vec()))
                .unwrap();
        let offset = aggregator.margin_offset().unwrap();
        for instance in &data {
            let scaled = function.scaling().scale_instance(instance);
            let margin = offset + solution[0] * scaled.features[0] + solution[1] * scaled.features[1];
            assert!((margin - params.predict(&instance.features)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_errors() {
        let data = instances(10, 2, 3);
        assert!(matches!(
            HuberLossFunction::from_instances(HuberConfig::default(), &data, 2, 0),
            Err(AggregatorError::InvalidParameter(..))
        ));
        assert!(HuberLossFunction::from_instances(HuberConfig::default().set_epsilon(0.5), &data, 2, 1).is_err());

        let scaling = FeatureScaling::new(Arc::from(vec![1.0, 1.0]), None);
        assert!(matches!(
            HuberLossFunction::new(HuberConfig::default(), scaling.clone(), vec![]),
            Err(AggregatorError::InvalidConfiguration(_))
        ));

        // No instance carries weight.
        let function =
            HuberLossFunction::new(HuberConfig::default().set_fit_intercept(false), scaling, vec![vec![]]).unwrap();
        assert_eq!(
            function.evaluate(&[0.0, 0.0, 1.0]).unwrap_err(),
            AggregatorError::EmptyAggregate
        );
        assert!(matches!(
            function.evaluate(&[0.0, 1.0]),
            Err(AggregatorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_initial_coefficients() {
        let data = instances(20, 3, 8);
        let function = HuberLossFunction::from_instances(HuberConfig::default(), &data, 3, 2).unwrap();
        let initial = function.initial_coefficients();
        assert_eq!(initial.len(), 5);
        let (loss, gradient) = function.evaluate(initial.as_dense().unwrap()).unwrap();
        assert!(loss > 0.0);
        assert_eq!(gradient.len(), 5);
    }
}
