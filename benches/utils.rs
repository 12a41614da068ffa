#![allow(dead_code)]
use huber_aggregator::Instance;
use rand::distributions::Uniform;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// create_instances
//
// Linear model with uniform noise and a share of gross outliers.
pub(crate) fn create_instances(n_samples: usize, n_features: usize, density: f64) -> Vec<Instance> {

    // reproducible seed
    let mut rng = StdRng::seed_from_u64(1903);

    // feature distributions
    let feature_distribution = Uniform::new(0.0, 1.0);
    let noise_distribution = Uniform::new(-1.0, 1.0);
    let weight_distribution = Uniform::new(-1.0, 1.0);

    // generate random weights for the linear model
    let weights: Vec<f64> = (0..n_features).map(|_| rng.sample(weight_distribution)).collect();

    (0..n_samples)
        .map(|i| {
            let features: Vec<f64> = (0..n_features)
                .map(|_| {
                    if rng.gen_bool(density) {
                        rng.sample(feature_distribution)
                    } else {
                        0.0
                    }
                })
                .collect();

            // linear model + uniform noise, every 20th label is an outlier
            let linear: f64 = features.iter().zip(weights.iter()).map(|(x, w)| x * w).sum();
            let noise = if i % 20 == 0 { 50.0 } else { rng.sample(noise_distribution) };
            Instance::new(linear + noise, 1.0, features)
        })
        .collect()
}
