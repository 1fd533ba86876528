use abc_core::{derive_substream_seed, AbcError, ErrorInfo, Parameter, Particle, RngHandle};
use rand::distributions::WeightedIndex;
use rand_distr::{Distribution, Normal};

use crate::transition::Transition;

const DEFAULT_BOOTSTRAP: usize = 30;
const MIN_SCALE: f64 = 1e-12;

/// Weighted Gaussian kernel density estimate with a diagonal bandwidth.
///
/// Bandwidths follow Silverman's rule applied to the weighted standard
/// deviation of each coordinate.
#[derive(Debug, Clone)]
pub struct GaussianKdeTransition {
    names: Vec<String>,
    points: Vec<Vec<f64>>,
    weights: Vec<f64>,
    scales: Vec<f64>,
    bandwidth_factor: f64,
    n_bootstrap: usize,
    seed: u64,
}

impl GaussianKdeTransition {
    /// Fits the estimate to the accepted particles of one model.
    pub fn fit(particles: &[Particle]) -> Result<Self, AbcError> {
        let accepted: Vec<&Particle> = particles
            .iter()
            .filter(|particle| particle.accepted && particle.weight > 0.0)
            .collect();
        let first = accepted.first().ok_or_else(|| {
            AbcError::Config(ErrorInfo::new(
                "empty-population",
                "density estimate needs at least one weighted particle",
            ))
        })?;
        let names: Vec<String> = first.parameter.keys().cloned().collect();

        let mut points = Vec::with_capacity(accepted.len());
        for particle in &accepted {
            let point = names
                .iter()
                .map(|name| {
                    particle.parameter.get(name).copied().ok_or_else(|| {
                        AbcError::Config(
                            ErrorInfo::new("parameter-mismatch", "particles disagree on parameters")
                                .with_context("missing", name),
                        )
                    })
                })
                .collect::<Result<Vec<f64>, AbcError>>()?;
            points.push(point);
        }
        let total: f64 = accepted.iter().map(|particle| particle.weight).sum();
        let weights: Vec<f64> = accepted.iter().map(|particle| particle.weight / total).collect();
        let scales = weighted_std(&points, &weights, names.len());

        Ok(Self {
            names,
            points,
            weights,
            scales,
            bandwidth_factor: 1.0,
            n_bootstrap: DEFAULT_BOOTSTRAP,
            seed: 0,
        })
    }

    /// Sets the bootstrap replicate count and the seed of the replicates.
    pub fn with_bootstrap(mut self, n_bootstrap: usize, seed: u64) -> Self {
        self.n_bootstrap = n_bootstrap.max(2);
        self.seed = seed;
        self
    }

    /// Scales every bandwidth by `factor`.
    pub fn with_bandwidth_factor(mut self, factor: f64) -> Self {
        self.bandwidth_factor = factor;
        self
    }

    /// Number of particles the estimate was fitted to.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the estimate holds no particle.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Effective sample size of the fitted weights.
    pub fn effective_sample_size(&self) -> f64 {
        let sum_sq: f64 = self.weights.iter().map(|w| w * w).sum();
        if sum_sq > 0.0 {
            1.0 / sum_sq
        } else {
            0.0
        }
    }

    /// Per-coordinate kernel bandwidths for an estimate built from `n` points.
    pub fn bandwidths(&self, n: f64) -> Vec<f64> {
        let d = self.names.len() as f64;
        let factor = (4.0 / ((d + 2.0) * n.max(1.0))).powf(1.0 / (d + 4.0));
        self.scales
            .iter()
            .map(|scale| (scale * factor * self.bandwidth_factor).max(MIN_SCALE))
            .collect()
    }

    /// Density of the fitted estimate at `parameter`.
    pub fn pdf(&self, parameter: &Parameter) -> f64 {
        let x: Vec<f64> = self
            .names
            .iter()
            .map(|name| parameter.get(name).copied().unwrap_or(f64::NAN))
            .collect();
        let bandwidths = self.bandwidths(self.effective_sample_size());
        density(&x, &self.points, &self.weights, &bandwidths)
    }

    /// Draws a parameter: pick a particle by weight and perturb it.
    pub fn sample(&self, rng: &mut RngHandle) -> Result<Parameter, AbcError> {
        let index = WeightedIndex::new(&self.weights)
            .map_err(|err| AbcError::Config(ErrorInfo::new("invalid-weights", err.to_string())))?
            .sample(rng);
        let bandwidths = self.bandwidths(self.effective_sample_size());
        let mut parameter = Parameter::new();
        for ((name, center), bandwidth) in self.names.iter().zip(&self.points[index]).zip(&bandwidths) {
            let kernel = Normal::new(*center, *bandwidth)
                .map_err(|err| AbcError::Config(ErrorInfo::new("invalid-bandwidth", err.to_string())))?;
            parameter.insert(name.clone(), kernel.sample(rng));
        }
        Ok(parameter)
    }

    fn bootstrap_cv(&self, n: usize) -> Result<f64, AbcError> {
        let picker = WeightedIndex::new(&self.weights)
            .map_err(|err| AbcError::Config(ErrorInfo::new("invalid-weights", err.to_string())))?;
        let mut rng = RngHandle::from_seed(derive_substream_seed(self.seed, n as u64));
        let bandwidths = self.bandwidths(n as f64);
        let uniform = vec![1.0 / n as f64; n];

        let mut sums = vec![0.0; self.points.len()];
        let mut sums_sq = vec![0.0; self.points.len()];
        for _ in 0..self.n_bootstrap {
            let resampled: Vec<Vec<f64>> = (0..n)
                .map(|_| self.points[picker.sample(&mut rng)].clone())
                .collect();
            for (idx, point) in self.points.iter().enumerate() {
                let value = density(point, &resampled, &uniform, &bandwidths);
                sums[idx] += value;
                sums_sq[idx] += value * value;
            }
        }

        let replicates = self.n_bootstrap as f64;
        let mut mean_cv = 0.0;
        for ((sum, sum_sq), weight) in sums.iter().zip(&sums_sq).zip(&self.weights) {
            let mean = sum / replicates;
            let variance = (sum_sq / replicates - mean * mean).max(0.0) * replicates / (replicates - 1.0);
            if mean > 0.0 {
                mean_cv += weight * variance.sqrt() / mean;
            }
        }
        Ok(mean_cv)
    }
}

impl Transition for GaussianKdeTransition {
    fn mean_cv(&self, n_particles: usize) -> f64 {
        match self.bootstrap_cv(n_particles.max(1)) {
            Ok(cv) => cv,
            Err(err) => {
                log::warn!("bootstrap of the density estimate failed: {err}");
                f64::NAN
            }
        }
    }
}

fn weighted_std(points: &[Vec<f64>], weights: &[f64], dims: usize) -> Vec<f64> {
    (0..dims)
        .map(|d| {
            let mean: f64 = points.iter().zip(weights).map(|(p, w)| w * p[d]).sum();
            let var: f64 = points
                .iter()
                .zip(weights)
                .map(|(p, w)| w * (p[d] - mean).powi(2))
                .sum();
            var.sqrt().max(MIN_SCALE)
        })
        .collect()
}

fn density(x: &[f64], points: &[Vec<f64>], weights: &[f64], bandwidths: &[f64]) -> f64 {
    let norm: f64 = bandwidths
        .iter()
        .map(|h| h * (2.0 * std::f64::consts::PI).sqrt())
        .product();
    points
        .iter()
        .zip(weights)
        .map(|(point, weight)| {
            let exponent: f64 = x
                .iter()
                .zip(point)
                .zip(bandwidths)
                .map(|((xi, pi), h)| ((xi - pi) / h).powi(2))
                .sum();
            weight * (-0.5 * exponent).exp()
        })
        .sum::<f64>()
        / norm
}
