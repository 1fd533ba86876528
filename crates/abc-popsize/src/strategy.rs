use std::fmt;

use abc_core::{AbcError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::predictor::{PopulationSizePredictor, PowerLawPredictor};
use crate::transition::Transition;

/// Settings of the adaptive population size strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Particle count of the first population.
    pub nr_particles: usize,
    /// Target mean coefficient of variation of the density estimates.
    #[serde(default = "default_mean_cv")]
    pub mean_cv: f64,
    /// Smallest admissible population.
    #[serde(default = "default_min_population_size")]
    pub min_population_size: usize,
    /// Largest admissible population; unbounded when absent.
    #[serde(default)]
    pub max_population_size: Option<usize>,
}

fn default_mean_cv() -> f64 {
    0.05
}

fn default_min_population_size() -> usize {
    10
}

impl AdaptiveConfig {
    /// Default settings starting from `nr_particles`.
    pub fn new(nr_particles: usize) -> Self {
        Self {
            nr_particles,
            mean_cv: default_mean_cv(),
            min_population_size: default_min_population_size(),
            max_population_size: None,
        }
    }

    /// Rejects settings with an empty or inverted size range.
    pub fn validate(&self) -> Result<(), AbcError> {
        if self.nr_particles == 0 {
            return Err(AbcError::config("zero-particles", "population size must be positive"));
        }
        if !(self.mean_cv > 0.0 && self.mean_cv.is_finite()) {
            return Err(AbcError::Config(
                ErrorInfo::new("invalid-mean-cv", "mean_cv must be a positive number")
                    .with_context("mean_cv", self.mean_cv),
            ));
        }
        if self.min_population_size == 0 {
            return Err(AbcError::config(
                "invalid-bounds",
                "min_population_size must be positive",
            ));
        }
        if let Some(max) = self.max_population_size {
            if max < self.min_population_size {
                return Err(AbcError::Config(
                    ErrorInfo::new("invalid-bounds", "max_population_size below the minimum")
                        .with_context("min", self.min_population_size)
                        .with_context("max", max),
                ));
            }
        }
        Ok(())
    }

    fn clamp(&self, estimate: f64) -> usize {
        let max = self.max_population_size.unwrap_or(usize::MAX);
        // saturating cast, NaN was filtered by the caller
        (estimate as usize).clamp(self.min_population_size, max)
    }
}

/// Population size that follows the convergence of the density estimates.
pub struct AdaptiveStrategy {
    config: AdaptiveConfig,
    predictor: Box<dyn PopulationSizePredictor + Send + Sync>,
}

impl fmt::Debug for AdaptiveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveStrategy")
            .field("config", &self.config)
            .field("predictor", &self.predictor.name())
            .finish()
    }
}

impl AdaptiveStrategy {
    /// Settings in use, with `nr_particles` tracking the latest size.
    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    fn adapt(&mut self, transitions: &[&dyn Transition], model_weights: &[f64]) -> usize {
        let old = self.config.nr_particles;
        if transitions.len() != model_weights.len() {
            log::warn!(
                "{} transitions for {} model weights, keeping {old} particles",
                transitions.len(),
                model_weights.len()
            );
            return old;
        }

        let cv = |n: usize| -> f64 {
            transitions
                .iter()
                .zip(model_weights)
                .map(|(transition, weight)| {
                    weight * transition.mean_cv((n as f64 * weight).round() as usize)
                })
                .sum()
        };
        let new = match self.predictor.predict(old, self.config.mean_cv, &cv) {
            Ok(estimate) if estimate.is_nan() => {
                log::warn!("population size oracle returned NaN, keeping {old} particles");
                self.config.clamp(old as f64)
            }
            Ok(estimate) => {
                let clamped = self.config.clamp(estimate);
                if (clamped as f64 - estimate).abs() >= 1.0 {
                    log::debug!("population size estimate {estimate} clamped to {clamped}");
                }
                clamped
            }
            Err(err) => {
                log::warn!("population size prediction failed, keeping {old} particles: {err}");
                self.config.clamp(old as f64)
            }
        };

        log::debug!("change nr particles {old} -> {new}");
        self.config.nr_particles = new;
        new
    }
}

/// Closed set of population size strategies.
#[derive(Debug)]
pub enum PopulationStrategy {
    /// Same size for every population.
    Constant {
        /// Particles per population.
        nr_particles: usize,
    },
    /// Size driven by the mean coefficient of variation criterion.
    Adaptive(AdaptiveStrategy),
}

impl PopulationStrategy {
    /// Fixed size strategy.
    pub fn constant(nr_particles: usize) -> Result<Self, AbcError> {
        if nr_particles == 0 {
            return Err(AbcError::config("zero-particles", "population size must be positive"));
        }
        Ok(PopulationStrategy::Constant { nr_particles })
    }

    /// Adaptive strategy using the power-law predictor.
    pub fn adaptive(config: AdaptiveConfig) -> Result<Self, AbcError> {
        Self::adaptive_with_predictor(config, PowerLawPredictor::default())
    }

    /// Adaptive strategy with a caller supplied predictor.
    pub fn adaptive_with_predictor<P>(config: AdaptiveConfig, predictor: P) -> Result<Self, AbcError>
    where
        P: PopulationSizePredictor + Send + Sync + 'static,
    {
        config.validate()?;
        log::warn!("adaptive population strategy is experimental");
        Ok(PopulationStrategy::Adaptive(AdaptiveStrategy {
            config,
            predictor: Box::new(predictor),
        }))
    }

    /// Particle count of the next population.
    pub fn nr_particles(&self) -> usize {
        match self {
            PopulationStrategy::Constant { nr_particles } => *nr_particles,
            PopulationStrategy::Adaptive(strategy) => strategy.config.nr_particles,
        }
    }

    /// Updates and returns the particle count for the next population.
    ///
    /// `model_weights` are the current model probabilities, aligned with
    /// `transitions`. Oracle failures never propagate; the previous size is
    /// kept instead.
    pub fn adapt_population_size(
        &mut self,
        transitions: &[&dyn Transition],
        model_weights: &[f64],
    ) -> usize {
        match self {
            PopulationStrategy::Constant { nr_particles } => *nr_particles,
            PopulationStrategy::Adaptive(strategy) => strategy.adapt(transitions, model_weights),
        }
    }

    /// Serialisable summary of the strategy settings.
    pub fn describe(&self) -> StrategySummary {
        match self {
            PopulationStrategy::Constant { nr_particles } => StrategySummary {
                name: "constant".to_string(),
                nr_particles: *nr_particles,
                mean_cv: None,
                min_population_size: None,
                max_population_size: None,
                predictor: None,
            },
            PopulationStrategy::Adaptive(strategy) => StrategySummary {
                name: "adaptive".to_string(),
                nr_particles: strategy.config.nr_particles,
                mean_cv: Some(strategy.config.mean_cv),
                min_population_size: Some(strategy.config.min_population_size),
                max_population_size: strategy.config.max_population_size,
                predictor: Some(strategy.predictor.name().to_string()),
            },
        }
    }
}

/// Configuration snapshot of a population strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    /// Strategy name.
    pub name: String,
    /// Current particle count.
    pub nr_particles: usize,
    /// Target mean coefficient of variation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_cv: Option<f64>,
    /// Lower size bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_population_size: Option<usize>,
    /// Upper size bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_population_size: Option<usize>,
    /// Predictor name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictor: Option<String>,
}

impl StrategySummary {
    /// Serialises the summary into indented JSON.
    pub fn to_json(&self) -> Result<String, AbcError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| AbcError::Serde(ErrorInfo::new("strategy-serialize", err.to_string())))
    }
}
