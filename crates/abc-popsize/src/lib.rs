#![deny(missing_docs)]

//! Population size strategies for ABC-SMC.

/// Weighted Gaussian kernel density estimate.
pub mod kde;
/// Root-finding oracles for the target particle count.
pub mod predictor;
/// Constant and adaptive strategies.
pub mod strategy;
/// Convergence diagnostic of a density estimate.
pub mod transition;

pub use kde::GaussianKdeTransition;
pub use predictor::{PopulationSizePredictor, PowerLawPredictor};
pub use strategy::{AdaptiveConfig, AdaptiveStrategy, PopulationStrategy, StrategySummary};
pub use transition::Transition;
