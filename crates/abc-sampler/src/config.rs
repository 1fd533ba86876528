use std::fs;
use std::path::Path;

use abc_core::{AbcError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing the parallel sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Number of worker threads. `None` uses the detected core count.
    #[serde(default)]
    pub n_procs: Option<usize>,
    /// Master seed and stream layout.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Bounded wait, in milliseconds, between worker liveness checks.
    #[serde(default = "default_health_poll_ms")]
    pub health_poll_ms: u64,
    /// Optional ceiling on evaluation attempts per population.
    #[serde(default)]
    pub max_evaluations: Option<u64>,
}

fn default_health_poll_ms() -> u64 {
    50
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            n_procs: None,
            seed_policy: SeedPolicy::default(),
            health_poll_ms: default_health_poll_ms(),
            max_evaluations: None,
        }
    }
}

impl SamplerConfig {
    /// Returns a default configuration pinned to `n_procs` workers.
    pub fn with_n_procs(n_procs: usize) -> Self {
        Self {
            n_procs: Some(n_procs),
            ..Self::default()
        }
    }

    /// Parses a configuration from a YAML document and validates it.
    pub fn from_yaml_str(contents: &str) -> Result<Self, AbcError> {
        let config: SamplerConfig = serde_yaml::from_str(contents).map_err(|err| {
            AbcError::Serde(ErrorInfo::new("yaml-parse", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, AbcError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            AbcError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Rejects configurations that could never complete a population.
    pub fn validate(&self) -> Result<(), AbcError> {
        if self.n_procs == Some(0) {
            return Err(AbcError::Config(
                ErrorInfo::new("zero-workers", "sampler requires at least one worker")
                    .with_hint("leave n_procs unset to use every available core"),
            ));
        }
        if self.health_poll_ms == 0 {
            return Err(AbcError::config(
                "invalid-health-poll",
                "health_poll_ms must be positive",
            ));
        }
        if self.max_evaluations == Some(0) {
            return Err(AbcError::config(
                "invalid-evaluation-budget",
                "max_evaluations must be positive when set",
            ));
        }
        Ok(())
    }

    /// Number of workers to spawn after applying the core-count default.
    pub fn resolved_n_procs(&self) -> usize {
        self.n_procs.unwrap_or_else(nr_cores_available)
    }
}

/// Number of cores the host makes available to this process.
pub fn nr_cores_available() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for every population sampled by this sampler.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// How random streams are assigned to evaluations.
    #[serde(default)]
    pub streams: RngStreams,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            streams: RngStreams::default(),
        }
    }
}

/// Assignment of random streams to evaluations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RngStreams {
    /// One stream per worker, seeded from the worker index.
    #[default]
    PerWorker,
    /// A fresh stream per evaluation id. Results do not depend on the worker count.
    PerEvaluation,
}
