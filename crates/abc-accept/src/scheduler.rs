use std::fs;
use std::path::Path;

use abc_core::{AbcError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::scheme::{RoundRecords, SchemeState, SchemeStep, ThresholdScheme};

const RELAX_TOLERANCE: f64 = 1e-12;

/// Reaction to a scheme proposing a larger threshold than the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelaxPolicy {
    /// Fail with `threshold-relaxed`.
    #[default]
    Error,
    /// Log a warning and keep the previous threshold.
    ClampAndWarn,
}

/// YAML-configurable threshold schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Schedule used from round one onward.
    #[serde(default)]
    pub scheme: ThresholdScheme,
    /// Threshold (or temperature) of round zero.
    #[serde(default = "default_initial")]
    pub initial: f64,
    /// Lower bound no threshold goes below.
    #[serde(default)]
    pub floor: f64,
    /// Index of the last round, when known in advance.
    #[serde(default)]
    pub max_rounds: Option<usize>,
    /// Handling of relaxing proposals.
    #[serde(default)]
    pub relax_policy: RelaxPolicy,
}

fn default_initial() -> f64 {
    f64::INFINITY
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheme: ThresholdScheme::default(),
            initial: default_initial(),
            floor: 0.0,
            max_rounds: None,
            relax_policy: RelaxPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, AbcError> {
        let config: SchedulerConfig = serde_yaml::from_str(contents)
            .map_err(|err| AbcError::Serde(ErrorInfo::new("yaml-parse", err.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a YAML file.
    pub fn load(path: &Path) -> Result<Self, AbcError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            AbcError::Serde(
                ErrorInfo::new("config-read", err.to_string()).with_context("path", path.display()),
            )
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Rejects schedules that cannot produce a valid threshold sequence.
    pub fn validate(&self) -> Result<(), AbcError> {
        self.scheme.validate()?;
        if self.initial.is_nan() || self.floor.is_nan() || !self.floor.is_finite() {
            return Err(AbcError::Config(
                ErrorInfo::new("invalid-bounds", "initial and floor must be numbers")
                    .with_context("initial", self.initial)
                    .with_context("floor", self.floor),
            ));
        }
        if self.initial < self.floor {
            return Err(AbcError::Config(
                ErrorInfo::new("invalid-bounds", "initial threshold lies below the floor")
                    .with_context("initial", self.initial)
                    .with_context("floor", self.floor),
            ));
        }
        if self.scheme.requires_finite_initial() && !self.initial.is_finite() {
            return Err(AbcError::Config(
                ErrorInfo::new("invalid-bounds", "scheme decays from a finite initial value")
                    .with_context("scheme", self.scheme.name())
                    .with_hint("set initial explicitly"),
            ));
        }
        if self.scheme == ThresholdScheme::FrielPettitt && self.floor <= 0.0 {
            return Err(AbcError::Config(
                ErrorInfo::new("invalid-bounds", "power ladder divides a positive floor")
                    .with_context("scheme", self.scheme.name())
                    .with_context("floor", self.floor)
                    .with_hint("set floor to the final temperature, usually 1"),
            ));
        }
        if self.scheme.requires_max_rounds() && self.max_rounds.is_none() {
            return Err(AbcError::Config(
                ErrorInfo::new("missing-max-rounds", "scheme needs the number of rounds")
                    .with_context("scheme", self.scheme.name()),
            ));
        }
        if self.max_rounds == Some(0) {
            return Err(AbcError::config(
                "missing-max-rounds",
                "max_rounds must be at least one",
            ));
        }
        Ok(())
    }
}

/// One issued threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRecord {
    /// Round the threshold applied to.
    pub round: usize,
    /// Threshold value.
    pub threshold: f64,
    /// Acceptance rate observed at this threshold; `None` while the round runs.
    pub acceptance_rate: Option<f64>,
}

/// Owner of the threshold history.
///
/// Round zero uses `config.initial`; every later round is computed from the
/// records of the round before it. The issued sequence never increases.
#[derive(Debug, Clone)]
pub struct ThresholdScheduler {
    config: SchedulerConfig,
    history: Vec<ThresholdRecord>,
    state: SchemeState,
}

impl ThresholdScheduler {
    /// Creates a scheduler positioned at round zero.
    pub fn new(config: SchedulerConfig) -> Result<Self, AbcError> {
        config.validate()?;
        let initial = ThresholdRecord {
            round: 0,
            threshold: config.initial,
            acceptance_rate: None,
        };
        Ok(Self {
            config,
            history: vec![initial],
            state: SchemeState::default(),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Every issued threshold in round order.
    pub fn history(&self) -> &[ThresholdRecord] {
        &self.history
    }

    /// Threshold values indexed by round, for use in an accept context.
    pub fn thresholds(&self) -> Vec<f64> {
        self.history.iter().map(|record| record.threshold).collect()
    }

    /// Round of the most recent threshold.
    pub fn current_round(&self) -> usize {
        self.current().round
    }

    /// Most recently issued threshold.
    pub fn current_threshold(&self) -> f64 {
        self.current().threshold
    }

    fn current(&self) -> &ThresholdRecord {
        // history always holds the round-zero entry
        &self.history[self.history.len() - 1]
    }

    /// Computes and records the threshold for `round`.
    ///
    /// `records` describe the previous round. `round` must directly follow
    /// the current round.
    pub fn next_threshold(&mut self, round: usize, records: &RoundRecords) -> Result<f64, AbcError> {
        let previous = *self.current();
        if round != previous.round + 1 {
            return Err(AbcError::Scheduler(
                ErrorInfo::new("round-out-of-order", "rounds must advance one at a time")
                    .with_context("expected", previous.round + 1)
                    .with_context("requested", round),
            ));
        }
        if self.config.scheme.requires_temperature() && !records.is_temperature_mode() {
            return Err(AbcError::Scheduler(
                ErrorInfo::new(
                    "scheme-unsupported",
                    "scheme needs log densities from a stochastic acceptor",
                )
                .with_context("scheme", self.config.scheme.name()),
            ));
        }
        if records.is_temperature_mode() && self.config.floor < 1.0 {
            return Err(AbcError::Scheduler(
                ErrorInfo::new("temperature-floor", "temperatures must stay at or above one")
                    .with_context("scheme", self.config.scheme.name())
                    .with_context("floor", self.config.floor)
                    .with_hint("set floor to 1 for stochastic acceptance"),
            ));
        }

        let step = SchemeStep {
            round,
            max_rounds: self.config.max_rounds,
            previous: previous.threshold,
            floor: self.config.floor,
            records,
        };
        let mut state = self.state;
        let proposed = self.config.scheme.propose(&step, &mut state)?;
        if proposed.is_nan() {
            return Err(AbcError::Scheduler(
                ErrorInfo::new("threshold-nan", "scheme produced a NaN threshold")
                    .with_context("scheme", self.config.scheme.name())
                    .with_context("round", round),
            ));
        }
        let proposed = proposed.max(self.config.floor);
        let threshold = self.check_relaxation(round, previous.threshold, proposed)?;

        self.state = state;
        if let Some(last) = self.history.last_mut() {
            last.acceptance_rate = Some(records.acceptance_rate);
        }
        self.history.push(ThresholdRecord {
            round,
            threshold,
            acceptance_rate: None,
        });
        log::debug!(
            "round {round}: {} threshold {} -> {threshold} (acceptance rate {:.4})",
            self.config.scheme.name(),
            previous.threshold,
            records.acceptance_rate
        );
        Ok(threshold)
    }

    fn check_relaxation(&self, round: usize, previous: f64, proposed: f64) -> Result<f64, AbcError> {
        let tolerance = RELAX_TOLERANCE * previous.abs().max(1.0);
        if proposed <= previous + tolerance {
            return Ok(proposed.min(previous));
        }
        match self.config.relax_policy {
            RelaxPolicy::Error => Err(AbcError::Scheduler(
                ErrorInfo::new("threshold-relaxed", "scheme proposed a larger threshold")
                    .with_context("scheme", self.config.scheme.name())
                    .with_context("round", round)
                    .with_context("previous", previous)
                    .with_context("proposed", proposed)
                    .with_hint("use relax_policy: clamp-and-warn to keep the previous value"),
            )),
            RelaxPolicy::ClampAndWarn => {
                log::warn!(
                    "round {round}: {} proposed {proposed} above previous threshold {previous}, keeping previous",
                    self.config.scheme.name()
                );
                Ok(previous)
            }
        }
    }
}
