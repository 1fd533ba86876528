use abc_core::{AbcError, ErrorInfo, Particle, RngHandle};
use serde::{Deserialize, Serialize};

use crate::pdf_max::PdfMaxEval;

/// Round information an acceptor may consult.
#[derive(Debug, Clone, Copy)]
pub struct AcceptContext<'h> {
    /// Round being produced.
    pub round: usize,
    /// Round whose proposal distribution generated the candidate.
    pub proposal_round: usize,
    /// Thresholds issued so far, indexed by round.
    pub thresholds: &'h [f64],
}

impl<'h> AcceptContext<'h> {
    /// Context for a candidate proposed in the round being produced.
    pub fn current(round: usize, thresholds: &'h [f64]) -> Self {
        Self {
            round,
            proposal_round: round,
            thresholds,
        }
    }

    /// Threshold in force at `round`, falling back to `current` when no
    /// entry was recorded.
    pub fn threshold_at(&self, round: usize, current: f64) -> f64 {
        if round == self.round {
            return current;
        }
        self.thresholds.get(round).copied().unwrap_or(current)
    }
}

/// Acceptance decision for one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceptOutcome {
    /// Whether the particle is accepted.
    pub accepted: bool,
    /// Importance weight correction, zero for rejected particles.
    pub weight: f64,
    /// Acceptance probability after clamping to `[0, 1]`.
    pub probability: f64,
}

impl AcceptOutcome {
    fn rejected(probability: f64) -> Self {
        Self {
            accepted: false,
            weight: 0.0,
            probability,
        }
    }
}

/// Which round's threshold a uniform acceptor compares against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UniformTimePolicy {
    /// Threshold of the round being produced.
    #[default]
    CurrentRound,
    /// Threshold in force when the candidate was proposed.
    ProposalRound,
}

/// Deterministic acceptance on `distance <= threshold`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformAcceptor {
    /// Threshold lookup policy.
    #[serde(default)]
    pub policy: UniformTimePolicy,
}

impl UniformAcceptor {
    /// Accepts with weight one iff `distance` does not exceed the threshold.
    pub fn decide(&self, distance: f64, threshold: f64, context: &AcceptContext<'_>) -> AcceptOutcome {
        let threshold = match self.policy {
            UniformTimePolicy::CurrentRound => threshold,
            UniformTimePolicy::ProposalRound => {
                context.threshold_at(context.proposal_round, threshold)
            }
        };
        if distance <= threshold {
            AcceptOutcome {
                accepted: true,
                weight: 1.0,
                probability: 1.0,
            }
        } else {
            AcceptOutcome::rejected(0.0)
        }
    }
}

/// Probabilistic acceptance on a kernel log density at a temperature.
///
/// The "distance" fed to this acceptor is a log density where larger is
/// better, and the threshold is a positive temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticAcceptor {
    pdf_max: PdfMaxEval,
    pdf_norm: Option<f64>,
}

impl StochasticAcceptor {
    /// Creates an acceptor normalising with `pdf_max`.
    pub fn new(pdf_max: PdfMaxEval) -> Self {
        Self {
            pdf_max,
            pdf_norm: pdf_max.initial(),
        }
    }

    /// Normalisation source.
    pub fn pdf_max(&self) -> PdfMaxEval {
        self.pdf_max
    }

    /// Current normalising log density, if one is known.
    pub fn pdf_norm(&self) -> Option<f64> {
        self.pdf_norm
    }

    /// Folds observed particles into the normalisation.
    pub fn update(&mut self, particles: &[Particle]) {
        let updated = self.pdf_max.updated(self.pdf_norm, particles);
        if updated != self.pdf_norm {
            log::debug!("stochastic acceptor normalisation {:?} -> {:?}", self.pdf_norm, updated);
        }
        self.pdf_norm = updated;
    }

    /// Draws the acceptance decision for `log_density` at `temperature`.
    pub fn decide(
        &self,
        log_density: f64,
        temperature: f64,
        rng: &mut RngHandle,
    ) -> Result<AcceptOutcome, AbcError> {
        if !(temperature > 0.0) {
            return Err(AbcError::Config(
                ErrorInfo::new("invalid-temperature", "temperature must be positive")
                    .with_context("temperature", temperature),
            ));
        }
        let pdf_norm = self.pdf_norm.ok_or_else(|| {
            AbcError::Config(
                ErrorInfo::new(
                    "acceptor-uninitialized",
                    "no normalising density observed yet",
                )
                .with_hint("call Acceptor::update with a calibration sample first"),
            )
        })?;
        if log_density.is_nan() || log_density == f64::NEG_INFINITY {
            return Ok(AcceptOutcome::rejected(0.0));
        }

        let unclamped = ((log_density - pdf_norm) / temperature).exp();
        if !unclamped.is_finite() {
            return Err(AbcError::Simulation(
                ErrorInfo::new(
                    "non-finite-density",
                    "density ratio overflows the importance weight",
                )
                .with_context("log_density", log_density)
                .with_context("pdf_norm", pdf_norm)
                .with_context("temperature", temperature),
            ));
        }
        let probability = unclamped.min(1.0);
        if rng.uniform() < probability {
            Ok(AcceptOutcome {
                accepted: true,
                weight: unclamped / probability,
                probability,
            })
        } else {
            Ok(AcceptOutcome::rejected(probability))
        }
    }
}

/// Closed set of acceptance strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Acceptor {
    /// Hard threshold on distances.
    Uniform(UniformAcceptor),
    /// Temperature-scaled acceptance on log densities.
    Stochastic(StochasticAcceptor),
}

impl Default for Acceptor {
    fn default() -> Self {
        Acceptor::Uniform(UniformAcceptor::default())
    }
}

impl Acceptor {
    /// Decides acceptance for one simulation.
    ///
    /// `threshold` is the distance threshold or the temperature of the round
    /// being produced. Only the stochastic variant draws from `rng`.
    pub fn decide(
        &self,
        distance: f64,
        threshold: f64,
        context: &AcceptContext<'_>,
        rng: &mut RngHandle,
    ) -> Result<AcceptOutcome, AbcError> {
        match self {
            Acceptor::Uniform(acceptor) => Ok(acceptor.decide(distance, threshold, context)),
            Acceptor::Stochastic(acceptor) => acceptor.decide(distance, threshold, rng),
        }
    }

    /// Between-round hook fed with every particle of the finished round.
    pub fn update(&mut self, particles: &[Particle]) {
        if let Acceptor::Stochastic(acceptor) = self {
            acceptor.update(particles);
        }
    }

    /// Normalising log density handed to the threshold scheduler.
    ///
    /// `None` for the uniform acceptor, which keeps schemes in distance mode.
    pub fn pdf_norm(&self) -> Option<f64> {
        match self {
            Acceptor::Uniform(_) => None,
            Acceptor::Stochastic(acceptor) => acceptor.pdf_norm(),
        }
    }
}
