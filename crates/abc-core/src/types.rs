use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named parameter assignment for a single model.
pub type Parameter = BTreeMap<String, f64>;

/// Named summary statistics produced by a simulation.
pub type SumStat = BTreeMap<String, f64>;

/// Candidate drawn by a proposal function: a model index and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Index of the model the parameter belongs to.
    pub m: usize,
    /// Parameter assignment for model `m`.
    pub parameter: Parameter,
}

impl Proposal {
    /// Creates a proposal for model `m`.
    pub fn new(m: usize, parameter: Parameter) -> Self {
        Self { m, parameter }
    }
}

/// One simulation attempt together with its acceptance decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Model index.
    pub m: usize,
    /// Parameter assignment that was simulated.
    pub parameter: Parameter,
    /// Summary statistics of the simulated data.
    pub sum_stat: SumStat,
    /// Distance to the observed data (a log density for stochastic acceptors).
    pub distance: f64,
    /// Whether the acceptor accepted the particle.
    pub accepted: bool,
    /// Importance weight, never negative.
    pub weight: f64,
    /// Evaluation id that produced the particle.
    #[serde(default)]
    pub proposal_id: u64,
}

impl Particle {
    /// Builds a particle from a proposal and its scored simulation outcome.
    pub fn evaluated(
        proposal: Proposal,
        sum_stat: SumStat,
        distance: f64,
        accepted: bool,
        weight: f64,
    ) -> Self {
        Self {
            m: proposal.m,
            parameter: proposal.parameter,
            sum_stat,
            distance,
            accepted,
            weight: weight.max(0.0),
            proposal_id: 0,
        }
    }
}
