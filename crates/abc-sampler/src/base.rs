use abc_core::{AbcError, ErrorInfo, Particle, Proposal, RngHandle};

use crate::sample::{Sample, SampleOptions};

/// Per-attempt context threaded through the proposal and simulation closures.
pub struct Evaluation<'r> {
    /// Globally unique evaluation id claimed for this attempt.
    pub id: u64,
    /// Random stream owned by the evaluating worker.
    pub rng: &'r mut RngHandle,
}

/// Draws one candidate from the prior or transition kernel.
pub type SampleOneFn<'a> =
    dyn Fn(&mut Evaluation<'_>) -> Result<Proposal, AbcError> + Send + Sync + 'a;

/// Simulates a candidate, scores it and resolves acceptance.
pub type SimulateEvalOneFn<'a> =
    dyn Fn(Proposal, &mut Evaluation<'_>) -> Result<Particle, AbcError> + Send + Sync + 'a;

/// Frozen description of one population to sample.
///
/// The closures are shared read-only by every worker. Returning `Err` from
/// either closure is fatal for the whole population; ordinary simulation
/// variability must be expressed as a rejected particle instead.
pub struct SamplingOptions<'a> {
    /// Number of accepted particles required.
    pub n: usize,
    /// What the resulting sample keeps.
    pub sample_options: SampleOptions,
    sample_one: Box<SampleOneFn<'a>>,
    simulate_eval_one: Box<SimulateEvalOneFn<'a>>,
}

impl<'a> SamplingOptions<'a> {
    /// Bundles the proposal and simulation closures for a population of `n`.
    pub fn new<P, S>(n: usize, sample_one: P, simulate_eval_one: S) -> Self
    where
        P: Fn(&mut Evaluation<'_>) -> Result<Proposal, AbcError> + Send + Sync + 'a,
        S: Fn(Proposal, &mut Evaluation<'_>) -> Result<Particle, AbcError> + Send + Sync + 'a,
    {
        Self {
            n,
            sample_options: SampleOptions::default(),
            sample_one: Box::new(sample_one),
            simulate_eval_one: Box::new(simulate_eval_one),
        }
    }

    /// Replaces the sample options.
    pub fn with_sample_options(mut self, sample_options: SampleOptions) -> Self {
        self.sample_options = sample_options;
        self
    }

    /// Rejects populations that can never be filled.
    pub fn validate(&self) -> Result<(), AbcError> {
        if self.n == 0 {
            return Err(AbcError::Config(
                ErrorInfo::new("zero-particles", "population size must be positive")
                    .with_context("n", self.n),
            ));
        }
        Ok(())
    }

    /// Runs one proposal and simulation and stamps the evaluation id.
    pub fn evaluate(&self, id: u64, rng: &mut RngHandle) -> Result<Particle, AbcError> {
        let mut evaluation = Evaluation { id, rng };
        let proposal = (self.sample_one)(&mut evaluation)?;
        let mut particle = (self.simulate_eval_one)(proposal, &mut evaluation)?;
        particle.proposal_id = id;
        Ok(particle)
    }
}

/// Strategy that fills one population of accepted particles.
pub trait Sampler {
    /// Samples until `options.n` particles are accepted.
    ///
    /// Returns a sample holding exactly `options.n` accepted particles plus
    /// the rejected attempts that preceded them, or a single fatal error.
    fn sample_until_n_accepted(&mut self, options: &SamplingOptions<'_>)
        -> Result<Sample, AbcError>;

    /// Simulation attempts performed by the last call.
    fn nr_evaluations(&self) -> u64;
}
