use abc_core::{AbcError, RngHandle};

use crate::base::{Sampler, SamplingOptions};
use crate::config::{RngStreams, SamplerConfig};
use crate::determinism;
use crate::sample::Sample;

/// Sequential sampler evaluating one attempt at a time on the calling thread.
///
/// Produces the canonical ordering that the parallel sampler reconstructs by
/// sorting on evaluation ids.
#[derive(Debug, Clone)]
pub struct SingleCoreSampler {
    config: SamplerConfig,
    run_index: u64,
    nr_evaluations: u64,
}

impl SingleCoreSampler {
    /// Creates a sampler after validating `config`. `n_procs` is ignored.
    pub fn new(config: SamplerConfig) -> Result<Self, AbcError> {
        config.validate()?;
        Ok(Self {
            config,
            run_index: 0,
            nr_evaluations: 0,
        })
    }
}

impl Sampler for SingleCoreSampler {
    fn sample_until_n_accepted(
        &mut self,
        options: &SamplingOptions<'_>,
    ) -> Result<Sample, AbcError> {
        options.validate()?;
        let run_index = self.run_index;
        self.run_index += 1;
        let master_seed = self.config.seed_policy.master_seed;
        let mut worker_rng =
            RngHandle::from_seed(determinism::worker_seed(master_seed, run_index, 0));

        let mut sample = Sample::new(options.sample_options);
        let mut n_accepted = 0;
        let mut n_eval = 0u64;
        while n_accepted < options.n {
            if let Some(limit) = self.config.max_evaluations {
                if n_eval >= limit {
                    return Err(crate::multicore::budget_exhausted(limit, options.n - n_accepted));
                }
            }
            let particle = match self.config.seed_policy.streams {
                RngStreams::PerWorker => options.evaluate(n_eval, &mut worker_rng)?,
                RngStreams::PerEvaluation => {
                    let mut rng = RngHandle::from_seed(determinism::evaluation_seed(
                        master_seed,
                        run_index,
                        n_eval,
                    ));
                    options.evaluate(n_eval, &mut rng)?
                }
            };
            n_eval += 1;
            if particle.accepted {
                n_accepted += 1;
            }
            sample.append(particle);
        }

        self.nr_evaluations = n_eval;
        sample.set_n_evaluations(n_eval);
        Ok(sample)
    }

    fn nr_evaluations(&self) -> u64 {
        self.nr_evaluations
    }
}
