use std::thread;
use std::time::Duration;

use abc_core::{AbcError, ErrorInfo, RngHandle};
use crossbeam_channel::{Receiver, Sender};

use crate::base::{Sampler, SamplingOptions};
use crate::config::{RngStreams, SamplerConfig};
use crate::counters::SharedCounters;
use crate::determinism;
use crate::health::{self, WorkerHandle, WorkerMessage};
use crate::sample::Sample;

/// Evaluation-parallel sampler running a fixed pool of worker threads.
///
/// Workers race to fill the population: every attempt claims a global
/// evaluation id, and every accepted attempt is shipped to the coordinator
/// together with the rejected attempts the worker made before it. The
/// coordinator keeps the `n` batches with the smallest ids, which removes the
/// bias toward workers that happen to draw cheap-to-reject parameters.
#[derive(Debug, Clone)]
pub struct MulticoreEvalParallelSampler {
    config: SamplerConfig,
    run_index: u64,
    nr_evaluations: u64,
}

impl MulticoreEvalParallelSampler {
    /// Creates a sampler after validating `config`.
    pub fn new(config: SamplerConfig) -> Result<Self, AbcError> {
        config.validate()?;
        Ok(Self {
            config,
            run_index: 0,
            nr_evaluations: 0,
        })
    }

    /// Number of workers spawned per population.
    pub fn n_procs(&self) -> usize {
        self.config.resolved_n_procs()
    }

    /// Configuration in use.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }
}

impl Sampler for MulticoreEvalParallelSampler {
    fn sample_until_n_accepted(
        &mut self,
        options: &SamplingOptions<'_>,
    ) -> Result<Sample, AbcError> {
        options.validate()?;
        let n_procs = self.n_procs();
        let run_index = self.run_index;
        self.run_index += 1;

        let counters = SharedCounters::new(options.n);
        let poll = Duration::from_millis(self.config.health_poll_ms);
        let config = &self.config;

        let mut id_results = thread::scope(|scope| {
            let (sender, receiver) = crossbeam_channel::unbounded();
            let mut workers = Vec::with_capacity(n_procs);
            for index in 0..n_procs {
                let worker_sender = sender.clone();
                let counters = &counters;
                let spawned = thread::Builder::new()
                    .name(format!("abc-worker-{index}"))
                    .spawn_scoped(scope, move || {
                        work(index, run_index, config, options, counters, worker_sender)
                    });
                match spawned {
                    Ok(handle) => workers.push(WorkerHandle::new(index, handle)),
                    Err(err) => {
                        counters.cancel();
                        join_all(&mut workers)?;
                        return Err(AbcError::Worker(
                            ErrorInfo::new("worker-spawn", err.to_string())
                                .with_context("worker", index),
                        ));
                    }
                }
            }
            drop(sender);

            let collected = collect(&mut workers, &receiver, poll);
            if collected.is_err() {
                counters.cancel();
            }
            let joined = join_all(&mut workers);
            match (collected, joined) {
                (Ok(results), Ok(())) => Ok(results),
                (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
                (Err(err), Err(join_err)) => {
                    if err.code() == "worker-died" {
                        Err(join_err)
                    } else {
                        Err(err)
                    }
                }
            }
        })?;

        self.nr_evaluations = match self.config.max_evaluations {
            Some(limit) => counters.evaluations().min(limit),
            None => counters.evaluations(),
        };

        // avoid bias toward short running evaluations
        id_results.sort_by_key(|(particle_id, _)| *particle_id);
        let surplus = id_results.len().saturating_sub(options.n);
        id_results.truncate(options.n);
        if id_results.len() < options.n {
            if let Some(limit) = self.config.max_evaluations {
                return Err(budget_exhausted(limit, options.n - id_results.len()));
            }
            return Err(AbcError::Worker(
                ErrorInfo::new(
                    "insufficient-results",
                    "workers finished before the population was filled",
                )
                .with_context("expected", options.n)
                .with_context("received", id_results.len()),
            ));
        }

        let mut sample = Sample::new(options.sample_options);
        for (_, batch) in id_results {
            sample += batch;
        }
        sample.set_n_evaluations(self.nr_evaluations);

        log::debug!(
            "population of {} filled by {} workers after {} evaluations ({} surplus acceptances dropped)",
            options.n,
            n_procs,
            self.nr_evaluations,
            surplus
        );
        Ok(sample)
    }

    fn nr_evaluations(&self) -> u64 {
        self.nr_evaluations
    }
}

fn work(
    index: usize,
    run_index: u64,
    config: &SamplerConfig,
    options: &SamplingOptions<'_>,
    counters: &SharedCounters,
    sender: Sender<WorkerMessage>,
) {
    let master_seed = config.seed_policy.master_seed;
    let mut worker_rng =
        RngHandle::from_seed(determinism::worker_seed(master_seed, run_index, index));
    let mut sample = Sample::new(options.sample_options);

    while counters.is_open() {
        let particle_id = counters.claim_evaluation();
        if let Some(limit) = config.max_evaluations {
            // lower ids may still be in flight and fill the quota
            if particle_id >= limit {
                break;
            }
        }

        let evaluated = match config.seed_policy.streams {
            RngStreams::PerWorker => options.evaluate(particle_id, &mut worker_rng),
            RngStreams::PerEvaluation => {
                let mut rng = RngHandle::from_seed(determinism::evaluation_seed(
                    master_seed,
                    run_index,
                    particle_id,
                ));
                options.evaluate(particle_id, &mut rng)
            }
        };
        let particle = match evaluated {
            Ok(particle) => particle,
            Err(error) => {
                counters.cancel();
                let _ = sender.send(WorkerMessage::Failed {
                    worker: index,
                    error,
                });
                return;
            }
        };

        let accepted = particle.accepted;
        sample.append(particle);
        if accepted {
            counters.record_acceptance();
            let batch = std::mem::replace(&mut sample, Sample::new(options.sample_options));
            if sender
                .send(WorkerMessage::Batch {
                    particle_id,
                    sample: batch,
                })
                .is_err()
            {
                return;
            }
        }
    }

    let _ = sender.send(WorkerMessage::Done { worker: index });
}

fn collect(
    workers: &mut [WorkerHandle<'_>],
    receiver: &Receiver<WorkerMessage>,
    poll: Duration,
) -> Result<Vec<(u64, Sample)>, AbcError> {
    let mut id_results = Vec::new();
    let mut n_done = 0;
    // the channel is drained completely so no worker blocks on a send
    while n_done < workers.len() {
        match health::next_if_worker_healthy(workers, receiver, poll)? {
            WorkerMessage::Batch {
                particle_id,
                sample,
            } => id_results.push((particle_id, sample)),
            WorkerMessage::Done { worker } => {
                if let Some(handle) = workers.get_mut(worker) {
                    handle.mark_done();
                }
                n_done += 1;
            }
            WorkerMessage::Failed { worker, error } => {
                if let Some(handle) = workers.get_mut(worker) {
                    handle.mark_done();
                }
                log::warn!("worker {worker} aborted the population: {error}");
                return Err(error);
            }
        }
    }
    Ok(id_results)
}

fn join_all(workers: &mut [WorkerHandle<'_>]) -> Result<(), AbcError> {
    let mut first_error = None;
    for worker in workers.iter_mut() {
        if let Err(err) = worker.join() {
            log::warn!("{err}");
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

pub(crate) fn budget_exhausted(limit: u64, remaining: usize) -> AbcError {
    AbcError::Simulation(
        ErrorInfo::new(
            "evaluation-budget-exhausted",
            "population not filled within the evaluation budget",
        )
        .with_context("max_evaluations", limit)
        .with_context("remaining", remaining)
        .with_hint("the acceptance threshold may be unreachable"),
    )
}
