#![deny(missing_docs)]

//! Evaluation-parallel population sampler for ABC-SMC.

/// Sampling options, per-attempt context and the `Sampler` trait.
pub mod base;
/// YAML configuration schema and defaults.
pub mod config;
/// Atomic evaluation-id and quota counters shared by workers.
pub mod counters;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Worker messages and liveness checks for the coordinator.
pub mod health;
/// Multi-worker evaluation-parallel sampler.
pub mod multicore;
/// Sample accumulator.
pub mod sample;
/// Sequential reference sampler.
pub mod single_core;

pub use base::{Evaluation, Sampler, SamplingOptions};
pub use config::{nr_cores_available, RngStreams, SamplerConfig, SeedPolicy};
pub use counters::SharedCounters;
pub use multicore::MulticoreEvalParallelSampler;
pub use sample::{Sample, SampleOptions};
pub use single_core::SingleCoreSampler;
