#![deny(missing_docs)]

//! Acceptance decisions and threshold schedules for ABC-SMC populations.

/// Uniform and stochastic acceptors.
pub mod acceptor;
/// Normalising densities for the stochastic acceptor.
pub mod pdf_max;
/// Threshold scheduler and its configuration.
pub mod scheduler;
/// Threshold schemes and round records.
pub mod scheme;

pub use acceptor::{AcceptContext, AcceptOutcome, Acceptor, StochasticAcceptor, UniformAcceptor, UniformTimePolicy};
pub use pdf_max::{KernelPdfMax, PdfMaxEval};
pub use scheduler::{RelaxPolicy, SchedulerConfig, ThresholdRecord, ThresholdScheduler};
pub use scheme::{weighted_quantile, RoundRecords, SchemeState, SchemeStep, ThresholdScheme};
