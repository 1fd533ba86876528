#![deny(missing_docs)]
#![doc = "Core data types, structured errors and seeding helpers shared by the ABC-SMC crates."]

pub mod errors;
pub mod rng;
mod types;

pub use errors::{AbcError, ErrorInfo};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{Parameter, Particle, Proposal, SumStat};

/// Builds a [`Parameter`] map from `(name, value)` pairs.
pub fn parameter<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Parameter {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
