use abc_core::derive_substream_seed;

const WORKER_SALT: u64 = 0xA5A5_A5A5_A5A5_A5A5;
const EVALUATION_SALT: u64 = 0x5A5A_5A5A_5A5A_5A5A;

/// Derives the seed shared by everything sampled in one population.
pub fn run_seed(master_seed: u64, run_index: u64) -> u64 {
    derive_substream_seed(master_seed, run_index)
}

/// Derives the seed of a worker's private stream within a population.
pub fn worker_seed(master_seed: u64, run_index: u64, worker: usize) -> u64 {
    derive_substream_seed(run_seed(master_seed, run_index) ^ WORKER_SALT, worker as u64)
}

/// Derives the seed of the stream used for a single evaluation id.
pub fn evaluation_seed(master_seed: u64, run_index: u64, evaluation_id: u64) -> u64 {
    derive_substream_seed(
        run_seed(master_seed, run_index) ^ EVALUATION_SALT,
        evaluation_id,
    )
}
