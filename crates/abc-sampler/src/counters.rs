use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// The only mutable state shared between workers of one population.
///
/// Evaluation ids are handed out by a post-increment and are never reused.
/// The quota counts the accepted particles still missing and is the signal
/// every worker polls to decide whether to keep going.
#[derive(Debug)]
pub struct SharedCounters {
    n_eval: AtomicU64,
    n_particles: AtomicUsize,
}

impl SharedCounters {
    /// Creates counters for a population of `quota` accepted particles.
    pub fn new(quota: usize) -> Self {
        Self {
            n_eval: AtomicU64::new(0),
            n_particles: AtomicUsize::new(quota),
        }
    }

    /// Claims the next evaluation id.
    pub fn claim_evaluation(&self) -> u64 {
        self.n_eval.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of evaluation ids claimed so far.
    pub fn evaluations(&self) -> u64 {
        self.n_eval.load(Ordering::SeqCst)
    }

    /// Accepted particles still required.
    pub fn remaining(&self) -> usize {
        self.n_particles.load(Ordering::SeqCst)
    }

    /// Whether workers should keep sampling.
    pub fn is_open(&self) -> bool {
        self.remaining() > 0
    }

    /// Decrements the quota for an accepted particle.
    ///
    /// Saturates at zero. Returns `false` when the quota was already
    /// exhausted; the caller still reports its particle and the coordinator
    /// drops the surplus after ordering by evaluation id.
    pub fn record_acceptance(&self) -> bool {
        self.n_particles
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |quota| {
                quota.checked_sub(1)
            })
            .is_ok()
    }

    /// Closes the quota so that every worker stops after its current attempt.
    pub fn cancel(&self) {
        self.n_particles.store(0, Ordering::SeqCst);
    }
}
