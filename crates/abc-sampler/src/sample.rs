use std::collections::BTreeMap;
use std::ops::AddAssign;

use abc_core::Particle;
use serde::{Deserialize, Serialize};

/// Options controlling what a [`Sample`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleOptions {
    /// Keep rejected particles. When false they are only counted.
    #[serde(default = "default_record_rejected")]
    pub record_rejected: bool,
}

fn default_record_rejected() -> bool {
    true
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            record_rejected: default_record_rejected(),
        }
    }
}

/// Ordered accumulator of simulation attempts.
///
/// Particles are kept in arrival order. A sample is owned by exactly one
/// worker while it is being filled and is handed to the coordinator as a
/// whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    options: SampleOptions,
    particles: Vec<Particle>,
    n_evaluations: u64,
}

impl Sample {
    /// Creates an empty sample.
    pub fn new(options: SampleOptions) -> Self {
        Self {
            options,
            particles: Vec::new(),
            n_evaluations: 0,
        }
    }

    /// Appends one simulation attempt.
    pub fn append(&mut self, particle: Particle) {
        self.n_evaluations += 1;
        if particle.accepted || self.options.record_rejected {
            self.particles.push(particle);
        }
    }

    /// Concatenates `other` after the particles of `self`.
    pub fn merge(&mut self, other: Sample) {
        self.n_evaluations += other.n_evaluations;
        self.particles.extend(other.particles);
    }

    /// Options the sample was created with.
    pub fn options(&self) -> SampleOptions {
        self.options
    }

    /// All recorded particles in arrival order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Consumes the sample and returns its particles.
    pub fn into_particles(self) -> Vec<Particle> {
        self.particles
    }

    /// Accepted particles in arrival order.
    pub fn accepted_particles(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.particles.iter().filter(|particle| particle.accepted)
    }

    /// Recorded rejected particles in arrival order.
    pub fn rejected_particles(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.particles.iter().filter(|particle| !particle.accepted)
    }

    /// Number of accepted particles.
    pub fn n_accepted(&self) -> usize {
        self.accepted_particles().count()
    }

    /// Number of simulation attempts represented by the sample.
    pub fn n_evaluations(&self) -> u64 {
        self.n_evaluations
    }

    pub(crate) fn set_n_evaluations(&mut self, n_evaluations: u64) {
        self.n_evaluations = n_evaluations;
    }

    /// Fraction of attempts that were accepted.
    pub fn acceptance_rate(&self) -> f64 {
        if self.n_evaluations == 0 {
            0.0
        } else {
            self.n_accepted() as f64 / self.n_evaluations as f64
        }
    }

    /// Normalised accepted weight per model index.
    ///
    /// Models without accepted particles are absent from the map.
    pub fn model_probabilities(&self) -> BTreeMap<usize, f64> {
        let mut totals = BTreeMap::<usize, f64>::new();
        for particle in self.accepted_particles() {
            *totals.entry(particle.m).or_insert(0.0) += particle.weight;
        }
        let sum: f64 = totals.values().sum();
        if sum > 0.0 {
            for value in totals.values_mut() {
                *value /= sum;
            }
        }
        totals
    }
}

impl AddAssign for Sample {
    fn add_assign(&mut self, other: Sample) {
        self.merge(other);
    }
}
