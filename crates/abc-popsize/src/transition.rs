/// Density estimate of a model's current posterior.
///
/// Only the convergence diagnostic is needed by population strategies.
pub trait Transition {
    /// Mean coefficient of variation of the density estimate when built from
    /// `n_particles` particles.
    fn mean_cv(&self, n_particles: usize) -> f64;
}
