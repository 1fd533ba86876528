use abc_core::{AbcError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Oracle solving `cv(n) = target` for the particle count `n`.
///
/// Implementations may return any finite or infinite estimate; callers clamp
/// the result to their own bounds.
pub trait PopulationSizePredictor {
    /// Estimates the particle count reaching `target_cv`, starting from
    /// `current` particles.
    fn predict(
        &self,
        current: usize,
        target_cv: f64,
        cv: &dyn Fn(usize) -> f64,
    ) -> Result<f64, AbcError>;

    /// Name reported in strategy summaries.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Fits `cv(n) = a * n^b` on a few reference sizes and inverts the fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerLawPredictor {
    /// Reference sizes as fractions of the current particle count.
    #[serde(default = "default_reference_fractions")]
    pub reference_fractions: Vec<f64>,
}

fn default_reference_fractions() -> Vec<f64> {
    vec![0.25, 0.5, 0.75, 1.0]
}

impl Default for PowerLawPredictor {
    fn default() -> Self {
        Self {
            reference_fractions: default_reference_fractions(),
        }
    }
}

impl PowerLawPredictor {
    fn reference_points(&self, current: usize, cv: &dyn Fn(usize) -> f64) -> Vec<(f64, f64)> {
        let mut sizes: Vec<usize> = self
            .reference_fractions
            .iter()
            .filter(|fraction| **fraction > 0.0)
            .map(|fraction| ((current as f64 * fraction).round() as usize).max(1))
            .collect();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
            .into_iter()
            .filter_map(|n| {
                let value = cv(n);
                (value.is_finite() && value > 0.0).then(|| ((n as f64).ln(), value.ln()))
            })
            .collect()
    }
}

impl PopulationSizePredictor for PowerLawPredictor {
    fn predict(
        &self,
        current: usize,
        target_cv: f64,
        cv: &dyn Fn(usize) -> f64,
    ) -> Result<f64, AbcError> {
        let reference_points = self.reference_points(current, cv);
        if reference_points.len() < 2 {
            return Err(AbcError::Adaptation(
                ErrorInfo::new(
                    "predictor-degenerate",
                    "fewer than two usable reference points for the power-law fit",
                )
                .with_context("current", current)
                .with_context("usable", reference_points.len()),
            ));
        }

        let count = reference_points.len() as f64;
        let mean_x = reference_points.iter().map(|(x, _)| x).sum::<f64>() / count;
        let mean_y = reference_points.iter().map(|(_, y)| y).sum::<f64>() / count;
        let (cov, var) = reference_points.iter().fold((0.0, 0.0), |(cov, var), (x, y)| {
            (cov + (x - mean_x) * (y - mean_y), var + (x - mean_x).powi(2))
        });
        let slope = cov / var;
        let intercept = mean_y - slope * mean_x;
        if !(slope < 0.0) {
            return Err(AbcError::Adaptation(
                ErrorInfo::new("predictor-diverged", "cv does not decrease with particle count")
                    .with_context("slope", slope),
            ));
        }

        let estimate = ((target_cv.ln() - intercept) / slope).exp();
        if !estimate.is_finite() || estimate <= 0.0 {
            return Err(AbcError::Adaptation(
                ErrorInfo::new("predictor-diverged", "power-law inversion is not finite")
                    .with_context("target_cv", target_cv)
                    .with_context("estimate", estimate),
            ));
        }
        Ok(estimate)
    }

    fn name(&self) -> &str {
        "power-law"
    }
}
