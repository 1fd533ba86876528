use abc_core::{AbcError, ErrorInfo, Particle};
use serde::{Deserialize, Serialize};

const BISECTION_STEPS: usize = 80;

/// Observations from a finished round that drive the next threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundRecords {
    /// Distances (or log densities) of every recorded simulation.
    pub distances: Vec<f64>,
    /// Importance weights aligned with `distances`, zero for rejections.
    pub weights: Vec<f64>,
    /// Acceptance flags aligned with `distances`.
    pub accepted: Vec<bool>,
    /// Accepted over attempted simulations in the round.
    pub acceptance_rate: f64,
    /// Normalising log density; `Some` switches schemes to temperature mode.
    #[serde(default)]
    pub pdf_norm: Option<f64>,
}

impl RoundRecords {
    /// Builds records from a round's particles.
    pub fn from_particles(particles: &[Particle], acceptance_rate: f64, pdf_norm: Option<f64>) -> Self {
        Self {
            distances: particles.iter().map(|p| p.distance).collect(),
            weights: particles.iter().map(|p| p.weight).collect(),
            accepted: particles.iter().map(|p| p.accepted).collect(),
            acceptance_rate,
            pdf_norm,
        }
    }

    /// Whether schemes should treat thresholds as temperatures.
    pub fn is_temperature_mode(&self) -> bool {
        self.pdf_norm.is_some()
    }

    fn accepted_weighted(&self) -> Vec<(f64, f64)> {
        self.distances
            .iter()
            .zip(&self.weights)
            .zip(&self.accepted)
            .filter(|(_, accepted)| **accepted)
            .map(|((distance, weight), _)| (*distance, *weight))
            .filter(|(distance, weight)| !distance.is_nan() && *weight > 0.0)
            .collect()
    }

    fn all_unweighted(&self) -> Vec<(f64, f64)> {
        self.distances
            .iter()
            .filter(|distance| !distance.is_nan())
            .map(|distance| (*distance, 1.0))
            .collect()
    }
}

/// Closed set of threshold schedules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ThresholdScheme {
    /// Weighted quantile of the accepted distances times a multiplier.
    Quantile {
        /// Quantile level in `(0, 1]`.
        #[serde(default = "default_alpha")]
        alpha: f64,
        /// Factor applied to the quantile.
        #[serde(default = "default_multiplier")]
        multiplier: f64,
    },
    /// Polynomial decay toward the floor, reaching it in the final round.
    PolynomialDecay {
        /// Decay exponent.
        #[serde(default = "default_exponent")]
        exponent: f64,
    },
    /// Geometric decay toward the floor.
    ExponentialDecay {
        /// Fraction of the remaining distance to the floor kept per round.
        #[serde(default = "default_alpha")]
        alpha: f64,
    },
    /// Threshold that targets a given acceptance rate.
    AcceptanceRate {
        /// Desired fraction of accepted simulations.
        #[serde(default = "default_target_rate")]
        target_rate: f64,
    },
    /// Power-posterior temperature ladder.
    FrielPettitt,
    /// Step-size controlled decay that slows when acceptance collapses.
    Daly {
        /// Factor applied to the step when the rate is too low.
        #[serde(default = "default_alpha")]
        alpha: f64,
        /// Acceptance rate below which the step shrinks.
        #[serde(default = "default_min_rate")]
        min_rate: f64,
    },
    /// Temperature keeping a target relative effective sample size.
    Ess {
        /// Target relative ESS in `(0, 1]`.
        #[serde(default = "default_target_relative_ess")]
        target_relative_ess: f64,
    },
}

fn default_alpha() -> f64 {
    0.5
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_exponent() -> f64 {
    3.0
}

fn default_target_rate() -> f64 {
    0.3
}

fn default_min_rate() -> f64 {
    1e-4
}

fn default_target_relative_ess() -> f64 {
    0.8
}

impl Default for ThresholdScheme {
    fn default() -> Self {
        ThresholdScheme::Quantile {
            alpha: default_alpha(),
            multiplier: default_multiplier(),
        }
    }
}

/// Inputs shared by all schemes for one step.
#[derive(Debug, Clone, Copy)]
pub struct SchemeStep<'r> {
    /// Round whose threshold is being computed.
    pub round: usize,
    /// Last round, if the run length is known.
    pub max_rounds: Option<usize>,
    /// Threshold of the previous round.
    pub previous: f64,
    /// Lower bound of the schedule.
    pub floor: f64,
    /// Observations of the previous round.
    pub records: &'r RoundRecords,
}

impl SchemeStep<'_> {
    fn is_final_round(&self) -> bool {
        self.max_rounds.map_or(false, |max| self.round >= max)
    }
}

/// Mutable state a scheme carries between rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemeState {
    /// Current Daly step size.
    pub daly_step: Option<f64>,
}

impl ThresholdScheme {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            ThresholdScheme::Quantile { .. } => "quantile",
            ThresholdScheme::PolynomialDecay { .. } => "polynomial-decay",
            ThresholdScheme::ExponentialDecay { .. } => "exponential-decay",
            ThresholdScheme::AcceptanceRate { .. } => "acceptance-rate",
            ThresholdScheme::FrielPettitt => "friel-pettitt",
            ThresholdScheme::Daly { .. } => "daly",
            ThresholdScheme::Ess { .. } => "ess",
        }
    }

    /// Whether the scheme only makes sense for temperatures.
    pub fn requires_temperature(&self) -> bool {
        matches!(self, ThresholdScheme::Ess { .. })
    }

    /// Whether the scheme needs the run length.
    pub fn requires_max_rounds(&self) -> bool {
        matches!(
            self,
            ThresholdScheme::PolynomialDecay { .. } | ThresholdScheme::FrielPettitt
        )
    }

    /// Whether the scheme decays from a finite starting value.
    pub fn requires_finite_initial(&self) -> bool {
        !matches!(
            self,
            ThresholdScheme::Quantile { .. } | ThresholdScheme::AcceptanceRate { .. }
        )
    }

    /// Checks the scheme's own parameters.
    pub fn validate(&self) -> Result<(), AbcError> {
        let in_unit = |name: &str, value: f64, closed_low: bool| {
            let ok = if closed_low {
                (0.0..=1.0).contains(&value)
            } else {
                value > 0.0 && value <= 1.0
            };
            if ok {
                Ok(())
            } else {
                Err(AbcError::Config(
                    ErrorInfo::new("invalid-scheme-parameter", format!("{name} out of range"))
                        .with_context("scheme", self.name())
                        .with_context(name, value),
                ))
            }
        };
        match *self {
            ThresholdScheme::Quantile { alpha, multiplier } => {
                in_unit("alpha", alpha, false)?;
                if !(multiplier > 0.0 && multiplier <= 1.0) {
                    return Err(AbcError::Config(
                        ErrorInfo::new("invalid-scheme-parameter", "multiplier out of range")
                            .with_context("multiplier", multiplier)
                            .with_hint("multipliers above one relax the threshold"),
                    ));
                }
                Ok(())
            }
            ThresholdScheme::PolynomialDecay { exponent } => {
                if exponent > 0.0 && exponent.is_finite() {
                    Ok(())
                } else {
                    Err(AbcError::Config(
                        ErrorInfo::new("invalid-scheme-parameter", "exponent must be positive")
                            .with_context("exponent", exponent),
                    ))
                }
            }
            ThresholdScheme::ExponentialDecay { alpha } => in_unit("alpha", alpha, true),
            ThresholdScheme::AcceptanceRate { target_rate } => {
                in_unit("target_rate", target_rate, false)
            }
            ThresholdScheme::FrielPettitt => Ok(()),
            ThresholdScheme::Daly { alpha, min_rate } => {
                in_unit("alpha", alpha, false)?;
                in_unit("min_rate", min_rate, true)
            }
            ThresholdScheme::Ess {
                target_relative_ess,
            } => in_unit("target_relative_ess", target_relative_ess, false),
        }
    }

    /// Proposes the threshold for `step.round`.
    ///
    /// The value is not yet checked against the previous threshold.
    pub fn propose(&self, step: &SchemeStep<'_>, state: &mut SchemeState) -> Result<f64, AbcError> {
        let records = step.records;
        match *self {
            ThresholdScheme::Quantile { alpha, multiplier } => {
                match weighted_quantile(&records.accepted_weighted(), alpha) {
                    Some(quantile) => Ok(quantile * multiplier),
                    None => {
                        log::warn!(
                            "round {} has no accepted distances, keeping threshold {}",
                            step.round,
                            step.previous
                        );
                        Ok(step.previous)
                    }
                }
            }
            ThresholdScheme::PolynomialDecay { exponent } => {
                let max_rounds = require_max_rounds(self, step)?;
                if step.is_final_round() {
                    return Ok(step.floor);
                }
                let to_go = (max_rounds - step.round + 1) as f64;
                let factor = ((to_go - 1.0) / to_go).powf(exponent);
                Ok(step.floor + (step.previous - step.floor) * factor)
            }
            ThresholdScheme::ExponentialDecay { alpha } => {
                if step.is_final_round() {
                    return Ok(step.floor);
                }
                Ok(step.floor + (step.previous - step.floor) * alpha)
            }
            ThresholdScheme::AcceptanceRate { target_rate } => match records.pdf_norm {
                None => match weighted_quantile(&records.all_unweighted(), target_rate) {
                    Some(quantile) => Ok(quantile.min(step.previous)),
                    None => Ok(step.previous),
                },
                Some(pdf_norm) => Ok(temperature_for_rate(step, pdf_norm, target_rate)),
            },
            ThresholdScheme::FrielPettitt => {
                let max_rounds = require_max_rounds(self, step)? as f64;
                let beta = ((step.round + 1) as f64 / (max_rounds + 1.0)).min(1.0);
                Ok((step.floor / (beta * beta)).min(step.previous))
            }
            ThresholdScheme::Daly { alpha, min_rate } => {
                let span = step.previous - step.floor;
                let mut k = state.daly_step.unwrap_or(alpha * span);
                if records.acceptance_rate < min_rate {
                    k *= alpha;
                }
                state.daly_step = Some(k);
                let k = k.min(alpha * span);
                Ok((step.previous - k).max(step.floor))
            }
            ThresholdScheme::Ess {
                target_relative_ess,
            } => {
                let pdf_norm = records.pdf_norm.ok_or_else(|| {
                    AbcError::Scheduler(
                        ErrorInfo::new(
                            "scheme-unsupported",
                            "ess scheme needs log densities from a stochastic acceptor",
                        )
                        .with_context("round", step.round),
                    )
                })?;
                Ok(temperature_for_ess(step, pdf_norm, target_relative_ess))
            }
        }
    }
}

fn require_max_rounds(scheme: &ThresholdScheme, step: &SchemeStep<'_>) -> Result<usize, AbcError> {
    step.max_rounds.ok_or_else(|| {
        AbcError::Scheduler(
            ErrorInfo::new("scheme-unsupported", "scheme needs the number of rounds")
                .with_context("scheme", scheme.name())
                .with_hint("set max_rounds in the scheduler config"),
        )
    })
}

/// Smallest value whose cumulative normalised weight reaches `alpha`.
///
/// Returns `None` when no positive weight is present.
pub fn weighted_quantile(points: &[(f64, f64)], alpha: f64) -> Option<f64> {
    let total: f64 = points.iter().map(|(_, weight)| weight).sum();
    if !(total > 0.0) {
        return None;
    }
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    let target = alpha.clamp(0.0, 1.0) * total;
    let mut cumulative = 0.0;
    for (value, weight) in &sorted {
        cumulative += weight;
        if cumulative >= target {
            return Some(*value);
        }
    }
    sorted.last().map(|(value, _)| *value)
}

/// Bisects in `[low, high]` for the point where `f` crosses `target`,
/// assuming `f` is non-decreasing.
fn bisect(low: f64, high: f64, target: f64, f: impl Fn(f64) -> f64) -> f64 {
    let (mut low, mut high) = (low, high);
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (low + high);
        if f(mid) < target {
            low = mid;
        } else {
            high = mid;
        }
    }
    high
}

fn expected_acceptance(densities: &[f64], pdf_norm: f64, temperature: f64) -> f64 {
    if densities.is_empty() {
        return 0.0;
    }
    let sum: f64 = densities
        .iter()
        .map(|density| ((density - pdf_norm) / temperature).exp().min(1.0))
        .sum();
    sum / densities.len() as f64
}

fn temperature_for_rate(step: &SchemeStep<'_>, pdf_norm: f64, target_rate: f64) -> f64 {
    let densities: Vec<f64> = step
        .records
        .distances
        .iter()
        .copied()
        .filter(|density| !density.is_nan())
        .collect();
    let rate = |temperature: f64| expected_acceptance(&densities, pdf_norm, temperature);
    if rate(step.floor) >= target_rate {
        return step.floor;
    }
    if rate(step.previous) <= target_rate {
        return step.previous;
    }
    bisect(step.floor, step.previous, target_rate, rate)
}

fn relative_ess(points: &[(f64, f64)], pdf_norm: f64, previous: f64, temperature: f64) -> f64 {
    let exponents: Vec<f64> = points
        .iter()
        .map(|(density, weight)| {
            weight.ln() + (density - pdf_norm) * (1.0 / temperature - 1.0 / previous)
        })
        .collect();
    let max = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return 0.0;
    }
    let (sum, sum_sq) = exponents.iter().fold((0.0, 0.0), |(sum, sum_sq), exponent| {
        let w = (exponent - max).exp();
        (sum + w, sum_sq + w * w)
    });
    sum * sum / (points.len() as f64 * sum_sq)
}

fn temperature_for_ess(step: &SchemeStep<'_>, pdf_norm: f64, target: f64) -> f64 {
    let points: Vec<(f64, f64)> = step
        .records
        .accepted_weighted()
        .into_iter()
        .filter(|(density, _)| density.is_finite())
        .collect();
    if points.is_empty() || !step.previous.is_finite() {
        return step.previous;
    }
    let ess = |temperature: f64| relative_ess(&points, pdf_norm, step.previous, temperature);
    if ess(step.floor) >= target {
        return step.floor;
    }
    bisect(step.floor, step.previous, target, ess)
}
