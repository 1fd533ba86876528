use abc_core::Particle;
use serde::{Deserialize, Serialize};

/// Kernels able to report the maximum of their log density.
///
/// Implemented by the external stochastic kernels that score simulations;
/// the stochastic acceptor only needs this single number from them.
pub trait KernelPdfMax {
    /// Largest value the kernel's log density can take.
    fn log_pdf_max(&self) -> f64;
}

/// Source of the normalising log density used by the stochastic acceptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PdfMaxEval {
    /// Analytic maximum taken from the kernel's own density function.
    TakeFromKernel {
        /// Maximum log density reported by the kernel.
        log_pdf_max: f64,
    },
    /// Running maximum of the log densities observed so far.
    TakeMaxFound,
}

impl PdfMaxEval {
    /// Reads the analytic maximum from `kernel`.
    pub fn from_kernel(kernel: &impl KernelPdfMax) -> Self {
        PdfMaxEval::TakeFromKernel {
            log_pdf_max: kernel.log_pdf_max(),
        }
    }

    /// Normalisation known before any particle was observed.
    pub fn initial(&self) -> Option<f64> {
        match self {
            PdfMaxEval::TakeFromKernel { log_pdf_max } => Some(*log_pdf_max),
            PdfMaxEval::TakeMaxFound => None,
        }
    }

    /// Folds newly observed particles into the current normalisation.
    ///
    /// For `TakeMaxFound` the result never decreases. Early estimates may sit
    /// below the true maximum, in which case acceptance probabilities get
    /// clamped to one.
    pub fn updated(&self, current: Option<f64>, particles: &[Particle]) -> Option<f64> {
        match self {
            PdfMaxEval::TakeFromKernel { log_pdf_max } => Some(*log_pdf_max),
            PdfMaxEval::TakeMaxFound => particles
                .iter()
                .map(|particle| particle.distance)
                .filter(|density| density.is_finite())
                .chain(current)
                .fold(None, |acc: Option<f64>, density| {
                    Some(acc.map_or(density, |best| best.max(density)))
                }),
        }
    }
}
