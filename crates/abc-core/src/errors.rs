//! Structured error types shared across the ABC-SMC crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`AbcError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (worker indices, thresholds, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the sampling engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum AbcError {
    /// Malformed configuration detected before any work was started.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// A worker terminated abnormally or could not be spawned.
    #[error("worker error: {0}")]
    Worker(ErrorInfo),
    /// Fatal condition raised while proposing or simulating a particle.
    #[error("simulation error: {0}")]
    Simulation(ErrorInfo),
    /// A threshold scheme produced a value that would relax the threshold.
    #[error("scheduler error: {0}")]
    Scheduler(ErrorInfo),
    /// Population size prediction failed to produce a usable estimate.
    #[error("adaptation error: {0}")]
    Adaptation(ErrorInfo),
    /// Serialization and config-file errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl AbcError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            AbcError::Config(info)
            | AbcError::Worker(info)
            | AbcError::Simulation(info)
            | AbcError::Scheduler(info)
            | AbcError::Adaptation(info)
            | AbcError::Serde(info) => info,
        }
    }

    /// Returns the stable error code of the payload.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Shorthand for a configuration error.
    pub fn config(code: &str, message: impl Into<String>) -> Self {
        AbcError::Config(ErrorInfo::new(code, message))
    }

    /// Shorthand for a fatal simulation error raised from user closures.
    pub fn simulation(code: &str, message: impl Into<String>) -> Self {
        AbcError::Simulation(ErrorInfo::new(code, message))
    }
}
