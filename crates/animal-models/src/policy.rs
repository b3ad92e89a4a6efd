//! Confidence policy.
//!
//! Decides whether a classification is reliable enough to report. A result
//! is accepted iff its confidence is at or above the configured threshold.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classification::ClassificationResult;

/// Default minimum confidence required to accept a classification.
pub const DEFAULT_THRESHOLD: f64 = 0.60;

/// Error building a [`PolicyConfig`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PolicyConfigError {
    #[error("Threshold must be within [0, 1], got {0}")]
    OutOfRange(f64),

    #[error("Invalid threshold value: {0}")]
    Unparsable(String),
}

/// Immutable policy configuration, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Minimum confidence (inclusive) for an accepted classification
    pub threshold: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl PolicyConfig {
    /// Create a config, validating the threshold.
    pub fn new(threshold: f64) -> Result<Self, PolicyConfigError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(PolicyConfigError::OutOfRange(threshold));
        }
        Ok(Self { threshold })
    }

    /// Create config from the `CONFIDENCE_THRESHOLD` environment variable.
    pub fn from_env() -> Result<Self, PolicyConfigError> {
        match std::env::var("CONFIDENCE_THRESHOLD") {
            Ok(raw) => Self::parse(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Parse a threshold string such as `"0.6"`.
    pub fn parse(raw: &str) -> Result<Self, PolicyConfigError> {
        let threshold: f64 = raw
            .trim()
            .parse()
            .map_err(|_| PolicyConfigError::Unparsable(raw.to_string()))?;
        Self::new(threshold)
    }
}

/// Result of applying the policy to a classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Confidence met the threshold
    Accepted { label: String, confidence: f64 },
    /// Confidence fell below the threshold
    Rejected { confidence: f64, threshold: f64 },
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted { .. })
    }

    /// Confidence the decision was made on.
    pub fn confidence(&self) -> f64 {
        match self {
            Decision::Accepted { confidence, .. } | Decision::Rejected { confidence, .. } => *confidence,
        }
    }
}

/// Threshold-based accept/reject policy.
#[derive(Debug, Clone, Copy)]
pub struct ConfidencePolicy {
    config: PolicyConfig,
}

impl ConfidencePolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Configured threshold.
    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    /// Decide on a classification result.
    pub fn decide(&self, result: &ClassificationResult) -> Decision {
        let confidence = sanitize_confidence(result.confidence);

        if confidence >= self.config.threshold {
            Decision::Accepted {
                label: result.predicted_label.clone(),
                confidence,
            }
        } else {
            Decision::Rejected {
                confidence,
                threshold: self.config.threshold,
            }
        }
    }
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

/// Map a raw upstream confidence into [0, 1]. Non-finite values count as 0.
fn sanitize_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
