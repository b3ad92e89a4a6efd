//! Shared data models for the animal classifier.
//!
//! This crate provides:
//! - Classification results and the fixed animal class set
//! - The confidence policy that accepts or rejects a classification
//! - Rendering of decisions and failures into display markup

pub mod classification;
pub mod policy;
pub mod response;

// Re-export common types
pub use classification::{AnimalClass, ClassificationResult, UNKNOWN_LABEL};
pub use policy::{ConfidencePolicy, Decision, PolicyConfig, PolicyConfigError, DEFAULT_THRESHOLD};
pub use response::{render_decision, render_failure, FailureKind, Outcome, RenderedResponse};
