//! Rendering of classification outcomes into display markup.
//!
//! Every request ends in exactly one rendered string: an accepted label, an
//! uncertain warning, or a failure message. Rendering never fails.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::policy::Decision;

const ERROR_COLOR: &str = "#FF6347";
const SUCCESS_COLOR: &str = "#008000";
const MUTED_COLOR: &str = "#555";

/// Markup shown to the caller for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderedResponse(String);

impl RenderedResponse {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RenderedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category of a per-request failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureKind {
    /// Upload could not be decoded or converted
    InvalidImage,
    /// Remote endpoint unreachable, returned an error status, or sent an unreadable body
    Connection(String),
    /// Local model failed during the forward pass
    Inference(String),
    /// Caller exceeded its request budget
    RateLimited,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidImage => "invalid_image",
            FailureKind::Connection(_) => "connection",
            FailureKind::Inference(_) => "inference",
            FailureKind::RateLimited => "rate_limited",
        }
    }
}

/// Terminal state of a classification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    Rejected,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::Rejected => "rejected",
            Outcome::Failed => "failed",
        }
    }
}

impl From<&Decision> for Outcome {
    fn from(decision: &Decision) -> Self {
        match decision {
            Decision::Accepted { .. } => Outcome::Accepted,
            Decision::Rejected { .. } => Outcome::Rejected,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Render a policy decision.
pub fn render_decision(decision: &Decision) -> RenderedResponse {
    let markup = match decision {
        Decision::Accepted { label, confidence } => format!(
            "<h1 style='color: {SUCCESS_COLOR}; text-align: center; margin-bottom: 5px;'>✅ PREDICTED: {}</h1>\
             <h3 style='text-align: center; margin-top: 5px;'>Confidence: {}</h3>",
            escape_html(&label.to_uppercase()),
            percent(*confidence, 2),
        ),
        Decision::Rejected {
            confidence,
            threshold,
        } => format!(
            "<h2 style='color: {ERROR_COLOR}; text-align: center;'>⚠️ UNCERTAIN CLASSIFICATION ⚠️</h2>\
             <p style='text-align: center; color: {MUTED_COLOR};'>Confidence: {} (Below {})</p>\
             <p style='text-align: center; color: {MUTED_COLOR};'>Unknown animal: the classifier is not confident enough to name this image.</p>",
            percent(*confidence, 2),
            percent(*threshold, 0),
        ),
    };

    RenderedResponse(markup)
}

/// Render a per-request failure.
pub fn render_failure(failure: &FailureKind) -> RenderedResponse {
    let markup = match failure {
        FailureKind::InvalidImage => format!(
            "<h2 style='color: {ERROR_COLOR};'>❌ Invalid image format or processing error.</h2>"
        ),
        FailureKind::Connection(detail) => format!(
            "<h2 style='color: {ERROR_COLOR}; text-align: center;'>❌ API CONNECTION ERROR ❌</h2>\
             <p style='text-align: center; color: {MUTED_COLOR};'>Failed to connect to the external API: {}</p>",
            escape_html(detail),
        ),
        FailureKind::Inference(detail) => format!(
            "<h2 style='color: {ERROR_COLOR}; text-align: center;'>❌ MODEL INFERENCE ERROR ❌</h2>\
             <p style='text-align: center; color: {MUTED_COLOR};'>The local model failed to classify the image: {}</p>",
            escape_html(detail),
        ),
        FailureKind::RateLimited => format!(
            "<h2 style='color: {ERROR_COLOR}; text-align: center;'>❌ TOO MANY REQUESTS ❌</h2>\
             <p style='text-align: center; color: {MUTED_COLOR};'>Please wait a moment before classifying another image.</p>"
        ),
    };

    RenderedResponse(markup)
}

/// Format a fraction as a percentage, e.g. `0.8734` with 2 digits -> `87.34%`.
fn percent(fraction: f64, digits: usize) -> String {
    format!("{:.*}%", digits, fraction * 100.0)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
