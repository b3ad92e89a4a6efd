//! Classification result and animal class definitions.

use serde::{Deserialize, Serialize};

/// Label used when the upstream classifier did not name a class.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Top-1 output of a classifier for a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Name of the top-ranked class
    pub predicted_label: String,
    /// Probability mass assigned to the top-ranked class, in [0, 1]
    pub confidence: f64,
}

impl ClassificationResult {
    /// Create a new classification result.
    pub fn new(predicted_label: impl Into<String>, confidence: f64) -> Self {
        Self {
            predicted_label: predicted_label.into(),
            confidence,
        }
    }

    /// Build a result from optional upstream fields.
    ///
    /// A missing or blank label becomes [`UNKNOWN_LABEL`]; a missing
    /// confidence becomes 0.0.
    pub fn from_optional(label: Option<String>, confidence: Option<f64>) -> Self {
        let predicted_label = label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

        Self {
            predicted_label,
            confidence: confidence.unwrap_or(0.0),
        }
    }
}

/// Fixed class set of the bundled local model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimalClass {
    Cat,
    Dog,
    Wild,
}

impl AnimalClass {
    /// All classes in model output order.
    pub const ALL: &'static [AnimalClass] = &[AnimalClass::Cat, AnimalClass::Dog, AnimalClass::Wild];

    /// Display name as the model was trained with.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimalClass::Cat => "Cat",
            AnimalClass::Dog => "Dog",
            AnimalClass::Wild => "Wild",
        }
    }

    /// Default class names in output order.
    pub fn default_names() -> Vec<String> {
        Self::ALL.iter().map(|c| c.as_str().to_string()).collect()
    }
}
