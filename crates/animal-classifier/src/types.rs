//! Prediction service request/response types.

use animal_models::ClassificationResult;
use serde::{Deserialize, Serialize};

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

/// File name sent with the upload.
pub const UPLOAD_FILE_NAME: &str = "image.jpg";

/// MIME type sent with the upload.
pub const UPLOAD_MIME: &str = "image/jpeg";

/// Body returned by the prediction endpoint.
///
/// Both fields are optional on the wire; extra fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl From<PredictionResponse> for ClassificationResult {
    fn from(response: PredictionResponse) -> Self {
        ClassificationResult::from_optional(response.prediction, response.confidence)
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
