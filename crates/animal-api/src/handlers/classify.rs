//! Classification handlers.

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use animal_models::{Decision, FailureKind, Outcome};
use serde::Serialize;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::service::ClassifyOutcome;
use crate::state::AppState;

/// Multipart field names accepted for the uploaded image.
const IMAGE_FIELDS: &[&str] = &["file", "image"];

/// JSON classification response.
#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    pub markup: String,
}

impl ClassifyResponse {
    fn new(outcome: ClassifyOutcome, threshold: f64) -> Self {
        let (label, confidence) = match &outcome.decision {
            Some(Decision::Accepted { label, confidence }) => (Some(label.clone()), Some(*confidence)),
            Some(Decision::Rejected { confidence, .. }) => (None, Some(*confidence)),
            None => (None, None),
        };

        Self {
            outcome: outcome.outcome,
            label,
            confidence,
            threshold,
            failure: outcome.failure,
            markup: outcome.markup.into_string(),
        }
    }
}

/// Classify an upload for the form page.
///
/// Always answers 200 with renderable markup, even for malformed or
/// oversized uploads.
pub async fn classify_form(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Html<String> {
    let image = match multipart {
        Ok(mut multipart) => read_image_field(&mut multipart).await.unwrap_or_else(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                warn!(limit = state.config.max_body_size, "Upload exceeds body limit");
            } else {
                warn!(error = %e, "Failed to read multipart upload");
            }
            None
        }),
        Err(rejection) => {
            warn!(error = %rejection, "Rejected non-multipart upload");
            None
        }
    };

    let outcome = match image {
        Some(bytes) => state.service.classify(&bytes).await,
        None => state.service.missing_image(),
    };

    Html(outcome.markup.into_string())
}

/// Classify an upload and return a JSON description of the outcome.
pub async fn classify_json(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ClassifyResponse>> {
    let image = read_image_field(&mut multipart)
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
        .ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;

    let outcome = state.service.classify(&image).await;
    Ok(Json(ClassifyResponse::new(outcome, state.service.threshold())))
}

/// Read the first image field from a multipart body.
async fn read_image_field(multipart: &mut Multipart) -> Result<Option<Bytes>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        let is_image = field
            .name()
            .map(|name| IMAGE_FIELDS.contains(&name))
            .unwrap_or(false);

        if is_image {
            return Ok(Some(field.bytes().await?));
        }
    }

    Ok(None)
}
