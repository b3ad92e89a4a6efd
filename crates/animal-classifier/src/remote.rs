//! Remote prediction service client.

use std::time::Duration;

use animal_models::ClassificationResult;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, warn};

use crate::classifier::Classifier;
use crate::config::RemoteClassifierConfig;
use crate::error::{ClassifierError, ClassifierResult};
use crate::image_io;
use crate::types::{HealthResponse, PredictionResponse, UPLOAD_FIELD, UPLOAD_FILE_NAME, UPLOAD_MIME};

/// Classifier backed by an HTTP prediction endpoint.
pub struct RemoteClassifier {
    http: Client,
    config: RemoteClassifierConfig,
}

impl RemoteClassifier {
    /// Create a new remote classifier.
    pub fn new(config: RemoteClassifierConfig) -> ClassifierResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ClassifierError::Network)?;

        Ok(Self { http, config })
    }

    /// Send an already-encoded JPEG to the prediction endpoint.
    pub async fn predict_jpeg(&self, jpeg: Vec<u8>) -> ClassifierResult<ClassificationResult> {
        let url = self.config.api_url.as_str();
        let jpeg = jpeg.as_slice();

        debug!(url = %url, bytes = jpeg.len(), "Sending prediction request");

        let response = self
            .with_retry(|| async move {
                let part = Part::bytes(jpeg.to_vec())
                    .file_name(UPLOAD_FILE_NAME)
                    .mime_str(UPLOAD_MIME)?;
                let form = Form::new().part(UPLOAD_FIELD, part);

                self.http
                    .post(url)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(ClassifierError::Network)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::RequestFailed(format!(
                "prediction service returned {}: {}",
                status,
                body.trim()
            )));
        }

        let body = response.bytes().await?;
        let prediction: PredictionResponse = serde_json::from_slice(&body)
            .map_err(|e| ClassifierError::InvalidResponse(format!("malformed prediction body: {}", e)))?;

        if prediction.confidence.is_none() {
            warn!("Prediction response carried no confidence, treating as 0");
        }

        Ok(prediction.into())
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> ClassifierResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = ClassifierResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Prediction request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ClassifierError::RequestFailed("Unknown error".to_string())))
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn classify(&self, image: &[u8]) -> ClassifierResult<ClassificationResult> {
        let rgb = image_io::decode(image)?;
        let jpeg = image_io::encode_jpeg(&rgb, self.config.jpeg_quality)?;
        self.predict_jpeg(jpeg).await
    }

    /// Probe the configured health endpoint. Without one the service is
    /// assumed reachable.
    async fn health_check(&self) -> bool {
        let Some(url) = &self.config.health_url else {
            return true;
        };

        match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => health.status == "healthy" || health.status == "ok",
                    // A 2xx without the usual body still means the service is up.
                    Err(_) => true,
                }
            }
            Ok(response) => {
                warn!("Prediction service health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Prediction service health check error: {}", e);
                false
            }
        }
    }
}
