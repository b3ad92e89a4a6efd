//! Classifier trait and startup selection.

use std::sync::Arc;

use animal_models::ClassificationResult;
use async_trait::async_trait;
use tracing::info;

use crate::config::{ClassifierBackend, ClassifierConfig};
use crate::error::ClassifierResult;
use crate::local::LocalClassifier;
use crate::remote::RemoteClassifier;

/// Produces a classification result from an encoded image.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Classify raw uploaded image bytes (any format the decoder supports).
    async fn classify(&self, image: &[u8]) -> ClassifierResult<ClassificationResult>;

    /// Whether the classifier can currently serve requests.
    async fn health_check(&self) -> bool {
        true
    }
}

/// Build the configured classifier.
///
/// The local variant loads its model here; a load failure is returned so the
/// caller can refuse to start.
pub fn build_classifier(config: &ClassifierConfig) -> ClassifierResult<Arc<dyn Classifier>> {
    let classifier: Arc<dyn Classifier> = match config.backend {
        ClassifierBackend::Remote => Arc::new(RemoteClassifier::new(config.remote.clone())?),
        ClassifierBackend::Local => Arc::new(LocalClassifier::new(config.local.clone())?),
    };

    info!(backend = classifier.name(), "Classifier initialized");
    Ok(classifier)
}
