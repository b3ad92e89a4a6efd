//! Application state.

use std::sync::Arc;

use animal_classifier::{build_classifier, Classifier, ClassifierConfig};
use animal_models::{ConfidencePolicy, PolicyConfig};

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::service::ClassificationService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub service: Arc<ClassificationService>,
}

impl AppState {
    /// Create new application state, loading the configured classifier.
    pub fn new(
        config: ApiConfig,
        classifier_config: &ClassifierConfig,
        policy_config: PolicyConfig,
    ) -> ApiResult<Self> {
        let classifier = build_classifier(classifier_config)?;
        Ok(Self::with_classifier(config, classifier, policy_config))
    }

    /// Create state around an existing classifier.
    pub fn with_classifier(
        config: ApiConfig,
        classifier: Arc<dyn Classifier>,
        policy_config: PolicyConfig,
    ) -> Self {
        let service = ClassificationService::new(classifier, ConfidencePolicy::new(policy_config));

        Self {
            config,
            service: Arc::new(service),
        }
    }
}
