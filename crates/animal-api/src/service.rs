//! Classification request pipeline.
//!
//! Runs the configured classifier, applies the confidence policy and renders
//! the markup. Every request ends in a rendered string; classifier errors are
//! folded into a failure message instead of being returned.

use std::sync::Arc;
use std::time::Instant;

use animal_classifier::Classifier;
use animal_models::{
    render_decision, render_failure, ConfidencePolicy, Decision, FailureKind, Outcome, RenderedResponse,
};
use tracing::{info, warn};

use crate::metrics;

/// Terminal result of one classification request.
#[derive(Debug, Clone)]
pub struct ClassifyOutcome {
    pub outcome: Outcome,
    pub decision: Option<Decision>,
    pub failure: Option<FailureKind>,
    pub markup: RenderedResponse,
}

/// Classifier plus policy, shared across requests.
#[derive(Clone)]
pub struct ClassificationService {
    classifier: Arc<dyn Classifier>,
    policy: ConfidencePolicy,
}

impl ClassificationService {
    pub fn new(classifier: Arc<dyn Classifier>, policy: ConfidencePolicy) -> Self {
        Self { classifier, policy }
    }

    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    pub fn threshold(&self) -> f64 {
        self.policy.threshold()
    }

    /// Classify an uploaded image.
    pub async fn classify(&self, image: &[u8]) -> ClassifyOutcome {
        let backend = self.classifier.name();
        let start = Instant::now();

        let result = match self.classifier.classify(image).await {
            Ok(classification) => {
                let decision = self.policy.decide(&classification);
                info!(
                    backend,
                    label = %classification.predicted_label,
                    confidence = classification.confidence,
                    accepted = decision.is_accepted(),
                    "Image classified"
                );

                ClassifyOutcome {
                    outcome: Outcome::from(&decision),
                    markup: render_decision(&decision),
                    decision: Some(decision),
                    failure: None,
                }
            }
            Err(e) => {
                let failure = e.failure_kind();
                warn!(backend, kind = failure.as_str(), error = %e, "Classification failed");

                ClassifyOutcome {
                    outcome: Outcome::Failed,
                    markup: render_failure(&failure),
                    decision: None,
                    failure: Some(failure),
                }
            }
        };

        metrics::record_classification(backend, result.outcome.as_str(), start.elapsed().as_secs_f64());
        result
    }

    /// Outcome for a request that carried no usable image.
    pub fn missing_image(&self) -> ClassifyOutcome {
        let failure = FailureKind::InvalidImage;
        metrics::record_classification(self.classifier.name(), Outcome::Failed.as_str(), 0.0);

        ClassifyOutcome {
            outcome: Outcome::Failed,
            markup: render_failure(&failure),
            decision: None,
            failure: Some(failure),
        }
    }
}
