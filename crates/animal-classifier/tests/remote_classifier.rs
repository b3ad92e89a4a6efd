//! Remote classifier tests against a mock prediction service.

use std::io::Cursor;
use std::time::Duration;

use animal_classifier::{Classifier, ClassifierError, RemoteClassifier, RemoteClassifierConfig};
use animal_models::{ConfidencePolicy, FailureKind, UNKNOWN_LABEL};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png_image() -> Vec<u8> {
    let img = RgbImage::from_pixel(32, 24, Rgb([120, 80, 40]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn classifier_for(server: &MockServer) -> RemoteClassifier {
    RemoteClassifier::new(RemoteClassifierConfig {
        api_url: format!("{}/predict_animal", server.uri()),
        timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    })
    .unwrap()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn test_successful_prediction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict_animal"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"prediction": "dog", "confidence": 0.8734})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = classifier_for(&server).classify(&png_image()).await.unwrap();
    assert_eq!(result.predicted_label, "dog");
    assert!((result.confidence - 0.8734).abs() < 1e-9);
}

#[tokio::test]
async fn test_upload_is_multipart_jpeg() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict_animal"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"prediction": "cat", "confidence": 0.9})),
        )
        .mount(&server)
        .await;

    classifier_for(&server).classify(&png_image()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = &requests[0].body;
    assert!(contains(body, b"name=\"file\"; filename=\"image.jpg\""));
    assert!(contains(body, b"Content-Type: image/jpeg"));
    assert!(contains(body, &[0xFF, 0xD8, 0xFF]));
}

#[tokio::test]
async fn test_missing_confidence_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"prediction": "wild"})))
        .mount(&server)
        .await;

    let result = classifier_for(&server).classify(&png_image()).await.unwrap();
    assert_eq!(result.confidence, 0.0);
    assert!(!ConfidencePolicy::default().decide(&result).is_accepted());
}

#[tokio::test]
async fn test_missing_prediction_is_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"confidence": 0.95})))
        .mount(&server)
        .await;

    let result = classifier_for(&server).classify(&png_image()).await.unwrap();
    assert_eq!(result.predicted_label, UNKNOWN_LABEL);
}

#[tokio::test]
async fn test_error_status_is_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model warming up"))
        .mount(&server)
        .await;

    let err = classifier_for(&server).classify(&png_image()).await.unwrap_err();
    assert!(matches!(err, ClassifierError::RequestFailed(ref msg) if msg.contains("503")));
    assert!(matches!(err.failure_kind(), FailureKind::Connection(_)));
}

#[tokio::test]
async fn test_non_json_body_is_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = classifier_for(&server).classify(&png_image()).await.unwrap_err();
    assert!(matches!(err, ClassifierError::InvalidResponse(_)));
    assert!(matches!(err.failure_kind(), FailureKind::Connection(_)));
}

#[tokio::test]
async fn test_transport_failure() {
    // Reserve a port, then release it so nothing is listening there.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let classifier = RemoteClassifier::new(RemoteClassifierConfig {
        api_url: format!("http://127.0.0.1:{}/predict_animal", port),
        timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    })
    .unwrap();

    let err = classifier.classify(&png_image()).await.unwrap_err();
    assert!(matches!(err, ClassifierError::Network(_)));
    assert!(matches!(err.failure_kind(), FailureKind::Connection(_)));
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
        .mount(&server)
        .await;

    let classifier = RemoteClassifier::new(RemoteClassifierConfig {
        api_url: format!("{}/predict_animal", server.uri()),
        health_url: Some(format!("{}/health", server.uri())),
        ..Default::default()
    })
    .unwrap();
    assert!(classifier.health_check().await);

    let unconfigured = classifier_for(&server);
    assert!(unconfigured.health_check().await);
}
