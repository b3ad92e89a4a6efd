//! In-process classification with an ONNX model.
//!
//! The model is loaded once at construction. Each request is decoded,
//! resized to the model input size, scaled to [0, 1] and run through a
//! single forward pass. The output vector is read as class probabilities.

use std::path::Path;
use std::sync::{Arc, Mutex};

use animal_models::ClassificationResult;
use async_trait::async_trait;
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::classifier::Classifier;
use crate::config::LocalClassifierConfig;
use crate::error::{ClassifierError, ClassifierResult};
use crate::image_io::{self, ModelInput};

/// Tolerance when deciding whether an output vector already sums to one.
const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Classifier running a local ONNX model.
#[derive(Clone)]
pub struct LocalClassifier {
    model: Arc<LocalModel>,
}

struct LocalModel {
    session: Mutex<Session>,
    output_name: String,
    config: LocalClassifierConfig,
}

impl LocalClassifier {
    /// Load the model described by `config`.
    ///
    /// Returns error if the model file doesn't exist or cannot be loaded.
    pub fn new(config: LocalClassifierConfig) -> ClassifierResult<Self> {
        if config.class_names.is_empty() {
            return Err(ClassifierError::config("at least one class name is required"));
        }

        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(ClassifierError::model_not_found(&config.model_path));
        }

        let session = create_session(model_path)?;

        let output_name = match &config.output_name {
            Some(name) => name.clone(),
            None => session
                .outputs
                .first()
                .map(|output| output.name.clone())
                .ok_or_else(|| ClassifierError::model_load("model declares no outputs"))?,
        };

        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            classes = ?config.class_names,
            output = %output_name,
            "Local classifier initialized"
        );

        Ok(Self {
            model: Arc::new(LocalModel {
                session: Mutex::new(session),
                output_name,
                config,
            }),
        })
    }
}

impl LocalModel {
    fn classify_image(&self, image: &RgbImage) -> ClassifierResult<ClassificationResult> {
        let input = image_io::preprocess(image, self.config.input_size, self.config.layout);
        let scores = self.run_inference(input)?;
        let result = select_class(&scores, &self.config.class_names)?;

        debug!(
            label = %result.predicted_label,
            confidence = result.confidence,
            "Local inference completed"
        );

        Ok(result)
    }

    /// Run ONNX inference.
    fn run_inference(&self, input: ModelInput) -> ClassifierResult<Vec<f32>> {
        let tensor = create_input_tensor(input)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::inference("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| ClassifierError::inference(format!("ONNX inference failed: {}", e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            ClassifierError::inference(format!("Missing {} tensor", self.output_name))
        })?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::inference(format!("Failed to extract tensor: {}", e)))?;

        Ok(data.to_vec())
    }
}

#[async_trait]
impl Classifier for LocalClassifier {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn classify(&self, image: &[u8]) -> ClassifierResult<ClassificationResult> {
        let model = Arc::clone(&self.model);
        let bytes = image.to_vec();

        tokio::task::spawn_blocking(move || {
            let rgb = image_io::decode(&bytes)?;
            model.classify_image(&rgb)
        })
        .await
        .map_err(|e| ClassifierError::inference(format!("inference task failed: {}", e)))?
    }
}

fn create_input_tensor(input: ModelInput) -> ClassifierResult<Value> {
    Tensor::from_array((input.shape, input.data.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| ClassifierError::inference(format!("Failed to create tensor: {}", e)))
}

/// Turn one output vector into the top-1 class and its probability.
///
/// The vector must hold exactly one score per class name.
pub fn select_class(scores: &[f32], class_names: &[String]) -> ClassifierResult<ClassificationResult> {
    if scores.len() != class_names.len() {
        return Err(ClassifierError::inference(format!(
            "model produced {} scores for {} classes",
            scores.len(),
            class_names.len()
        )));
    }

    let probabilities = to_probabilities(scores);
    let (index, confidence) = top_class(&probabilities)
        .ok_or_else(|| ClassifierError::inference("model produced no scores"))?;

    Ok(ClassificationResult::new(class_names[index].clone(), confidence))
}

/// Interpret raw model output as probabilities.
///
/// Outputs that already form a distribution pass through unchanged;
/// anything else (logits) goes through a softmax.
pub fn to_probabilities(scores: &[f32]) -> Vec<f64> {
    let scores: Vec<f64> = scores.iter().map(|&s| s as f64).collect();
    if scores.is_empty() {
        return scores;
    }

    let sum: f64 = scores.iter().sum();
    let is_distribution = scores.iter().all(|&s| s.is_finite() && s >= 0.0)
        && (sum - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE;

    if is_distribution {
        return scores;
    }

    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|&s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return vec![0.0; scores.len()];
    }
    exps.into_iter().map(|e| e / total).collect()
}

/// Index and probability of the top-ranked class. The first index wins ties.
pub fn top_class(probabilities: &[f64]) -> Option<(usize, f64)> {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, p)| match best {
            Some((_, best_p)) if best_p >= p => best,
            _ => Some((i, p)),
        })
}

/// Create ONNX Runtime session.
fn create_session(model_path: &Path) -> ClassifierResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    Session::builder()
        .map_err(|e| ClassifierError::model_load(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ClassifierError::model_load(format!("Failed to set optimization level: {}", e)))?
        .commit_from_memory(&model_bytes)
        .map_err(|e| ClassifierError::model_load(format!("Failed to load ONNX model: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_probabilities_pass_through() {
        let probs = to_probabilities(&[0.1, 0.7, 0.2]);
        assert!((probs[1] - 0.7).abs() < 1e-6);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_logits_get_softmax() {
        let probs = to_probabilities(&[2.0, -1.0, 0.5]);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(probs[0] > probs[2] && probs[2] > probs[1]);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_top_class() {
        assert_eq!(top_class(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(top_class(&[0.5, 0.5, 0.0]), Some((0, 0.5)));
        assert_eq!(top_class(&[]), None);
    }

    fn class_names() -> Vec<String> {
        vec!["Cat".to_string(), "Dog".to_string(), "Wild".to_string()]
    }

    #[test]
    fn test_select_class_from_logits() {
        let result = select_class(&[0.5, 2.0, -1.0], &class_names()).unwrap();
        assert_eq!(result.predicted_label, "Dog");

        // exp(2) / (exp(0.5) + exp(2) + exp(-1))
        let expected = 2f64.exp() / (0.5f64.exp() + 2f64.exp() + (-1f64).exp());
        assert!((result.confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn test_select_class_from_probabilities() {
        let result = select_class(&[0.05, 0.15, 0.8], &class_names()).unwrap();
        assert_eq!(result.predicted_label, "Wild");
        assert!((result.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_select_class_rejects_length_mismatch() {
        let err = select_class(&[0.4, 0.6], &class_names()).unwrap_err();
        assert!(matches!(err, ClassifierError::Inference(_)));
        assert!(err.to_string().contains("2 scores for 3 classes"));
    }

    #[test]
    fn test_missing_model_is_reported() {
        let config = LocalClassifierConfig {
            model_path: "models/missing.onnx".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            LocalClassifier::new(config),
            Err(ClassifierError::ModelNotFound(path)) if path == "models/missing.onnx"
        ));
    }

    #[test]
    fn test_corrupt_model_fails_to_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not an onnx graph").unwrap();

        let config = LocalClassifierConfig {
            model_path: file.path().to_string_lossy().to_string(),
            ..Default::default()
        };
        assert!(matches!(
            LocalClassifier::new(config),
            Err(ClassifierError::ModelLoad(_))
        ));
    }

    #[test]
    fn test_empty_class_names_rejected() {
        let config = LocalClassifierConfig {
            class_names: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            LocalClassifier::new(config),
            Err(ClassifierError::Config(_))
        ));
    }

    fn push_varint(buf: &mut Vec<u8>, mut value: u64) {
        while value >= 0x80 {
            buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        buf.push(value as u8);
    }

    fn push_int(buf: &mut Vec<u8>, field: u64, value: u64) {
        push_varint(buf, field << 3);
        push_varint(buf, value);
    }

    fn push_bytes(buf: &mut Vec<u8>, field: u64, bytes: &[u8]) {
        push_varint(buf, (field << 3) | 2);
        push_varint(buf, bytes.len() as u64);
        buf.extend_from_slice(bytes);
    }

    fn float_tensor_info(name: &str, dims: &[u64]) -> Vec<u8> {
        let mut shape = Vec::new();
        for &dim in dims {
            let mut d = Vec::new();
            push_int(&mut d, 1, dim);
            push_bytes(&mut shape, 1, &d);
        }
        let mut tensor = Vec::new();
        push_int(&mut tensor, 1, 1); // FLOAT
        push_bytes(&mut tensor, 2, &shape);
        let mut ty = Vec::new();
        push_bytes(&mut ty, 1, &tensor);

        let mut info = Vec::new();
        push_bytes(&mut info, 1, name.as_bytes());
        push_bytes(&mut info, 2, &ty);
        info
    }

    /// ONNX graph taking an NHWC `[1, 2, 2, 3]` image, averaging each channel
    /// and applying a softmax over the three channel means.
    fn channel_mean_model() -> Vec<u8> {
        let mut axes = Vec::new();
        push_bytes(&mut axes, 1, b"axes");
        push_int(&mut axes, 8, 1);
        push_int(&mut axes, 8, 2);
        push_int(&mut axes, 20, 7); // INTS
        let mut keepdims = Vec::new();
        push_bytes(&mut keepdims, 1, b"keepdims");
        push_int(&mut keepdims, 3, 0);
        push_int(&mut keepdims, 20, 2); // INT

        let mut reduce = Vec::new();
        push_bytes(&mut reduce, 1, b"image");
        push_bytes(&mut reduce, 2, b"means");
        push_bytes(&mut reduce, 3, b"reduce");
        push_bytes(&mut reduce, 4, b"ReduceMean");
        push_bytes(&mut reduce, 5, &axes);
        push_bytes(&mut reduce, 5, &keepdims);

        let mut softmax = Vec::new();
        push_bytes(&mut softmax, 1, b"means");
        push_bytes(&mut softmax, 2, b"probabilities");
        push_bytes(&mut softmax, 3, b"softmax");
        push_bytes(&mut softmax, 4, b"Softmax");

        let mut graph = Vec::new();
        push_bytes(&mut graph, 1, &reduce);
        push_bytes(&mut graph, 1, &softmax);
        push_bytes(&mut graph, 2, b"channel_mean");
        push_bytes(&mut graph, 11, &float_tensor_info("image", &[1, 2, 2, 3]));
        push_bytes(&mut graph, 12, &float_tensor_info("probabilities", &[1, 3]));

        let mut opset = Vec::new();
        push_int(&mut opset, 2, 13);

        let mut model = Vec::new();
        push_int(&mut model, 1, 7);
        push_bytes(&mut model, 7, &graph);
        push_bytes(&mut model, 8, &opset);
        model
    }

    fn write_model() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&channel_mean_model()).unwrap();
        file
    }

    fn green_png() -> Vec<u8> {
        let img = RgbImage::from_pixel(2, 2, image::Rgb([0, 255, 0]));
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_classify_runs_model() {
        let model = write_model();
        let classifier = LocalClassifier::new(LocalClassifierConfig {
            model_path: model.path().to_string_lossy().to_string(),
            input_size: 2,
            ..Default::default()
        })
        .unwrap();

        let result = classifier.classify(&green_png()).await.unwrap();

        // Channel means are [0, 1, 0].
        let expected = 1f64.exp() / (2.0 + 1f64.exp());
        assert_eq!(result.predicted_label, "Dog");
        assert!((result.confidence - expected).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_classify_rejects_output_class_mismatch() {
        let model = write_model();
        let classifier = LocalClassifier::new(LocalClassifierConfig {
            model_path: model.path().to_string_lossy().to_string(),
            input_size: 2,
            class_names: vec!["Cat".to_string(), "Dog".to_string()],
            ..Default::default()
        })
        .unwrap();

        let err = classifier.classify(&green_png()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Inference(_)));
    }

    #[tokio::test]
    async fn test_classify_rejects_undecodable_upload() {
        let model = write_model();
        let classifier = LocalClassifier::new(LocalClassifierConfig {
            model_path: model.path().to_string_lossy().to_string(),
            input_size: 2,
            ..Default::default()
        })
        .unwrap();

        let err = classifier.classify(b"not an image").await.unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidImage(_)));
    }
}
