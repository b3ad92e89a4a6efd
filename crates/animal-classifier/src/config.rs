//! Classifier configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use animal_models::AnimalClass;

use crate::error::{ClassifierError, ClassifierResult};

/// Published prediction endpoint for the remote variant.
pub const DEFAULT_API_URL: &str = "https://duaabn555-animalfacesv2.hf.space/predict_animal";

/// Default location of the local model artifact.
pub const DEFAULT_MODEL_PATH: &str = "models/animal_classifier.onnx";

/// Which classifier implementation serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierBackend {
    /// Forward images to an HTTP prediction endpoint
    #[default]
    Remote,
    /// Run the ONNX model in-process
    Local,
}

impl ClassifierBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierBackend::Remote => "remote",
            ClassifierBackend::Local => "local",
        }
    }
}

impl fmt::Display for ClassifierBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClassifierBackend {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remote" => Ok(ClassifierBackend::Remote),
            "local" => Ok(ClassifierBackend::Local),
            other => Err(ClassifierError::config(format!(
                "unknown classifier backend '{}' (expected 'remote' or 'local')",
                other
            ))),
        }
    }
}

/// Memory layout of the model input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// [1, H, W, 3], as exported from Keras
    #[default]
    Nhwc,
    /// [1, 3, H, W]
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nhwc" => Ok(TensorLayout::Nhwc),
            "nchw" => Ok(TensorLayout::Nchw),
            other => Err(ClassifierError::config(format!("unknown tensor layout '{}'", other))),
        }
    }
}

/// Configuration for the remote classifier.
#[derive(Debug, Clone)]
pub struct RemoteClassifierConfig {
    /// Prediction endpoint receiving the multipart upload
    pub api_url: String,
    /// Optional liveness endpoint of the prediction service
    pub health_url: Option<String>,
    /// Request timeout; `None` keeps the HTTP client default
    pub timeout: Option<Duration>,
    /// Extra attempts after a transport failure
    pub max_retries: u32,
    /// JPEG quality used when encoding the upload
    pub jpeg_quality: u8,
}

impl Default for RemoteClassifierConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            health_url: None,
            timeout: None,
            max_retries: 0,
            jpeg_quality: 75,
        }
    }
}

impl RemoteClassifierConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("CLASSIFIER_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            health_url: std::env::var("CLASSIFIER_HEALTH_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            timeout: std::env::var("CLASSIFIER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            max_retries: std::env::var("CLASSIFIER_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            jpeg_quality: std::env::var("CLASSIFIER_JPEG_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|q| (1..=100).contains(q))
                .unwrap_or(75),
        }
    }
}

/// Configuration for the local classifier.
#[derive(Debug, Clone)]
pub struct LocalClassifierConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Class names in model output order
    pub class_names: Vec<String>,
    /// Square input size the model expects
    pub input_size: u32,
    /// Input tensor layout
    pub layout: TensorLayout,
    /// Output tensor to read; first model output when unset
    pub output_name: Option<String>,
}

impl Default for LocalClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            class_names: AnimalClass::default_names(),
            input_size: 224,
            layout: TensorLayout::Nhwc,
            output_name: None,
        }
    }
}

impl LocalClassifierConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ClassifierResult<Self> {
        let layout = match std::env::var("CLASSIFIER_TENSOR_LAYOUT") {
            Ok(s) => s.parse()?,
            Err(_) => TensorLayout::default(),
        };

        let class_names = std::env::var("CLASSIFIER_CLASS_NAMES")
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|_| AnimalClass::default_names());

        if class_names.is_empty() {
            return Err(ClassifierError::config("CLASSIFIER_CLASS_NAMES is empty"));
        }

        Ok(Self {
            model_path: std::env::var("CLASSIFIER_MODEL_PATH")
                .unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string()),
            class_names,
            input_size: std::env::var("CLASSIFIER_INPUT_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(224),
            layout,
            output_name: std::env::var("CLASSIFIER_OUTPUT_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Classifier selection plus per-variant settings.
#[derive(Debug, Clone, Default)]
pub struct ClassifierConfig {
    pub backend: ClassifierBackend,
    pub remote: RemoteClassifierConfig,
    pub local: LocalClassifierConfig,
}

impl ClassifierConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ClassifierResult<Self> {
        let backend = match std::env::var("CLASSIFIER_BACKEND") {
            Ok(s) => s.parse()?,
            Err(_) => ClassifierBackend::default(),
        };

        Ok(Self {
            backend,
            remote: RemoteClassifierConfig::from_env(),
            local: LocalClassifierConfig::from_env()?,
        })
    }
}
