//! Image classifiers for the animal classifier service.
//!
//! Two interchangeable implementations of one capability, "produce a
//! classification result from an image":
//! - [`RemoteClassifier`] forwards a JPEG to an HTTP prediction endpoint
//! - [`LocalClassifier`] runs an ONNX model in-process
//!
//! The variant is picked once at startup with [`build_classifier`].

pub mod classifier;
pub mod config;
pub mod error;
pub mod image_io;
pub mod local;
pub mod remote;
pub mod types;

pub use classifier::{build_classifier, Classifier};
pub use config::{ClassifierBackend, ClassifierConfig, LocalClassifierConfig, RemoteClassifierConfig, TensorLayout};
pub use error::{ClassifierError, ClassifierResult};
pub use local::LocalClassifier;
pub use remote::RemoteClassifier;
