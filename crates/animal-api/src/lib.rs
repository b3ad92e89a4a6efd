//! Axum web front end for the animal classifier.
//!
//! This crate provides:
//! - An upload form that renders the classification markup in place
//! - HTML and JSON classification endpoints
//! - Health, readiness and Prometheus metrics endpoints
//! - Rate limiting and security headers

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use service::{ClassificationService, ClassifyOutcome};
pub use state::AppState;
