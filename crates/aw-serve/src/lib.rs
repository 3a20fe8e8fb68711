//! AmlWolf scoring service: artifact loading, transaction encoding and the
//! HTTP front end used by the `aw-serve` binary.

pub mod fetch;
pub mod http;
pub mod service;
pub mod source;

pub use fetch::{ArtifactFetcher, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF};
pub use http::{create_router, ApiError, ModelSlot, SharedModel, HEALTH_PATH, PREDICT_PATH};
pub use service::{ModelService, TransactionRecord};
pub use source::ArtifactSource;
