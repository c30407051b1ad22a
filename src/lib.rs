//! Scoring service for image classifiers.
//!
//! Clients submit base64 encoded images as JSON, the service classifies each
//! one with a pre-loaded [`Classifier`] and answers with a `{label,
//! probability}` object per image, in submission order.
//!
//! The pieces, from the wire inwards:
//! - [`server`] exposes the scoring API over HTTP.
//! - [`ScoringEngine`] runs a ready endpoint on a dedicated inference thread.
//! - [`ScoringEndpoint`] decodes, classifies and serializes a request.
//! - [`codec`] converts image bytes to and from their transport encoding.
//! - [`client`] is a smoke-test harness for a running service.

pub mod client;
pub mod codec;
mod endpoint;
mod engine;
mod error;
mod messages;
mod model;
pub mod onnx;
pub mod server;

pub use endpoint::{EndpointState, FailurePolicy, ScoringEndpoint};
pub use engine::{EngineResponse, ScoringEngine, WorkerState};
pub use error::{ClientError, DecodeError, InitializationError, OnnxError, ScoringError};
pub use messages::{InferenceRequest, PredictionResult, ScoringResponse};
pub use model::{Classification, Classifier, softmax};
