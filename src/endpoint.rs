use crate::{
    codec,
    error::{InitializationError, ScoringError},
    messages::{InferenceRequest, PredictionResult, ScoringResponse},
    model::Classifier,
};
use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    str::FromStr,
};

/// Lifecycle of a scoring endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointState {
    /// No classifier is loaded; requests are rejected.
    Uninitialized,
    /// The classifier is loaded and requests are served.
    Ready,
}

impl EndpointState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointState::Uninitialized => "uninitialized",
            EndpointState::Ready => "ready",
        }
    }
}

/// What happens to a request when one of its images fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The failing image gets an error entry in its slot, the others keep
    /// their predictions.
    #[default]
    Isolate,
    /// The first failure stops processing and replaces the whole response
    /// with a single error object.
    FailFast,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Isolate => "isolate",
            FailurePolicy::FailFast => "fail-fast",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isolate" => Ok(FailurePolicy::Isolate),
            "fail-fast" => Ok(FailurePolicy::FailFast),
            other => Err(format!(
                "unknown failure policy `{other}`, expected `isolate` or `fail-fast`"
            )),
        }
    }
}

/// Request handler that decodes images, classifies them and serializes the
/// outcome.
///
/// The classifier is injected once, either at construction with
/// [`ScoringEndpoint::ready`] or through [`ScoringEndpoint::initialize`], and
/// is owned by the endpoint until it is dropped.
pub struct ScoringEndpoint<C: Classifier> {
    classifier: Option<C>,
    policy: FailurePolicy,
}

impl<C: Classifier> ScoringEndpoint<C> {
    /// Creates an endpoint with no classifier loaded.
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            classifier: None,
            policy,
        }
    }

    /// Creates an endpoint around an already loaded classifier.
    pub fn ready(classifier: C, policy: FailurePolicy) -> Self {
        Self {
            classifier: Some(classifier),
            policy,
        }
    }

    pub fn state(&self) -> EndpointState {
        match self.classifier {
            Some(_) => EndpointState::Ready,
            None => EndpointState::Uninitialized,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Loads the classifier and moves the endpoint to `Ready`.
    ///
    /// If `load` fails the endpoint stays `Uninitialized` and the error is
    /// returned unchanged. A ready endpoint is never reloaded.
    pub fn initialize<F>(&mut self, load: F) -> Result<(), InitializationError>
    where
        F: FnOnce() -> Result<C, InitializationError>,
    {
        if self.classifier.is_some() {
            return Err(InitializationError::AlreadyInitialized);
        }
        let classifier = load()?;
        self.classifier = Some(classifier);
        log::info!("Classifier loaded, endpoint is ready");
        Ok(())
    }

    /// Scores a single encoded image.
    pub fn score_image(&self, encoded: &str) -> Result<PredictionResult, ScoringError> {
        let classifier = self.classifier.as_ref().ok_or(ScoringError::NotReady)?;

        let image = codec::decode_image(encoded)?;
        // a panicking classifier fails this image only, not the engine thread
        let classification = catch_unwind(AssertUnwindSafe(|| classifier.classify(&image)))
            .map_err(|payload| {
                let message = panic_message(&*payload);
                ScoringError::Inference(format!("classifier panicked: {message}"))
            })?
            .map_err(|e| ScoringError::Inference(e.to_string()))?;

        let probability = classification.confidence().ok_or_else(|| {
            ScoringError::Inference(format!(
                "predicted class {} has no probability",
                classification.index
            ))
        })?;
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(ScoringError::Inference(format!(
                "probability {probability} is outside [0, 1]"
            )));
        }

        Ok(PredictionResult::success(classification.label, probability))
    }

    /// Scores every image of the request, sequentially and in input order.
    pub fn handle(&self, request: &InferenceRequest) -> Result<ScoringResponse, ScoringError> {
        if self.classifier.is_none() {
            return Err(ScoringError::NotReady);
        }

        let mut results = Vec::with_capacity(request.len());
        for (position, encoded) in request.data.iter().enumerate() {
            match self.score_image(encoded) {
                Ok(result) => results.push(result),
                Err(e) => {
                    log::warn!("Image {position} failed: {e}");
                    match self.policy {
                        FailurePolicy::Isolate => {
                            results.push(PredictionResult::failure(e.to_string()))
                        }
                        FailurePolicy::FailFast => {
                            return Ok(ScoringResponse::Failure(PredictionResult::failure(
                                e.to_string(),
                            )));
                        }
                    }
                }
            }
        }

        Ok(ScoringResponse::Batch(results))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
