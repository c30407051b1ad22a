use serde::{Deserialize, Serialize};

/// Body of a scoring request: base64 encoded images in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InferenceRequest {
    pub data: Vec<String>,
}

impl InferenceRequest {
    pub fn new(data: Vec<String>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Outcome for a single image.
///
/// On failure `label` carries the error message, `probability` is empty and
/// `error` is set. Successful results serialize without the `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PredictionResult {
    pub label: String,
    pub probability: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl PredictionResult {
    pub fn success(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability: probability.to_string(),
            error: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            label: message.into(),
            probability: String::new(),
            error: true,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Parses the confidence back into a number, `None` for failed results.
    pub fn confidence(&self) -> Option<f32> {
        if self.error {
            return None;
        }
        self.probability.parse().ok()
    }
}

/// Response body of a scoring request.
///
/// A batch serializes as a JSON array with one entry per submitted image. A
/// failure serializes as a single JSON object and replaces the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ScoringResponse {
    Batch(Vec<PredictionResult>),
    Failure(PredictionResult),
}

impl ScoringResponse {
    /// Results in input order; a failure response has none.
    pub fn results(&self) -> &[PredictionResult] {
        match self {
            ScoringResponse::Batch(results) => results,
            ScoringResponse::Failure(_) => &[],
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ScoringResponse::Failure(_))
    }
}
