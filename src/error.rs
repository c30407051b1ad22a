use std::path::PathBuf;

/// Error raised while turning a transported string back into an image.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid base64.
    #[error("malformed base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes are not an image in a supported format.
    #[error("payload is not a supported image: {0}")]
    Image(#[from] image::ImageError),
}

/// Error raised while scoring a request.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// One of the submitted images could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The classifier failed on a decoded image.
    #[error("inference failed: {0}")]
    Inference(String),
    /// The endpoint has no classifier loaded.
    #[error("endpoint is not ready")]
    NotReady,
    /// The engine thread is gone and can no longer serve requests.
    #[error("scoring engine has stopped")]
    EngineStopped,
}

/// Error raised while loading the classifier at startup.
///
/// Any of these is fatal: the endpoint never becomes ready.
#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    /// A file the classifier is loaded from cannot be read.
    #[error("classifier source {} is unavailable: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The model could not be parsed or prepared for execution.
    #[error("failed to load model: {0}")]
    Model(String),
    /// The label set is empty or unreadable.
    #[error("invalid label set: {0}")]
    Labels(String),
    #[error("endpoint is already initialized")]
    AlreadyInitialized,
}

/// Error raised by the ONNX classifier on a single image.
#[derive(Debug, thiserror::Error)]
pub enum OnnxError {
    #[error("model execution failed: {0}")]
    Execution(String),
    /// The model produced a different number of scores than there are labels.
    #[error("model returned {actual} scores but {expected} labels are known")]
    LabelMismatch { expected: usize, actual: usize },
}

/// Error raised by the client test harness.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
}
