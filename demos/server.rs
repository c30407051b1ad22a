use argh::FromArgs;
use kornia_scoring::{
    FailurePolicy, ScoringEndpoint, ScoringEngine,
    onnx::{DEFAULT_INPUT_SIZE, OnnxClassifier, OnnxConfig},
    server::{self, DEFAULT_BODY_LIMIT},
};
use std::{path::PathBuf, sync::Arc};

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Serves an ONNX image classifier behind a JSON scoring endpoint.
struct ServerArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// path to the ONNX model
    #[argh(option, short = 'm')]
    model: PathBuf,

    /// path to the label file, one class name per line
    #[argh(option, short = 'l')]
    labels: PathBuf,

    /// side of the square model input
    #[argh(option, default = "DEFAULT_INPUT_SIZE")]
    input_size: u32,

    /// apply a softmax to the model outputs
    #[argh(switch)]
    softmax: bool,

    /// what to do when an image fails: "isolate" or "fail-fast"
    #[argh(option, default = "FailurePolicy::Isolate")]
    policy: FailurePolicy,

    /// maximum request body size in bytes
    #[argh(option, default = "DEFAULT_BODY_LIMIT")]
    body_limit: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: ServerArgs = argh::from_env();

    let config = OnnxConfig {
        model_path: args.model,
        labels_path: args.labels,
        input_size: args.input_size,
        apply_softmax: args.softmax,
    };

    let mut endpoint = ScoringEndpoint::new(args.policy);
    if let Err(e) = endpoint.initialize(|| OnnxClassifier::load(&config)) {
        log::error!("Could not load the classifier: {e}");
        return Err(e.into());
    }
    let policy = endpoint.policy();
    let engine = Arc::new(ScoringEngine::new(endpoint)?);

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("Starting the scoring server with policy {policy}");
    log::info!("Press Ctrl+C to stop the server");

    server::serve(listener, engine, args.body_limit).await?;

    Ok(())
}
