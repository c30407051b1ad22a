use argh::FromArgs;
use kornia_scoring::client::{self, ScoringClient};
use std::path::PathBuf;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SAMPLES_DIR: &str = "samples";

#[derive(FromArgs)]
/// Smoke-tests a scoring server: fetches and encodes images, posts them and
/// prints the status code and raw body.
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// a local image to score, may be repeated
    #[argh(option, short = 'i')]
    image: Vec<PathBuf>,

    /// a remote image to download and score, may be repeated
    #[argh(option, short = 'u')]
    sample_url: Vec<String>,

    /// where downloaded samples are stored
    #[argh(option, default = "PathBuf::from(DEFAULT_SAMPLES_DIR)")]
    samples_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: ClientArgs = argh::from_env();

    let client = ScoringClient::new(format!("http://{}:{}/score", args.host, args.port));

    let mut paths = client.fetch_samples(&args.sample_url, &args.samples_dir).await?;
    paths.extend(args.image);
    if paths.is_empty() {
        return Err("nothing to score, pass --image or --sample-url".into());
    }

    let request = client::encode_files(&paths)?;
    println!("Posting {} images to {}", request.len(), client.uri());
    let response = client.score(&request).await?;

    println!("Status: {}", response.status);
    println!("Body: {}", response.body);

    if let Ok(scored) = response.parse() {
        for (path, result) in paths.iter().zip(scored.results()) {
            println!("{}: {} ({})", path.display(), result.label, result.probability);
        }
    }

    Ok(())
}
