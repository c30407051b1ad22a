//! Smoke-test harness for a deployed scoring endpoint.
//!
//! Fetches sample images, encodes them, posts them in one request and hands
//! back the status code and raw body for inspection. Nothing is retried and a
//! non-2xx status is reported, not treated as an error.

use crate::{
    codec,
    error::ClientError,
    messages::{InferenceRequest, ScoringResponse},
};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};

/// Raw outcome of a scoring call.
#[derive(Debug, Clone)]
pub struct HarnessResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HarnessResponse {
    /// Interprets the body as a scoring response.
    pub fn parse(&self) -> Result<ScoringResponse, ClientError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

pub struct ScoringClient {
    http: reqwest::Client,
    uri: String,
}

impl ScoringClient {
    /// Creates a client for the scoring route at `uri`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            uri: uri.into(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Posts the request as JSON and returns whatever came back.
    pub async fn score(&self, request: &InferenceRequest) -> Result<HarnessResponse, ClientError> {
        let response = self.http.post(&self.uri).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        log::debug!("{} answered {} with {} bytes", self.uri, status, body.len());
        Ok(HarnessResponse { status, body })
    }

    /// Downloads every URL into `dir` and returns the local paths in order.
    ///
    /// Files are named after the last path segment of their URL, falling
    /// back to `sample-<n>` when there is none.
    pub async fn fetch_samples(
        &self,
        urls: &[String],
        dir: &Path,
    ) -> Result<Vec<PathBuf>, ClientError> {
        tokio::fs::create_dir_all(dir).await?;

        let mut paths = Vec::with_capacity(urls.len());
        for (n, url) in urls.iter().enumerate() {
            let bytes = self
                .http
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;

            let path = dir.join(sample_file_name(url, n));
            tokio::fs::write(&path, &bytes).await?;
            log::info!("Saved {} ({} bytes) to {}", url, bytes.len(), path.display());
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Encodes local image files into a single request, preserving order.
pub fn encode_files<P: AsRef<Path>>(paths: &[P]) -> Result<InferenceRequest, ClientError> {
    let data = paths
        .iter()
        .map(codec::encode_file)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(InferenceRequest::new(data))
}

fn sample_file_name(url: &str, n: usize) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.split_once("://")
        .and_then(|(_, rest)| rest.split_once('/'))
        .and_then(|(_, resource)| resource.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .map(|segment| format!("{n}-{segment}"))
        .unwrap_or_else(|| format!("sample-{n}"))
}
