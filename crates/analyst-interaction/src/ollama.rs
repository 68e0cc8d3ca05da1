//! OllamaBackend - direct HTTP adapter for a local generate-style service.
//!
//! Talks to `POST <base>/api/generate` and `GET <base>/api/tags`. The
//! configured URL may be the base or either endpoint; both are derived from
//! it. Only local hosts are contacted (see [`crate::url_policy`]).

use crate::url_policy::{ensure_resolves_locally, parse_backend_url};
use analyst_core::config::ConfigStore;
use analyst_core::{AnalystError, BackendAdapter, BackendSettings, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const GENERATE_PATH: &str = "/api/generate";
const TAGS_PATH: &str = "/api/tags";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
pub const READ_TIMEOUT: Duration = Duration::from_secs(120);
/// reqwest has no per-write timeout, so the 60 s write allowance is folded
/// into a cap on the whole exchange.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeouts applied to every backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub connect: Duration,
    pub read: Duration,
    /// Upper bound for connect, upload and download together.
    pub total: Duration,
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self {
            connect: CONNECT_TIMEOUT,
            read: READ_TIMEOUT,
            total: CONNECT_TIMEOUT + WRITE_TIMEOUT + READ_TIMEOUT,
        }
    }
}

/// Generate and tags endpoints derived from one configured URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub generate: Url,
    pub tags: Url,
}

impl Endpoints {
    /// Accepts a base URL, or a URL already ending in `/api/generate`,
    /// `/api/tags` or `/api`.
    pub fn from_configured(raw: &str) -> Result<Self> {
        let url = parse_backend_url(raw)?;

        let path = url.path().trim_end_matches('/');
        let base_path = [GENERATE_PATH, TAGS_PATH, "/api"]
            .iter()
            .find_map(|suffix| path.strip_suffix(suffix))
            .unwrap_or(path)
            .to_string();

        let with_path = |suffix: &str| {
            let mut endpoint = url.clone();
            endpoint.set_path(&format!("{}{}", base_path, suffix));
            endpoint.set_query(None);
            endpoint.set_fragment(None);
            endpoint
        };

        Ok(Self {
            generate: with_path(GENERATE_PATH),
            tags: with_path(TAGS_PATH),
        })
    }
}

/// Backend adapter for a locally running Ollama-compatible server.
#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    settings: BackendSettings,
    endpoints: std::result::Result<Endpoints, AnalystError>,
}

impl OllamaBackend {
    /// Creates a backend with the default timeouts (60 s connect, 120 s
    /// read, 240 s for the whole request).
    pub fn new(settings: BackendSettings) -> Result<Self> {
        Self::with_timeouts(settings, BackendTimeouts::default())
    }

    pub fn with_timeouts(settings: BackendSettings, timeouts: BackendTimeouts) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .timeout(timeouts.total)
            .build()
            .map_err(|e| AnalystError::backend(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, settings))
    }

    /// Uses a caller-supplied client.
    pub fn with_client(client: Client, settings: BackendSettings) -> Self {
        let endpoints = Endpoints::from_configured(&settings.url);
        Self {
            client,
            settings,
            endpoints,
        }
    }

    /// Reads URL and model from the configuration store.
    pub fn from_config(store: &dyn ConfigStore) -> Result<Self> {
        Self::new(BackendSettings::load(store))
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    pub fn endpoints(&self) -> Result<&Endpoints> {
        self.endpoints.as_ref().map_err(|err| err.clone())
    }

    /// Names of the models the server has installed.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let endpoints = self.endpoints()?;
        ensure_resolves_locally(&endpoints.tags).await?;

        tracing::debug!(url = %endpoints.tags, "Listing backend models");
        let response = self
            .client
            .get(endpoints.tags.clone())
            .send()
            .await
            .map_err(|err| request_failed("Model list", err))?;

        let body = read_json(response).await?;
        let models = body
            .get("models")
            .and_then(Value::as_array)
            .ok_or_else(|| AnalystError::backend("Model list response has no 'models' array"))?;

        Ok(models
            .iter()
            .filter_map(|model| model.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn generate(&self, endpoints: &Endpoints, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.settings.model.trim(),
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(endpoints.generate.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| request_failed("Generate", err))?;

        let body = read_json(response).await?;
        body.get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AnalystError::backend("Generate response has no 'response' string"))
    }
}

#[async_trait]
impl BackendAdapter for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn is_configured(&self) -> bool {
        self.issue().is_empty()
    }

    fn issue(&self) -> String {
        if let Err(err) = &self.endpoints {
            return err.to_string();
        }
        if self.settings.model.trim().is_empty() {
            return "No model configured; set a model name first".to_string();
        }
        String::new()
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        if !self.is_configured() {
            return Err(AnalystError::unconfigured(self.issue()));
        }
        let endpoints = self.endpoints()?;
        ensure_resolves_locally(&endpoints.generate).await?;

        tracing::debug!(
            url = %endpoints.generate,
            model = %self.settings.model,
            chars = prompt.chars().count(),
            "Sending prompt to backend"
        );
        self.generate(endpoints, prompt).await
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

fn request_failed(what: &str, err: reqwest::Error) -> AnalystError {
    if err.is_timeout() {
        AnalystError::backend(format!("{} request timed out: {}", what, err))
    } else {
        AnalystError::backend(format!("{} request failed: {}", what, err))
    }
}

/// Non-2xx and transport errors are `BackendError`; a body that is not JSON
/// is `MalformedBackendResponse`.
async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| request_failed("Reading response", err))?;

    if !status.is_success() {
        return Err(AnalystError::backend(format!(
            "Backend returned HTTP {}: {}",
            status.as_u16(),
            error_message(&text)
        )));
    }

    serde_json::from_str(&text).map_err(|err| AnalystError::malformed(err.to_string()))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
