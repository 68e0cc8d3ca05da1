//! Live replay of captured requests over reqwest.

use analyst_core::{AnalystError, HttpMessage, Result, TrafficTransport};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, redirect};
use std::time::Duration;
use url::Url;

pub const REPLAY_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const REPLAY_TIMEOUT: Duration = Duration::from_secs(60);

/// Headers reqwest computes itself.
const SKIPPED_HEADERS: [&str; 4] = ["host", "content-length", "connection", "transfer-encoding"];

/// Re-sends a message and captures the live response.
///
/// Redirects are not followed, so the captured response belongs to the
/// request that was analysed.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(REPLAY_CONNECT_TIMEOUT)
            .timeout(REPLAY_TIMEOUT)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| AnalystError::NetworkIo(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TrafficTransport for ReqwestTransport {
    async fn send(&self, message: &mut HttpMessage) -> Result<()> {
        let method = Method::from_bytes(message.method().as_bytes())
            .map_err(|_| AnalystError::NetworkIo(format!("Invalid method '{}'", message.method())))?;
        let url = Url::parse(message.uri())
            .map_err(|e| AnalystError::NetworkIo(format!("Invalid request target '{}': {}", message.uri(), e)))?;

        resolve(&url).await?;

        let mut request = self
            .client
            .request(method, url.clone())
            .headers(replay_headers(message));
        if !message.request_body.is_empty() {
            request = request.body(message.request_body.clone());
        }

        tracing::debug!(url = %url, "Replaying request");
        let response = request.send().await.map_err(|err| classify(&url, err))?;

        let header = response_header(&response);
        let body = response.text().await.map_err(|err| classify(&url, err))?;
        message.set_response(header, body);
        Ok(())
    }
}

/// Resolves the target first so DNS failures get their own kind.
async fn resolve(url: &Url) -> Result<()> {
    let host = url
        .host_str()
        .ok_or_else(|| AnalystError::NetworkIo(format!("Request target '{}' has no host", url)))?;
    let port = url.port_or_known_default().unwrap_or(80);
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| AnalystError::NetworkUnresolvable(format!("{}: {}", host, e)))?;
    if addrs.next().is_none() {
        return Err(AnalystError::NetworkUnresolvable(host.to_string()));
    }
    Ok(())
}

fn replay_headers(message: &HttpMessage) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in message.request_headers() {
        if SKIPPED_HEADERS.iter().any(|skip| name.eq_ignore_ascii_case(skip)) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(header = %name, "Dropping header that cannot be replayed"),
        }
    }
    headers
}

fn response_header(response: &reqwest::Response) -> String {
    let status = response.status();
    let mut header = format!(
        "{:?} {} {}\r\n",
        response.version(),
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    for (name, value) in response.headers() {
        header.push_str(&format!(
            "{}: {}\r\n",
            name,
            String::from_utf8_lossy(value.as_bytes())
        ));
    }
    header.push_str("\r\n");
    header
}

fn classify(url: &Url, err: reqwest::Error) -> AnalystError {
    if err.is_timeout() {
        AnalystError::NetworkTimeout(format!("{}: {}", url, err))
    } else {
        AnalystError::NetworkIo(format!("{}: {}", url, err))
    }
}
