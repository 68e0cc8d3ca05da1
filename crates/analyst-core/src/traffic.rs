//! Captured HTTP traffic and the transport that replays it.
//!
//! The analyst treats a message as four blocks of text: request header,
//! request body, response header and response body. Headers use the raw
//! wire layout, with the request line first and the target in absolute form
//! (`GET https://host/path HTTP/1.1`).

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A captured HTTP exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpMessage {
    pub request_header: String,
    pub request_body: String,
    pub response_header: String,
    pub response_body: String,
}

impl HttpMessage {
    /// Builds a request-only message.
    pub fn request(
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: impl Into<String>,
    ) -> Self {
        let mut header = format!("{} {} HTTP/1.1\r\n", method.trim().to_uppercase(), url.trim());
        for (name, value) in headers {
            header.push_str(&format!("{}: {}\r\n", name.trim(), value.trim()));
        }
        Self {
            request_header: header,
            request_body: body.into(),
            ..Self::default()
        }
    }

    /// A deep copy, used as the replay target so the captured original stays
    /// untouched.
    pub fn clone_all(&self) -> Self {
        self.clone()
    }

    fn request_line(&self) -> &str {
        self.request_header.lines().next().unwrap_or_default().trim()
    }

    /// Request method, empty if the header is malformed.
    pub fn method(&self) -> &str {
        self.request_line().split_whitespace().next().unwrap_or_default()
    }

    /// Request target as written in the request line.
    pub fn uri(&self) -> &str {
        self.request_line().split_whitespace().nth(1).unwrap_or_default()
    }

    /// Identifier used to label results and session memory entries.
    pub fn source_identifier(&self) -> String {
        match self.uri() {
            "" => "<unknown>".to_string(),
            uri => uri.to_string(),
        }
    }

    /// Header fields after the request line, in order.
    pub fn request_headers(&self) -> Vec<(String, String)> {
        parse_header_fields(&self.request_header)
    }

    pub fn is_post(&self) -> bool {
        self.method().eq_ignore_ascii_case("POST")
    }

    pub fn set_response(&mut self, header: impl Into<String>, body: impl Into<String>) {
        self.response_header = header.into();
        self.response_body = body.into();
    }

    pub fn has_response(&self) -> bool {
        !self.response_header.trim().is_empty()
    }
}

fn parse_header_fields(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .skip(1)
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Sends a message over the network and fills in its response.
#[async_trait]
pub trait TrafficTransport: Send + Sync {
    /// Replays `message`, overwriting its response blocks.
    ///
    /// Failures map to `NetworkUnresolvable`, `NetworkTimeout` or `NetworkIo`.
    async fn send(&self, message: &mut HttpMessage) -> Result<()>;
}
