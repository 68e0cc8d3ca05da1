//! Requests, results and the sink that receives them.

use crate::error::{AnalystError, ErrorKind};
use crate::traffic::HttpMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One analysis to run. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub message: HttpMessage,
    pub custom_instructions: Option<String>,
    pub include_request: bool,
    pub include_response: bool,
}

impl AnalysisRequest {
    /// A request that includes both request and response sections.
    pub fn new(message: HttpMessage) -> Self {
        Self {
            message,
            custom_instructions: None,
            include_request: true,
            include_response: true,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = Some(instructions.into());
        self
    }

    pub fn include_request(mut self, include: bool) -> Self {
        self.include_request = include;
        self
    }

    pub fn include_response(mut self, include: bool) -> Self {
        self.include_response = include;
        self
    }

    pub fn source_identifier(&self) -> String {
        self.message.source_identifier()
    }
}

/// Outcome of one analysis. Produced exactly once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub source_identifier: String,
    /// Model output on success, the error message on failure.
    pub text: String,
    pub error: Option<ErrorKind>,
    /// Operator notice, e.g. that the prompt was truncated.
    pub advisory: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn success(source_identifier: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            text: text.into(),
            error: None,
            advisory: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failure(source_identifier: impl Into<String>, error: &AnalystError) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            text: error.to_string(),
            error: Some(error.kind()),
            advisory: None,
            completed_at: Utc::now(),
        }
    }

    pub fn with_advisory(mut self, advisory: Option<String>) -> Self {
        self.advisory = advisory;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Lifecycle of a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Queued,
    Replaying,
    Prompting,
    Calling,
    Summarizing,
    Delivered,
    Errored,
}

impl AnalysisState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Errored)
    }

    /// Status line shown while the task is in this state.
    pub fn status_line(self) -> &'static str {
        match self {
            Self::Queued => "Queued for analysis...",
            Self::Replaying => "Fetching live response...",
            Self::Prompting => "Building prompt...",
            Self::Calling => "Asking the model...",
            Self::Summarizing => "Recording finding...",
            Self::Delivered => "Analysis complete.",
            Self::Errored => "Analysis failed.",
        }
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Replaying => "replaying",
            Self::Prompting => "prompting",
            Self::Calling => "calling",
            Self::Summarizing => "summarizing",
            Self::Delivered => "delivered",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Receives analysis results.
///
/// Called from a worker task, never from the submitter's thread. Implementors
/// that need a particular thread must marshal the call themselves.
pub trait ResultSink: Send + Sync {
    /// Called exactly once per submitted request.
    fn deliver(&self, source_identifier: &str, result: AnalysisResult);

    /// Called on every state transition before delivery.
    fn on_progress(&self, _source_identifier: &str, _state: AnalysisState) {}
}
