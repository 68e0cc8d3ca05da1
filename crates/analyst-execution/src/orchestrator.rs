//! AnalysisOrchestrator - runs one task per submitted request.
//!
//! Each task walks `Queued → Replaying → Prompting → Calling → Summarizing →
//! Delivered`, or ends in `Errored`. Whatever happens, the sink receives
//! exactly one result per request.

use crate::context::AnalystContext;
use crate::summary::summarize;
use analyst_core::{
    AnalysisRequest, AnalysisResult, AnalysisState, AnalystError, PromptAssembler, PromptInput,
    Result, ResultSink,
};
use futures::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Identifier of one submitted analysis.
pub type TaskId = Uuid;

const ABANDONED_MESSAGE: &str = "Analysis abandoned: shutdown grace period expired";

#[derive(Clone)]
pub struct AnalysisOrchestrator {
    context: Arc<AnalystContext>,
    assembler: PromptAssembler,
}

impl AnalysisOrchestrator {
    pub fn new(context: Arc<AnalystContext>) -> Self {
        Self::with_assembler(context, PromptAssembler::new())
    }

    pub fn with_assembler(context: Arc<AnalystContext>, assembler: PromptAssembler) -> Self {
        Self { context, assembler }
    }

    pub fn context(&self) -> &Arc<AnalystContext> {
        &self.context
    }

    /// Queues an analysis and returns immediately.
    ///
    /// Never blocks on network or backend calls, so it is safe to call from
    /// a UI thread. Fails only with `ShutDown` once shutdown has begun; in
    /// that case the sink is not called.
    pub fn submit(&self, request: AnalysisRequest, sink: Arc<dyn ResultSink>) -> Result<TaskId> {
        if self.context.is_closing() {
            return Err(AnalystError::ShutDown);
        }

        let task_id = Uuid::new_v4();
        let source = request.source_identifier();
        let span = tracing::info_span!("analysis", task_id = %task_id, source = %source);

        let orchestrator = self.clone();
        let task = async move {
            orchestrator.run(task_id, request, sink).await;
        };
        self.context
            .tracker()
            .spawn_on(task.instrument(span), self.context.runtime());

        tracing::debug!(task_id = %task_id, source = %source, state = %AnalysisState::Queued, "Analysis queued");
        Ok(task_id)
    }

    /// Runs one analysis to completion and delivers its single result.
    async fn run(&self, task_id: TaskId, request: AnalysisRequest, sink: Arc<dyn ResultSink>) {
        let source = request.source_identifier();
        self.progress(task_id, &source, sink.as_ref(), AnalysisState::Queued);

        let mut advisory = None;
        let abandon = self.context.abandon_token().clone();
        // A panicking backend or transport must still end in one delivery.
        let pipeline =
            AssertUnwindSafe(self.pipeline(task_id, &source, &request, sink.as_ref(), &mut advisory))
                .catch_unwind();
        let outcome = tokio::select! {
            biased;
            _ = abandon.cancelled() => Err(AnalystError::backend(ABANDONED_MESSAGE)),
            outcome = pipeline => outcome.unwrap_or_else(|payload| {
                Err(AnalystError::backend(format!(
                    "Analysis failed unexpectedly: {}",
                    panic_message(payload.as_ref())
                )))
            }),
        };

        let result = match outcome {
            Ok(text) => {
                self.progress(task_id, &source, sink.as_ref(), AnalysisState::Delivered);
                tracing::info!(task_id = %task_id, chars = text.chars().count(), "Analysis delivered");
                AnalysisResult::success(&source, text)
            }
            Err(err) => {
                self.progress(task_id, &source, sink.as_ref(), AnalysisState::Errored);
                tracing::warn!(task_id = %task_id, kind = ?err.kind(), error = %err, "Analysis failed");
                AnalysisResult::failure(&source, &err)
            }
        };
        sink.deliver(&source, result.with_advisory(advisory));
    }

    async fn pipeline(
        &self,
        task_id: TaskId,
        source: &str,
        request: &AnalysisRequest,
        sink: &dyn ResultSink,
        advisory: &mut Option<String>,
    ) -> Result<String> {
        // Replay a copy so the analysis sees the live response, not a cached one.
        self.progress(task_id, source, sink, AnalysisState::Replaying);
        let mut live = request.message.clone_all();
        self.context.transport().send(&mut live).await?;

        self.progress(task_id, source, sink, AnalysisState::Prompting);
        let (role, role_prompt) = self.context.active_role_snapshot();
        let session_context = self.context.memory().formatted();
        let prompt = self.assembler.assemble(&PromptInput {
            role_prompt: &role_prompt,
            session_context: &session_context,
            user_instructions: request.custom_instructions.as_deref(),
            message: &live,
            include_request: request.include_request,
            include_response: request.include_response,
        });
        if prompt.truncated {
            tracing::warn!(
                task_id = %task_id,
                original_chars = prompt.original_chars,
                chars = self.assembler.budget().max_chars,
                "Prompt exceeded budget and was truncated"
            );
        }
        *advisory = prompt.advisory();

        self.progress(task_id, source, sink, AnalysisState::Calling);
        let backend = self.context.backend();
        if !backend.is_configured() {
            return Err(AnalystError::unconfigured(backend.issue()));
        }
        tracing::debug!(task_id = %task_id, role = %role, backend = backend.name(), "Calling backend");
        let text = backend.chat(&prompt.text).await?;

        self.progress(task_id, source, sink, AnalysisState::Summarizing);
        match summarize(&text) {
            Some(summary) => self.context.memory().record(source, &summary),
            None => tracing::debug!(task_id = %task_id, "Backend output has no text to summarise"),
        }

        Ok(text)
    }

    fn progress(&self, task_id: TaskId, source: &str, sink: &dyn ResultSink, state: AnalysisState) {
        tracing::debug!(task_id = %task_id, state = %state, "Analysis state changed");
        let notified = panic::catch_unwind(AssertUnwindSafe(|| sink.on_progress(source, state)));
        if let Err(payload) = notified {
            tracing::warn!(
                task_id = %task_id,
                state = %state,
                panic = %panic_message(payload.as_ref()),
                "Progress callback panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("panic with a non-string payload")
}
