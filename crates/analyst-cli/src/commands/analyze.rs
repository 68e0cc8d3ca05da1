use super::utils::open_store;
use analyst_core::{
    AnalysisRequest, AnalysisResult, AnalysisState, BackendSettings, ConfigStore, HttpMessage,
    ResultSink,
};
use analyst_execution::logging::AnalysisEvent;
use analyst_execution::{AnalysisOrchestrator, AnalystContext, SHUTDOWN_GRACE};
use analyst_interaction::{OllamaBackend, ReqwestTransport};
use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Target URL, in absolute form
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Extra instructions for the model
    #[arg(short, long)]
    pub instructions: Option<String>,

    /// Leave the request out of the prompt
    #[arg(long)]
    pub no_request: bool,

    /// Leave the response out of the prompt
    #[arg(long)]
    pub no_response: bool,

    /// Stream analysis log events as JSON lines on stderr
    #[arg(long)]
    pub events: bool,
}

/// Prints progress and hands the result back to `run`.
struct ConsoleSink {
    result: std::sync::Mutex<Option<oneshot::Sender<AnalysisResult>>>,
}

impl ResultSink for ConsoleSink {
    fn deliver(&self, _source_identifier: &str, result: AnalysisResult) {
        let sender = self
            .result
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(sender) = sender {
            let _ = sender.send(result);
        }
    }

    fn on_progress(&self, _source_identifier: &str, state: AnalysisState) {
        if !state.is_terminal() {
            eprintln!("{}", state.status_line().dimmed());
        }
    }
}

pub async fn run(
    config: Option<&Path>,
    args: &AnalyzeArgs,
    events: Option<mpsc::UnboundedReceiver<AnalysisEvent>>,
) -> Result<()> {
    let message = build_message(args)?;

    let store: Arc<dyn ConfigStore> = Arc::new(open_store(config)?);
    let backend = OllamaBackend::new(BackendSettings::load(store.as_ref()))?;
    let transport = ReqwestTransport::new()?;
    let context = AnalystContext::init(store, Arc::new(backend), Arc::new(transport))?;
    let orchestrator = AnalysisOrchestrator::new(Arc::clone(&context));

    if let Some(mut events) = events {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Ok(line) = serde_json::to_string(&event) {
                    eprintln!("{}", line);
                }
            }
        });
    }

    let (sender, receiver) = oneshot::channel();
    let sink = Arc::new(ConsoleSink {
        result: std::sync::Mutex::new(Some(sender)),
    });

    let mut request = AnalysisRequest::new(message)
        .include_request(!args.no_request)
        .include_response(!args.no_response);
    if let Some(instructions) = &args.instructions {
        request = request.with_instructions(instructions.clone());
    }

    let (role, _) = context.active_role_snapshot();
    eprintln!("{} {}", "Role:".dimmed(), role);
    let task_id = orchestrator.submit(request, sink)?;
    tracing::debug!(task_id = %task_id, "Submitted analysis");

    let result = tokio::select! {
        result = receiver => result.map_err(|_| anyhow!("Analysis ended without a result"))?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{}", "Interrupted, shutting down...".yellow());
            context.shutdown(SHUTDOWN_GRACE).await;
            bail!("Analysis interrupted");
        }
    };
    context.shutdown(SHUTDOWN_GRACE).await;

    if let Some(advisory) = &result.advisory {
        eprintln!("{}", advisory.yellow());
    }
    match result.error {
        None => {
            println!("{}", result.text);
            Ok(())
        }
        Some(kind) => Err(anyhow!("{} ({:?})", result.text, kind)),
    }
}

fn build_message(args: &AnalyzeArgs) -> Result<HttpMessage> {
    let headers = args
        .headers
        .iter()
        .map(|raw| {
            raw.split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .filter(|(name, _)| !name.is_empty())
                .with_context(|| format!("Header '{}' is not in 'Name: value' form", raw))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(HttpMessage::request(
        &args.method,
        &args.url,
        &headers,
        args.data.clone().unwrap_or_default(),
    ))
}
