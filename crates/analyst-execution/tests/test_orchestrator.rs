use analyst_core::role::RED_TEAM_ROLE;
use analyst_core::{
    AnalysisRequest, AnalysisResult, AnalysisState, AnalystError, BackendAdapter, ErrorKind,
    HttpMessage, Result, ResultSink, TrafficTransport,
};
use analyst_core::BackendSettings;
use analyst_execution::{AnalysisOrchestrator, AnalystContext};
use analyst_infrastructure::InMemoryConfigStore;
use analyst_interaction::delegating::CAPABILITY_NAME;
use analyst_interaction::{CapabilityRegistry, DelegatingBackend, LlmCapability, OllamaBackend};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

// ============================================================================
// Stubs
// ============================================================================

struct StubBackend {
    configured: bool,
    reply: String,
    delay: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubBackend {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            reply: reply.to_string(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            configured: false,
            ..Self::base()
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: "Slow answer.".to_string(),
            delay,
            ..Self::base()
        })
    }

    fn base() -> Self {
        Self {
            configured: true,
            reply: String::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl BackendAdapter for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn issue(&self) -> String {
        if self.configured {
            String::new()
        } else {
            "Stub backend has no model".to_string()
        }
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.reply.clone())
    }
}

/// Fails by panicking, the way a buggy third-party adapter might.
struct PanickingBackend;

#[async_trait]
impl BackendAdapter for PanickingBackend {
    fn name(&self) -> &str {
        "panicking"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn issue(&self) -> String {
        String::new()
    }

    async fn chat(&self, _prompt: &str) -> Result<String> {
        panic!("adapter bug");
    }
}

/// Answers every replay with a fixed response, or fails.
struct StubTransport {
    failure: Option<AnalystError>,
}

impl StubTransport {
    fn ok() -> Arc<Self> {
        Arc::new(Self { failure: None })
    }

    fn failing(error: AnalystError) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(error),
        })
    }
}

#[async_trait]
impl TrafficTransport for StubTransport {
    async fn send(&self, message: &mut HttpMessage) -> Result<()> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        message.set_response(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n",
            "<html>live body</html>",
        );
        Ok(())
    }
}

struct ChannelSink {
    results: mpsc::UnboundedSender<(String, AnalysisResult)>,
    states: Mutex<Vec<AnalysisState>>,
}

impl ChannelSink {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(String, AnalysisResult)>) {
        let (results, receiver) = mpsc::unbounded_channel();
        let sink = Arc::new(Self {
            results,
            states: Mutex::new(Vec::new()),
        });
        (sink, receiver)
    }

    fn states(&self) -> Vec<AnalysisState> {
        self.states.lock().unwrap().clone()
    }
}

impl ResultSink for ChannelSink {
    fn deliver(&self, source_identifier: &str, result: AnalysisResult) {
        let _ = self.results.send((source_identifier.to_string(), result));
    }

    fn on_progress(&self, _source_identifier: &str, state: AnalysisState) {
        self.states.lock().unwrap().push(state);
    }
}

/// Delivers results but panics on every progress notification.
struct NoisySink(mpsc::UnboundedSender<AnalysisResult>);

impl ResultSink for NoisySink {
    fn deliver(&self, _source_identifier: &str, result: AnalysisResult) {
        let _ = self.0.send(result);
    }

    fn on_progress(&self, _source_identifier: &str, _state: AnalysisState) {
        panic!("progress display broke");
    }
}

struct RegisteredLlm;

#[async_trait]
impl LlmCapability for RegisteredLlm {
    fn name(&self) -> &str {
        CAPABILITY_NAME
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn comms_issue(&self) -> String {
        String::new()
    }

    async fn chat(&self, _prompt: &str) -> Result<String> {
        Ok("Delegated: missing CSRF token.".to_string())
    }
}

/// Serves one canned `/api/generate` answer per connection.
async fn spawn_generate_stub(reply: &'static str) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut received = Vec::new();
                let mut chunk = [0u8; 4096];
                // Read until the JSON body has been closed.
                while !received.ends_with(b"}") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(read) => received.extend_from_slice(&chunk[..read]),
                    }
                }
                let body = serde_json::json!({ "response": reply, "done": true }).to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    addr
}

fn orchestrator(
    backend: Arc<dyn BackendAdapter>,
    transport: Arc<dyn TrafficTransport>,
) -> AnalysisOrchestrator {
    let config = Arc::new(InMemoryConfigStore::new());
    let context = AnalystContext::init(config, backend, transport).unwrap();
    AnalysisOrchestrator::new(context)
}

fn request(url: &str) -> AnalysisRequest {
    AnalysisRequest::new(HttpMessage::request("GET", url, &[], ""))
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_successful_analysis_records_memory_and_delivers_once() {
    let backend = StubBackend::replying("No issues found.");
    let orchestrator = orchestrator(backend.clone(), StubTransport::ok());
    let (sink, mut results) = ChannelSink::new();

    orchestrator
        .submit(request("https://shop.example/cart"), sink.clone())
        .unwrap();

    let (source, result) = results.recv().await.unwrap();
    assert_eq!(source, "https://shop.example/cart");
    assert_eq!(result.text, "No issues found.");
    assert_eq!(result.error, None);
    assert_eq!(result.advisory, None);

    let memory = orchestrator.context().memory().formatted();
    assert!(memory.lines().any(|line| line == "[https://shop.example/cart] No issues found."));

    assert_eq!(
        sink.states(),
        vec![
            AnalysisState::Queued,
            AnalysisState::Replaying,
            AnalysisState::Prompting,
            AnalysisState::Calling,
            AnalysisState::Summarizing,
            AnalysisState::Delivered,
        ]
    );

    drop(sink);
    orchestrator.context().shutdown(Duration::from_secs(1)).await;
    assert!(results.recv().await.is_none(), "sink received more than one result");
}

#[tokio::test]
async fn test_unconfigured_backend_errors_without_touching_memory() {
    let backend = StubBackend::unconfigured();
    let orchestrator = orchestrator(backend.clone(), StubTransport::ok());
    let (sink, mut results) = ChannelSink::new();

    orchestrator.submit(request("http://t/a"), sink.clone()).unwrap();

    let (_, result) = results.recv().await.unwrap();
    assert_eq!(result.error, Some(ErrorKind::BackendUnconfigured));
    assert!(result.text.contains("Stub backend has no model"));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    assert!(orchestrator.context().memory().is_empty());
    assert_eq!(sink.states().last(), Some(&AnalysisState::Errored));

    drop(sink);
    orchestrator.context().shutdown(Duration::from_secs(1)).await;
    assert!(results.recv().await.is_none());
}

#[tokio::test]
async fn test_replay_failure_surfaces_network_kind() {
    let backend = StubBackend::replying("unused");
    let transport = StubTransport::failing(AnalystError::NetworkUnresolvable("nx.invalid".into()));
    let orchestrator = orchestrator(backend.clone(), transport);
    let (sink, mut results) = ChannelSink::new();

    orchestrator.submit(request("http://nx.invalid/"), sink.clone()).unwrap();

    let (_, result) = results.recv().await.unwrap();
    assert_eq!(result.error, Some(ErrorKind::NetworkUnresolvable));
    assert!(result.text.contains("nx.invalid"));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    assert!(orchestrator.context().memory().is_empty());
    assert!(!sink.states().contains(&AnalysisState::Calling));
}

#[tokio::test]
async fn test_prompt_uses_live_response_and_active_role() {
    let backend = StubBackend::replying("Looks fine.");
    let orchestrator = orchestrator(backend.clone(), StubTransport::ok());
    orchestrator
        .context()
        .update_roles(|roles| roles.set_active_role(RED_TEAM_ROLE))
        .unwrap();
    let red_team_prompt = orchestrator
        .context()
        .with_roles(|roles| roles.get_role_prompt(RED_TEAM_ROLE).to_string());

    let (sink, mut results) = ChannelSink::new();
    let request = request("http://t/profile").with_instructions("Check the session cookie only");
    orchestrator.submit(request, sink).unwrap();
    results.recv().await.unwrap();

    let prompt = backend.last_prompt();
    assert!(prompt.contains(red_team_prompt.trim()));
    assert!(prompt.contains("<html>live body</html>"));
    assert!(prompt.contains("Check the session cookie only"));
    assert!(prompt.contains("None."));
}

#[tokio::test]
async fn test_second_analysis_sees_first_finding() {
    let backend = StubBackend::replying("Reflected XSS in q\nDetails follow");
    let orchestrator = orchestrator(backend.clone(), StubTransport::ok());
    let (sink, mut results) = ChannelSink::new();

    orchestrator.submit(request("http://t/search"), sink.clone()).unwrap();
    results.recv().await.unwrap();
    orchestrator.submit(request("http://t/other"), sink).unwrap();
    results.recv().await.unwrap();

    assert!(backend
        .last_prompt()
        .contains("[http://t/search] Reflected XSS in q Details follow"));
}

#[tokio::test]
async fn test_oversized_prompt_is_truncated_with_advisory() {
    let backend = StubBackend::replying("ok");
    let orchestrator = orchestrator(backend.clone(), StubTransport::ok());
    let (sink, mut results) = ChannelSink::new();

    let message = HttpMessage::request("POST", "http://t/upload", &[], "B".repeat(300 * 1024));
    orchestrator.submit(AnalysisRequest::new(message), sink).unwrap();

    let (_, result) = results.recv().await.unwrap();
    assert!(result.is_success());
    assert_eq!(
        result.advisory.as_deref(),
        Some("Prompt truncated to 131072 characters before sending to model.")
    );
    let prompt = backend.last_prompt();
    assert_eq!(prompt.chars().count(), 128 * 1024);
    assert!(prompt.starts_with("SYSTEM: You are a security analyst."));
}

#[tokio::test]
async fn test_memory_stays_bounded_under_concurrent_analyses() {
    let backend = StubBackend::replying("Finding");
    let orchestrator = orchestrator(backend, StubTransport::ok());
    let (sink, mut results) = ChannelSink::new();

    for i in 0..12 {
        orchestrator
            .submit(request(&format!("http://t/{}", i)), sink.clone())
            .unwrap();
    }
    for _ in 0..12 {
        results.recv().await.unwrap();
    }

    assert_eq!(orchestrator.context().memory().len(), 5);
}

#[tokio::test]
async fn test_panicking_backend_still_delivers_one_error() {
    let orchestrator = orchestrator(Arc::new(PanickingBackend), StubTransport::ok());
    let (sink, mut results) = ChannelSink::new();

    orchestrator.submit(request("http://t/boom"), sink.clone()).unwrap();

    let (source, result) = results.recv().await.unwrap();
    assert_eq!(source, "http://t/boom");
    assert_eq!(result.error, Some(ErrorKind::BackendError));
    assert!(result.text.contains("adapter bug"));
    assert!(orchestrator.context().memory().is_empty());
    assert_eq!(sink.states().last(), Some(&AnalysisState::Errored));

    // The same orchestrator keeps serving after a task panicked.
    orchestrator.submit(request("http://t/again"), sink.clone()).unwrap();
    let (source, result) = results.recv().await.unwrap();
    assert_eq!(source, "http://t/again");
    assert_eq!(result.error, Some(ErrorKind::BackendError));

    drop(sink);
    orchestrator.context().shutdown(Duration::from_secs(1)).await;
    assert!(results.recv().await.is_none(), "sink received more than one result per request");
}

#[tokio::test]
async fn test_panicking_progress_callback_does_not_block_delivery() {
    let orchestrator = orchestrator(StubBackend::replying("All good."), StubTransport::ok());
    let (sender, mut results) = mpsc::unbounded_channel();

    orchestrator
        .submit(request("http://t/noisy"), Arc::new(NoisySink(sender)))
        .unwrap();

    let result = results.recv().await.unwrap();
    assert_eq!(result.text, "All good.");
    assert_eq!(result.error, None);
    assert_eq!(orchestrator.context().memory().len(), 1);
}

// ============================================================================
// Real adapters
// ============================================================================

#[tokio::test]
async fn test_missing_delegated_capability_is_unconfigured() {
    let backend = DelegatingBackend::from_registry(Arc::new(CapabilityRegistry::new()));
    let orchestrator = orchestrator(Arc::new(backend), StubTransport::ok());
    let (sink, mut results) = ChannelSink::new();

    orchestrator.submit(request("http://t/a"), sink).unwrap();

    let (_, result) = results.recv().await.unwrap();
    assert_eq!(result.error, Some(ErrorKind::BackendUnconfigured));
    assert!(result.text.contains("not installed"));
    assert!(orchestrator.context().memory().is_empty());
}

#[tokio::test]
async fn test_delegated_capability_answers_and_is_remembered() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry.register(Arc::new(RegisteredLlm));
    let backend = DelegatingBackend::from_registry(registry);
    let orchestrator = orchestrator(Arc::new(backend), StubTransport::ok());
    let (sink, mut results) = ChannelSink::new();

    orchestrator.submit(request("http://t/form"), sink).unwrap();

    let (_, result) = results.recv().await.unwrap();
    assert_eq!(result.text, "Delegated: missing CSRF token.");
    assert_eq!(
        orchestrator.context().memory().formatted(),
        "[http://t/form] Delegated: missing CSRF token."
    );
}

#[tokio::test]
async fn test_direct_backend_against_local_server() {
    let addr = spawn_generate_stub("No issues found.").await;
    let backend = OllamaBackend::new(BackendSettings {
        url: format!("http://{}/", addr),
        model: "llama3:8b".to_string(),
    })
    .unwrap();
    let orchestrator = orchestrator(Arc::new(backend), StubTransport::ok());
    let (sink, mut results) = ChannelSink::new();

    orchestrator.submit(request("http://t/cart"), sink).unwrap();

    let (_, result) = results.recv().await.unwrap();
    assert_eq!(result.error, None);
    assert_eq!(result.text, "No issues found.");
    assert!(orchestrator
        .context()
        .memory()
        .formatted()
        .contains("[http://t/cart] No issues found."));
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_submit_after_shutdown_is_rejected() {
    let orchestrator = orchestrator(StubBackend::replying("x"), StubTransport::ok());
    orchestrator.context().shutdown(Duration::from_millis(10)).await;

    let (sink, mut results) = ChannelSink::new();
    let err = orchestrator.submit(request("http://t/"), sink).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShutDown);
    assert!(results.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_fast_tasks() {
    let orchestrator = orchestrator(StubBackend::slow(Duration::from_millis(500)), StubTransport::ok());
    let (sink, mut results) = ChannelSink::new();
    orchestrator.submit(request("http://t/"), sink).unwrap();

    let report = orchestrator.context().shutdown(Duration::from_secs(2)).await;
    assert_eq!(report.abandoned, 0);
    assert_eq!(report.completed, 1);

    let (_, result) = results.recv().await.unwrap();
    assert_eq!(result.text, "Slow answer.");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abandons_slow_tasks_with_one_error_each() {
    let orchestrator = orchestrator(StubBackend::slow(Duration::from_secs(3600)), StubTransport::ok());
    let (sink, mut results) = ChannelSink::new();
    orchestrator.submit(request("http://t/a"), sink.clone()).unwrap();
    orchestrator.submit(request("http://t/b"), sink.clone()).unwrap();
    drop(sink);

    let report = orchestrator.context().shutdown(Duration::from_secs(2)).await;
    assert_eq!(report.abandoned, 2);
    assert_eq!(orchestrator.context().in_flight(), 0);

    let mut delivered = Vec::new();
    while let Some((_, result)) = results.recv().await {
        delivered.push(result);
    }
    assert_eq!(delivered.len(), 2);
    assert!(delivered
        .iter()
        .all(|result| result.error == Some(ErrorKind::BackendError)));
    assert!(orchestrator.context().memory().is_empty());
}
