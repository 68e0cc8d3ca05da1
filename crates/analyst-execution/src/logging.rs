//! Tracing setup and a layer that streams analysis events to a channel.
//!
//! [`init_tracing`] installs the process-wide subscriber. Front ends that
//! want live progress (a status bar, the CLI's `--events` flag) add an
//! [`AnalysisEventLayer`] and read [`AnalysisEvent`]s from the receiver.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber once. Later calls are no-ops.
///
/// `RUST_LOG` wins over `default_directive`.
pub fn init_tracing(default_directive: &str, format: LogFormat) {
    install(default_directive, format, None);
}

/// Like [`init_tracing`], additionally forwarding analysis events.
///
/// Returns `None` if a subscriber was already installed.
pub fn init_tracing_with_events(
    default_directive: &str,
    format: LogFormat,
) -> Option<mpsc::UnboundedReceiver<AnalysisEvent>> {
    let (sender, receiver) = mpsc::unbounded_channel();
    install(default_directive, format, Some(AnalysisEventLayer::new(sender))).then_some(receiver)
}

fn install(default_directive: &str, format: LogFormat, events: Option<AnalysisEventLayer>) -> bool {
    let mut installed = false;
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        let fmt_layer = match format {
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed(),
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed(),
        };

        installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(events)
            .try_init()
            .is_ok();
    });
    installed
}

/// One event emitted inside an analysis task.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisEvent {
    pub target: String,
    pub level: String,
    pub message: String,
    /// Structured fields of the event itself.
    pub fields: HashMap<String, Value>,
    pub timestamp: String,
}

impl AnalysisEvent {
    /// The task the event belongs to, if it carries one.
    pub fn task_id(&self) -> Option<&str> {
        self.fields.get("task_id").and_then(Value::as_str)
    }
}

/// Forwards events carrying a `task_id` field to a channel.
pub struct AnalysisEventLayer {
    sender: mpsc::UnboundedSender<AnalysisEvent>,
}

impl AnalysisEventLayer {
    pub fn new(sender: mpsc::UnboundedSender<AnalysisEvent>) -> Self {
        Self { sender }
    }
}

impl<S> Layer<S> for AnalysisEventLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));
        if !fields.contains_key("task_id") {
            return;
        }

        let analysis_event = AnalysisEvent {
            target: event.metadata().target().to_string(),
            level: event.metadata().level().to_string(),
            message: fields
                .remove("message")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            fields,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        // The receiver may be gone; dropping the event is fine.
        let _ = self.sender.send(analysis_event);
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, Value>);

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), Value::from(format!("{:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::Registry;

    #[test]
    fn test_layer_forwards_only_task_events() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let subscriber = Registry::default().with(AnalysisEventLayer::new(sender));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("unrelated");
            tracing::info!(task_id = "t-1", state = %"calling", chars = 42u64, "Analysis state changed");
        });

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.task_id(), Some("t-1"));
        assert_eq!(event.message, "Analysis state changed");
        assert_eq!(event.fields["state"], "calling");
        assert_eq!(event.fields["chars"], 42);
        assert_eq!(event.level, "INFO");
        assert!(receiver.try_recv().is_err());
    }
}
