//! DelegatingBackend - forwards prompts to a sibling LLM capability.
//!
//! Instead of calling the network itself, this adapter locates an already
//! running capability at call time and delegates to it. Discovery is a
//! resolver function injected at construction; [`registry_resolver`] is the
//! standard one, looking the capability up in a [`CapabilityRegistry`].

use analyst_core::{AnalystError, BackendAdapter, ErrorKind, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Well-known registration name of the LLM capability.
pub const CAPABILITY_NAME: &str = "ExtensionLlm";
/// Alternate fully qualified name some hosts register under.
pub const CAPABILITY_QUALIFIED_NAME: &str = "addon.llm.ExtensionLlm";

const MISSING_CAPABILITY: &str =
    "LLM capability is not installed or not enabled; install it or switch to the direct backend";
const UNCONFIGURED_CAPABILITY: &str = "LLM capability is installed but not configured";

/// A language-model capability hosted elsewhere in the process.
#[async_trait]
pub trait LlmCapability: Send + Sync {
    /// Name the capability registers under.
    fn name(&self) -> &str;

    /// Implementation type name, used by the discovery heuristic.
    fn type_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn is_configured(&self) -> bool;

    /// Why the capability cannot be used. Empty when configured.
    fn comms_issue(&self) -> String;

    async fn chat(&self, prompt: &str) -> Result<String>;
}

/// In-process registry of named capabilities.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: RwLock<Vec<Arc<dyn LlmCapability>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capability, replacing any other registered under the same name.
    pub fn register(&self, capability: Arc<dyn LlmCapability>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|existing| existing.name() != capability.name());
        tracing::debug!(name = capability.name(), "Registered capability");
        entries.push(capability);
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|existing| existing.name() != name);
        entries.len() != before
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmCapability>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|capability| capability.name() == name)
            .cloned()
    }

    /// Every registered capability, in registration order.
    pub fn all(&self) -> Vec<Arc<dyn LlmCapability>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Locates the capability to delegate to.
pub type CapabilityResolver = Arc<dyn Fn() -> Option<Arc<dyn LlmCapability>> + Send + Sync>;

/// Standard discovery: well-known name, then qualified name, then a scan of
/// every registered capability for one that looks like an LLM provider.
pub fn registry_resolver(registry: Arc<CapabilityRegistry>) -> CapabilityResolver {
    Arc::new(move || {
        registry
            .get(CAPABILITY_NAME)
            .or_else(|| registry.get(CAPABILITY_QUALIFIED_NAME))
            .or_else(|| {
                registry
                    .all()
                    .into_iter()
                    .find(|capability| looks_like_llm(capability.as_ref()))
            })
    })
}

/// Structural match used when neither well-known name is registered.
pub fn looks_like_llm(capability: &dyn LlmCapability) -> bool {
    let name = capability.name();
    let simple_type = capability
        .type_name()
        .rsplit("::")
        .next()
        .unwrap_or_default();

    name.eq_ignore_ascii_case("llm")
        || name.ends_with(CAPABILITY_NAME)
        || simple_type == CAPABILITY_NAME
        || simple_type.ends_with("Llm")
}

/// Backend adapter that delegates to a discovered capability.
pub struct DelegatingBackend {
    resolver: CapabilityResolver,
    cached: Mutex<Option<Arc<dyn LlmCapability>>>,
}

impl DelegatingBackend {
    pub fn new(resolver: CapabilityResolver) -> Self {
        Self {
            resolver,
            cached: Mutex::new(None),
        }
    }

    pub fn from_registry(registry: Arc<CapabilityRegistry>) -> Self {
        Self::new(registry_resolver(registry))
    }

    /// Resolves the capability, remembering the first successful lookup.
    fn locate(&self) -> Option<Arc<dyn LlmCapability>> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if cached.is_none() {
            *cached = (self.resolver)();
            if let Some(capability) = cached.as_ref() {
                tracing::debug!(name = capability.name(), "Located LLM capability");
            }
        }
        cached.clone()
    }
}

#[async_trait]
impl BackendAdapter for DelegatingBackend {
    fn name(&self) -> &str {
        "delegating"
    }

    fn is_configured(&self) -> bool {
        self.locate()
            .is_some_and(|capability| capability.is_configured())
    }

    fn issue(&self) -> String {
        match self.locate() {
            None => MISSING_CAPABILITY.to_string(),
            Some(capability) if capability.is_configured() => String::new(),
            Some(capability) => {
                let issue = capability.comms_issue();
                if issue.trim().is_empty() {
                    UNCONFIGURED_CAPABILITY.to_string()
                } else {
                    issue
                }
            }
        }
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        let capability = self
            .locate()
            .ok_or_else(|| AnalystError::unavailable(MISSING_CAPABILITY))?;
        if !capability.is_configured() {
            return Err(AnalystError::unconfigured(self.issue()));
        }
        capability.chat(prompt).await.map_err(into_backend_error)
    }
}

/// Keeps backend-level failures as they are and wraps everything else as a
/// `BackendError`, so a capability cannot surface replay or storage kinds.
fn into_backend_error(err: AnalystError) -> AnalystError {
    match err.kind() {
        ErrorKind::BackendError
        | ErrorKind::BackendUnavailable
        | ErrorKind::BackendUnconfigured
        | ErrorKind::MalformedBackendResponse => err,
        _ => AnalystError::backend(err.to_string()),
    }
}
