use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use super::{
    CohereClient, GeminiClient, GroqClient, LlmClient, LlmSettings, ProviderHandle, ProviderKind,
    RigLlmClient,
};
use crate::error::ProviderAttempt;

/// Priority-ordered set of providers whose credentials are configured and whose clients built.
///
/// Providers that could not be registered are remembered as skipped attempts so a
/// dispatch failure can explain why each one never ran.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    handles: Vec<ProviderHandle>,
    skipped: Vec<ProviderAttempt>,
}

impl ProviderRegistry {
    pub fn from_settings(settings: &LlmSettings) -> Self {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let mut registry = Self::default();
        for kind in ProviderKind::PRIORITY {
            let provider = settings.provider(kind);
            if provider.credential().is_none() {
                debug!(provider = %kind, "credential not configured; provider unavailable");
                registry.skipped.push(ProviderAttempt::skipped(
                    kind.label(),
                    format!("{} not set", kind.credential_env()),
                ));
                continue;
            }
            match build_client(kind, settings, timeout) {
                Ok((model_id, client)) => registry
                    .handles
                    .push(ProviderHandle::new(kind.label(), model_id, client)),
                Err(err) => {
                    warn!(provider = %kind, error = %err, "provider client could not be built");
                    registry
                        .skipped
                        .push(ProviderAttempt::skipped(kind.label(), format!("{err:#}")));
                }
            }
        }
        registry
    }

    /// Registry over caller-supplied handles, kept in the given order.
    pub fn from_handles(handles: Vec<ProviderHandle>) -> Self {
        Self {
            handles,
            skipped: Vec::new(),
        }
    }

    pub fn available_providers(&self) -> &[ProviderHandle] {
        &self.handles
    }

    pub fn skipped(&self) -> &[ProviderAttempt] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

fn build_client(
    kind: ProviderKind,
    settings: &LlmSettings,
    timeout: Duration,
) -> Result<(String, Arc<dyn LlmClient>)> {
    let provider = settings.provider(kind);
    let max_tokens = settings.max_output_tokens;
    let built: (String, Arc<dyn LlmClient>) = match kind {
        ProviderKind::OpenAi => {
            let client = RigLlmClient::new_openai(provider, max_tokens)?;
            (client.model_id().to_string(), Arc::new(client))
        }
        ProviderKind::Groq => {
            let client = GroqClient::new(provider, max_tokens, timeout)?;
            (client.model_id().to_string(), Arc::new(client))
        }
        ProviderKind::Gemini => {
            let client = GeminiClient::new(provider, max_tokens, timeout)?;
            (client.model_id().to_string(), Arc::new(client))
        }
        ProviderKind::Cohere => {
            let client = CohereClient::new(provider, max_tokens, timeout)?;
            (client.model_id().to_string(), Arc::new(client))
        }
    };
    Ok(built)
}
