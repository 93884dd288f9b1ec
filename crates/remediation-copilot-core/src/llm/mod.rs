mod cohere;
mod dispatcher;
mod gemini;
mod groq;
mod registry;
mod rig_adapter;
mod settings;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub use cohere::CohereClient;
pub use dispatcher::{Dispatched, Dispatcher};
pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use registry::ProviderRegistry;
pub use rig_adapter::RigLlmClient;
pub use settings::{LlmSettings, ProviderSettings};

/// Single capability every provider adapter offers: prompt text in, response text out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Supported model providers, declared in fallback priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Groq,
    Gemini,
    Cohere,
}

impl ProviderKind {
    pub const PRIORITY: [ProviderKind; 4] = [Self::OpenAi, Self::Groq, Self::Gemini, Self::Cohere];

    pub fn label(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::Gemini => "gemini",
            Self::Cohere => "cohere",
        }
    }

    /// Environment variable holding this provider's credential.
    pub fn credential_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::Cohere => "COHERE_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Groq => "llama-3.1-8b-instant",
            Self::Gemini => "gemini-1.5-flash",
            Self::Cohere => "command-r",
        }
    }

    pub(crate) fn env_prefix(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI",
            Self::Groq => "GROQ",
            Self::Gemini => "GEMINI",
            Self::Cohere => "COHERE",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An available provider: its identity plus the adapter that talks to it.
#[derive(Clone)]
pub struct ProviderHandle {
    pub name: String,
    pub model_id: String,
    pub client: Arc<dyn LlmClient>,
}

impl ProviderHandle {
    pub fn new(name: impl Into<String>, model_id: impl Into<String>, client: Arc<dyn LlmClient>) -> Self {
        Self {
            name: name.into(),
            model_id: model_id.into(),
            client,
        }
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("name", &self.name)
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

pub(crate) fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory client that replays a fixed reply and records every prompt it saw.
    pub struct ScriptedClient {
        reply: Result<String, String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        pub fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                delay: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(reason.to_string()),
                delay: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                delay: Some(delay),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.prompts.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(reason) => bail!("{reason}"),
            }
        }
    }

    pub fn handle(name: &str, client: Arc<ScriptedClient>) -> ProviderHandle {
        ProviderHandle::new(name, format!("{name}-model"), client)
    }
}
