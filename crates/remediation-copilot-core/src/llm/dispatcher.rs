use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::ProviderHandle;
use crate::error::{CopilotError, ProviderAttempt};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw provider text together with the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub provider: String,
    pub text: String,
}

/// Walks providers in priority order and returns the first usable response.
///
/// Each provider gets exactly one call, bounded by `timeout`. Errors, timeouts and
/// blank responses all advance to the next provider.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    timeout: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip_all, fields(prompt_chars = prompt.chars().count(), providers = providers.len()))]
    pub async fn dispatch(
        &self,
        prompt: &str,
        providers: &[ProviderHandle],
    ) -> Result<Dispatched, CopilotError> {
        let mut attempts = Vec::with_capacity(providers.len());
        for provider in providers {
            match self.call(provider, prompt).await {
                Ok(text) => {
                    info!(provider = %provider.name, model = %provider.model_id, "provider answered");
                    return Ok(Dispatched {
                        provider: provider.name.clone(),
                        text,
                    });
                }
                Err(attempt) => {
                    warn!(provider = %provider.name, "{attempt}; trying next provider");
                    attempts.push(attempt);
                }
            }
        }
        Err(CopilotError::NoProviderAvailable { attempts })
    }

    async fn call(&self, provider: &ProviderHandle, prompt: &str) -> Result<String, ProviderAttempt> {
        let outcome = tokio::time::timeout(self.timeout, provider.client.generate(prompt)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => return Err(ProviderAttempt::timed_out(&provider.name, self.timeout)),
        };
        match result {
            Ok(text) if !text.trim().is_empty() => {
                debug!(provider = %provider.name, response_chars = text.chars().count(), "raw provider response received");
                Ok(text)
            }
            Ok(_) => Err(ProviderAttempt::failed(&provider.name, "empty response")),
            Err(err) => Err(ProviderAttempt::failed(&provider.name, format!("{err:#}"))),
        }
    }
}
