use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ProviderKind;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 300;

/// Credential and overrides for a single provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

impl ProviderSettings {
    /// Credential with surrounding whitespace removed, if one is configured.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Process-wide provider configuration, read once at startup and handed to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub openai: ProviderSettings,
    pub groq: ProviderSettings,
    pub gemini: ProviderSettings,
    pub cohere: ProviderSettings,
    pub timeout_secs: u64,
    pub max_output_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            openai: ProviderSettings::default(),
            groq: ProviderSettings::default(),
            gemini: ProviderSettings::default(),
            cohere: ProviderSettings::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

impl LlmSettings {
    const TIMEOUT_ENV: &'static str = "COPILOT_TIMEOUT_SECS";
    const MAX_TOKENS_ENV: &'static str = "COPILOT_MAX_OUTPUT_TOKENS";

    /// Apply environment variables on top of `self`; set values win over existing ones.
    ///
    /// * `OPENAI_API_KEY`, `GROQ_API_KEY`, `GEMINI_API_KEY`, `COHERE_API_KEY`: credentials.
    /// * `COPILOT_<PROVIDER>_MODEL` / `COPILOT_<PROVIDER>_ENDPOINT`: optional overrides.
    /// * `COPILOT_TIMEOUT_SECS`: per-call bound (default: 30).
    /// * `COPILOT_MAX_OUTPUT_TOKENS`: output size bound (default: 300).
    pub fn with_env_overrides(mut self, vars: &HashMap<String, String>) -> Result<Self> {
        for kind in ProviderKind::PRIORITY {
            let prefix = kind.env_prefix();
            let entry = self.provider_mut(kind);
            if let Some(key) = non_blank(vars, kind.credential_env()) {
                entry.api_key = Some(key);
            }
            if let Some(model) = non_blank(vars, &format!("COPILOT_{prefix}_MODEL")) {
                entry.model = Some(model);
            }
            if let Some(endpoint) = non_blank(vars, &format!("COPILOT_{prefix}_ENDPOINT")) {
                entry.endpoint = Some(endpoint);
            }
        }
        if let Some(raw) = non_blank(vars, Self::TIMEOUT_ENV) {
            self.timeout_secs = raw
                .parse::<u64>()
                .with_context(|| format!("{} must be a whole number of seconds", Self::TIMEOUT_ENV))?;
        }
        if let Some(raw) = non_blank(vars, Self::MAX_TOKENS_ENV) {
            self.max_output_tokens = raw
                .parse::<u32>()
                .with_context(|| format!("{} must be a positive integer", Self::MAX_TOKENS_ENV))?;
        }
        Ok(self)
    }

    pub fn provider(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Groq => &self.groq,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Cohere => &self.cohere,
        }
    }

    fn provider_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Groq => &mut self.groq,
            ProviderKind::Gemini => &mut self.gemini,
            ProviderKind::Cohere => &mut self.cohere,
        }
    }
}

fn non_blank(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
