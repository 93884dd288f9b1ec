use super::{LlmClient, ProviderKind, ProviderSettings};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::message::AssistantContent;
use rig::completion::CompletionModelDyn;
use rig::providers::openai;
use rig::OneOrMany;

/// Low temperature keeps the labeled-line and JSON layouts stable.
const TEMPERATURE: f64 = 0.2;

/// OpenAI adapter backed by rig's provider-agnostic completion model.
pub struct RigLlmClient {
    model: Box<dyn CompletionModelDyn + Send + Sync>,
    model_id: String,
    max_tokens: u64,
}

impl RigLlmClient {
    pub fn new_openai(settings: &ProviderSettings, max_tokens: u32) -> Result<Self> {
        let Some(api_key) = settings.credential() else {
            bail!(
                "OpenAI API key must be provided via {}",
                ProviderKind::OpenAi.credential_env()
            );
        };

        let mut builder = openai::Client::builder(api_key);
        if let Some(endpoint) = settings.endpoint.as_deref() {
            builder = builder.base_url(endpoint);
        }
        let client = builder.build();

        let model_id = settings
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| ProviderKind::OpenAi.default_model().to_string());
        let model: Box<dyn CompletionModelDyn + Send + Sync> =
            Box::new(client.completion_model(&model_id));

        Ok(Self {
            model,
            model_id,
            max_tokens: u64::from(max_tokens),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl LlmClient for RigLlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = self
            .model
            .completion_request(prompt.into())
            .max_tokens(self.max_tokens)
            .temperature(TEMPERATURE)
            .build();
        let response = self
            .model
            .completion(request)
            .await
            .with_context(|| format!("OpenAI completion failed for model {}", self.model_id))?;

        let text = text_from_choice(response.choice);
        if text.is_empty() {
            bail!("OpenAI model {} returned no text", self.model_id);
        }
        Ok(text)
    }
}

/// Text segments joined by newlines; tool-call arguments are kept as JSON
/// since some models answer a JSON task through a tool call.
fn text_from_choice(choice: OneOrMany<AssistantContent>) -> String {
    let segments: Vec<String> = choice
        .into_iter()
        .filter_map(|segment| match segment {
            AssistantContent::Text(text) => Some(text.text),
            AssistantContent::ToolCall(tool) => serde_json::to_string(&tool.function.arguments).ok(),
            AssistantContent::Reasoning(_) => None,
        })
        .filter(|value| !value.trim().is_empty())
        .collect();
    segments.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig::completion::message::Text;

    fn openai_settings() -> ProviderSettings {
        ProviderSettings {
            api_key: Some("test-key".into()),
            endpoint: Some("https://example.com".into()),
            model: Some("gpt-test".into()),
        }
    }

    #[test]
    fn openai_builder_requires_api_key() {
        let mut settings = openai_settings();
        settings.api_key = Some("   ".into());
        let result = RigLlmClient::new_openai(&settings, 300);
        let message = result.err().expect("blank key should error").to_string();
        assert!(message.contains("OPENAI_API_KEY"));
    }

    #[test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "reqwest default TLS stack unavailable in sandbox"
    )]
    fn openai_builder_sets_model_id() {
        let client =
            RigLlmClient::new_openai(&openai_settings(), 300).expect("client should be constructed");
        assert_eq!(client.model_id(), "gpt-test");
        assert_eq!(client.max_tokens, 300);
    }

    #[test]
    #[cfg_attr(
        target_os = "macos",
        ignore = "reqwest default TLS stack unavailable in sandbox"
    )]
    fn openai_builder_defaults_model_when_missing() {
        let mut settings = openai_settings();
        settings.model = None;
        let client = RigLlmClient::new_openai(&settings, 300).expect("client should be constructed");
        assert_eq!(client.model_id(), "gpt-4o-mini");
    }

    #[test]
    fn text_from_choice_trims_text_segments() {
        let choice = OneOrMany::one(AssistantContent::Text(Text {
            text: "\nRemediation: rotate keys\nConfidence: 0.9\n".into(),
        }));
        assert_eq!(
            text_from_choice(choice),
            "Remediation: rotate keys\nConfidence: 0.9"
        );
    }

    #[test]
    fn text_from_choice_empty_is_empty() {
        let choice = OneOrMany::one(AssistantContent::Text(Text { text: "  ".into() }));
        assert!(text_from_choice(choice).is_empty());
    }
}
