use super::{LlmClient, ProviderKind, ProviderSettings};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CohereClient {
    http: Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl CohereClient {
    pub fn new(settings: &ProviderSettings, max_tokens: u32, timeout: Duration) -> Result<Self> {
        let Some(api_key) = settings.credential() else {
            bail!(
                "Cohere API key must be provided via {}",
                ProviderKind::Cohere.credential_env()
            );
        };
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://api.cohere.com".to_string());
        let url = format!("{}/v2/chat", base.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent("remediation-copilot/0.3")
            .timeout(timeout)
            .build()
            .context("failed to build Cohere HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: api_key.to_string(),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| ProviderKind::Cohere.default_model().to_string()),
            max_tokens,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for CohereClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = CohereRequest {
            model: self.model.clone(),
            messages: vec![CohereMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("failed to call Cohere chat API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Cohere API error ({}): {}", status, body);
        }

        let chat: CohereResponse = response
            .json()
            .await
            .context("failed to parse Cohere response")?;
        let text = chat
            .message
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(anyhow!("Cohere response missing message content"));
        }
        Ok(text.trim().to_string())
    }
}

#[derive(Serialize)]
struct CohereRequest {
    model: String,
    messages: Vec<CohereMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct CohereMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct CohereResponse {
    message: CohereResponseMessage,
}

#[derive(Deserialize)]
struct CohereResponseMessage {
    #[serde(default)]
    content: Vec<CohereContentBlock>,
}

#[derive(Deserialize)]
struct CohereContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn settings(url: Option<String>) -> ProviderSettings {
        ProviderSettings {
            api_key: Some("co-test".into()),
            model: None,
            endpoint: url,
        }
    }

    #[test]
    fn requires_api_key() {
        let err = CohereClient::new(&ProviderSettings::default(), 300, Duration::from_secs(5))
            .expect_err("missing key should error");
        assert!(err.to_string().contains("COHERE_API_KEY"));
    }

    #[test]
    fn response_ignores_non_text_blocks() {
        let parsed: CohereResponse = serde_json::from_value(json!({
            "message": {
                "role": "assistant",
                "content": [
                    {"type": "thinking"},
                    {"type": "text", "text": "Confidence: 0.7"}
                ]
            }
        }))
        .unwrap();
        let texts: Vec<_> = parsed
            .message
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        assert_eq!(texts, ["Confidence: 0.7"]);
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn generate_reads_text_blocks() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/chat")
                .header("authorization", "Bearer co-test");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "message": {
                        "role": "assistant",
                        "content": [{"type": "text", "text": "Recommended Action: Request fix"}]
                    }
                }));
        });

        let client =
            CohereClient::new(&settings(Some(server.base_url())), 300, Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.model_id(), "command-r");
        let text = client.generate("prompt").await.unwrap();
        assert_eq!(text, "Recommended Action: Request fix");
        mock.assert();
    }
}
