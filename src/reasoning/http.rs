//! OpenAI-compatible chat completions client.
//!
//! Works against any server exposing `POST {endpoint}/chat/completions` and
//! `GET {endpoint}/models` (Ollama, llama.cpp server, vLLM, hosted APIs).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ReasoningProvider;
use crate::config::ReasoningConfig;
use crate::error::{Error, Result};
use crate::resilience::health::HealthCheck;

pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: &ReasoningConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(Error::invalid_config("reasoning.endpoint", "must not be empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::invalid_config("reasoning", e.to_string()))?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

#[async_trait]
impl ReasoningProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
            stream: false,
        };

        let response = self
            .authorize(self.client.post(format!("{}/chat/completions", self.endpoint)))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::reasoning_failed(format!(
                "HTTP {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::reasoning_failed(format!("malformed response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::reasoning_failed("response had no content"))
    }

    async fn health_check(&self) -> HealthCheck {
        let request = self.authorize(self.client.get(format!("{}/models", self.endpoint)));
        match request.send().await {
            Ok(r) if r.status().is_success() => HealthCheck::ok(),
            Ok(r) => HealthCheck::failed(format!("HTTP {}", r.status())),
            Err(e) => HealthCheck::failed(Error::from(e).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_is_normalized() {
        let config = ReasoningConfig {
            endpoint: "http://localhost:11434/v1/".into(),
            ..ReasoningConfig::default()
        };
        let provider = OpenAiCompatibleProvider::new(&config).unwrap();
        assert_eq!(provider.endpoint, "http://localhost:11434/v1");
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let config = ReasoningConfig {
            endpoint: "  ".into(),
            ..ReasoningConfig::default()
        };
        let err = OpenAiCompatibleProvider::new(&config).err().unwrap();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"contradicts\":false}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("{\"contradicts\":false}")
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let config = ReasoningConfig {
            // nothing listens on the local discard port
            endpoint: "http://127.0.0.1:9/v1".into(),
            timeout_secs: 2,
            ..ReasoningConfig::default()
        };
        let provider = OpenAiCompatibleProvider::new(&config).unwrap();
        let err = provider.chat("hello").await.unwrap_err();
        assert!(err.is_retryable(), "got {err:?}");
        assert!(!provider.health_check().await.available);
    }
}
