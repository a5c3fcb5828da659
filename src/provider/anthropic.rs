// src/provider/anthropic.rs — Anthropic Messages API oracle

use async_trait::async_trait;

use super::{CompletionRequest, Oracle};
use crate::infra::errors::RedraftError;

pub struct AnthropicOracle {
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicOracle {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            api_key,
            model,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> &str {
        "https://api.anthropic.com/v1/messages"
    }

    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": [{ "role": "user", "content": request.user }],
        })
    }
}

#[async_trait]
impl Oracle for AnthropicOracle {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, RedraftError> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(self.api_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| RedraftError::Provider {
                provider: "anthropic".into(),
                message: e.to_string(),
                retriable: true,
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(0);
            return Err(RedraftError::RateLimited {
                provider: "anthropic".into(),
                retry_after_ms,
            });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RedraftError::Provider {
                provider: "anthropic".into(),
                message: format!("HTTP {status}: {text}"),
                retriable: status.is_server_error(),
            });
        }

        let json: serde_json::Value =
            response.json().await.map_err(|e| RedraftError::Provider {
                provider: "anthropic".into(),
                message: format!("invalid response body: {e}"),
                retriable: false,
            })?;

        let content = json["content"]
            .as_array()
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|b| b["type"] == "text")
                    .and_then(|b| b["text"].as_str())
            })
            .unwrap_or_default()
            .to_string();

        Ok(content)
    }
}
