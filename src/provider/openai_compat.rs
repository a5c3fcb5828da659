// src/provider/openai_compat.rs — OpenAI-compatible chat-completions oracle
//
// Covers the hosted OpenAI API and any local endpoint speaking the same
// protocol (Ollama, vLLM, llama.cpp server) via a custom base URL.

use async_trait::async_trait;

use super::{CompletionRequest, Oracle};
use crate::infra::errors::RedraftError;

pub struct OpenAiCompatOracle {
    id: &'static str,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatOracle {
    pub fn new(
        id: &'static str,
        base_url: String,
        api_key: String,
        model: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            id,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }

    pub fn openai(api_key: String, model: String, max_tokens: u32) -> Self {
        Self::new(
            "openai",
            "https://api.openai.com/v1".into(),
            api_key,
            model,
            max_tokens,
        )
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Oracle for OpenAiCompatOracle {
    fn id(&self) -> &str {
        self.id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, RedraftError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": request.temperature,
            "n": 1,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
        });

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RedraftError::Provider {
                provider: self.id.into(),
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
                provider: self.id.into(),
                retry_after_ms,
            });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RedraftError::Provider {
                provider: self.id.into(),
                message: format!("HTTP {status}: {text}"),
                retriable: status.is_server_error(),
            });
        }

        let json: serde_json::Value =
            response.json().await.map_err(|e| RedraftError::Provider {
                provider: self.id.into(),
                message: format!("invalid response body: {e}"),
                retriable: false,
            })?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(content)
    }
}
