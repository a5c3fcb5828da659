// src/provider/mod.rs — Oracle provider layer

pub mod anthropic;
pub mod openai_compat;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::infra::config::Config;
use crate::infra::errors::RedraftError;

/// One blocking round trip to the generative text oracle.
///
/// Every critic, planner and composer call in the engine goes through this
/// trait; backends only need to turn (system, user, temperature) into text.
#[async_trait]
pub trait Oracle: Send + Sync {
    fn id(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<String, RedraftError>;
}

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Reference to a specific model on a specific provider.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Parse "provider/model" format
    pub fn parse(s: &str) -> Option<Self> {
        let (provider, model) = s.split_once('/')?;
        Some(Self {
            provider: provider.to_string(),
            model: model.to_string(),
        })
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";

/// Resolve an oracle from config + optional CLI override, based on which
/// credentials the environment carries. The result is wrapped in the
/// backoff-retrying adapter.
pub fn resolve(config: &Config, model_override: Option<&str>) -> Result<Arc<dyn Oracle>, RedraftError> {
    let spec = model_override
        .map(str::to_string)
        .or_else(|| config.models.oracle.clone());

    let model_ref = match spec {
        Some(ref s) => ModelRef::parse(s)
            .ok_or_else(|| RedraftError::Config(format!("model must be 'provider/model', got '{s}'")))?,
        None => default_model_ref()?,
    };

    let max_tokens = config.models.max_tokens;
    let inner: Arc<dyn Oracle> = match model_ref.provider.as_str() {
        "anthropic" => {
            let key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| RedraftError::NoProvider)?;
            Arc::new(anthropic::AnthropicOracle::new(key, model_ref.model.clone(), max_tokens))
        }
        "openai" => {
            let key = std::env::var("OPENAI_API_KEY").map_err(|_| RedraftError::NoProvider)?;
            Arc::new(openai_compat::OpenAiCompatOracle::openai(key, model_ref.model.clone(), max_tokens))
        }
        "local" => {
            let base = std::env::var("LOCAL_LLM_URL").map_err(|_| RedraftError::NoProvider)?;
            let key = std::env::var("LOCAL_LLM_API_KEY").unwrap_or_else(|_| "ollama".into());
            Arc::new(openai_compat::OpenAiCompatOracle::new(
                "local", base, key, model_ref.model.clone(), max_tokens,
            ))
        }
        other => {
            return Err(RedraftError::Config(format!("unknown provider '{other}'")));
        }
    };

    tracing::info!(oracle = %model_ref, "resolved oracle");
    Ok(Arc::new(retry::RetryOracle::new(inner)))
}

fn default_model_ref() -> Result<ModelRef, RedraftError> {
    if std::env::var("LOCAL_LLM_URL").is_ok() {
        let model = std::env::var("LOCAL_LLM_MODEL")
            .map_err(|_| RedraftError::Config("LOCAL_LLM_URL set but LOCAL_LLM_MODEL missing".into()))?;
        return Ok(ModelRef::new("local", model));
    }
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        return Ok(ModelRef::new("anthropic", DEFAULT_ANTHROPIC_MODEL));
    }
    if std::env::var("OPENAI_API_KEY").is_ok() {
        return Ok(ModelRef::new("openai", DEFAULT_OPENAI_MODEL));
    }
    Err(RedraftError::NoProvider)
}
