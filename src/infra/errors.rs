// src/infra/errors.rs — Error types for Redraft

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedraftError {
    // Provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // User errors
    #[error("No provider configured. Set ANTHROPIC_API_KEY, OPENAI_API_KEY or LOCAL_LLM_URL.")]
    NoProvider,

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RedraftError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RedraftError::Provider {
                retriable: true,
                ..
            } | RedraftError::RateLimited { .. }
        )
    }
}
