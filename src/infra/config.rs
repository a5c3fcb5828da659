// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::errors::RedraftError;

const CONFIG_FILE: &str = "redraft.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub decode: DecodeConfig,
}

impl Config {
    /// Load from `./redraft.toml`, falling back to defaults when absent.
    pub fn load() -> Result<Self, RedraftError> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, RedraftError> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| RedraftError::Config(format!("{}: {e}", path.display())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Oracle model as "provider/model", e.g. "anthropic/claude-sonnet-4-20250514".
    pub oracle: Option<String>,
    pub max_tokens: u32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            oracle: None,
            max_tokens: 8192,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_depth: u32,
    pub beam_width: usize,
    pub max_trials: u32,
    pub epsilon: f64,
    pub explore_top_k: usize,
    pub revisit_penalty: f64,
    /// RNG seed for reproducible exploration. Entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            beam_width: 4,
            max_trials: 12,
            epsilon: 0.2,
            explore_top_k: 3,
            revisit_penalty: 0.05,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Schema-enforced retry attempts per oracle call, beyond the first.
    pub max_retries: u32,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self { max_retries: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.search.max_depth, 3);
        assert_eq!(cfg.search.beam_width, 4);
        assert_eq!(cfg.decode.max_retries, 10);
        assert!(cfg.models.oracle.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let cfg: Config = toml::from_str(
            r#"
[search]
max_depth = 5
beam_width = 8
max_trials = 40
epsilon = 0.1
explore_top_k = 2
revisit_penalty = 0.1
"#,
        )
        .unwrap();
        assert_eq!(cfg.search.max_depth, 5);
        assert_eq!(cfg.search.beam_width, 8);
        // untouched sections keep defaults
        assert_eq!(cfg.decode.max_retries, 10);
    }

    #[test]
    fn test_parse_models_section() {
        let cfg: Config = toml::from_str(
            r#"
[models]
oracle = "anthropic/claude-sonnet-4-20250514"
max_tokens = 4096
"#,
        )
        .unwrap();
        assert_eq!(
            cfg.models.oracle.as_deref(),
            Some("anthropic/claude-sonnet-4-20250514")
        );
        assert_eq!(cfg.models.max_tokens, 4096);
    }
}
