// src/decode/mod.rs — Resilient structured decoding around oracle calls
//
// The search engine may never see a decoding error: every oracle call either
// yields a schema-exact object or a degraded raw-text fallback the caller
// treats as a failed critic. Two bounded loops stand between those outcomes:
// an escalating-prompt retry at fixed temperature, and a temperature sweep
// around it.

pub mod extract;
pub mod shape;

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::infra::errors::RedraftError;
use crate::prompt::{PromptEnvelope, RetryCause, RetryContext};
use crate::provider::{CompletionRequest, Oracle};
use crate::util::truncate_str;
use extract::{decode, Decoded};
use shape::{missing_key_paths, DIAG_KEY};

/// Terminal result of one schema-enforced oracle call.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredReply {
    /// Schema-exact object.
    Object(Map<String, Value>),
    /// Retry budget exhausted; the last raw oracle text, unstructured.
    Degraded(String),
}

impl StructuredReply {
    pub fn into_object(self) -> Option<Map<String, Value>> {
        match self {
            StructuredReply::Object(map) => Some(map),
            StructuredReply::Degraded(_) => None,
        }
    }
}

/// Temperature-escalation schedule for one oracle role.
#[derive(Debug, Clone, Copy)]
pub struct TempSweep {
    pub base: f32,
    pub max: f32,
    pub step: f32,
    pub retries_per_temp: u32,
}

#[derive(Clone)]
pub struct StructuredDecoder {
    oracle: Arc<dyn Oracle>,
    max_retries: u32,
    max_tokens: u32,
}

impl StructuredDecoder {
    pub fn new(oracle: Arc<dyn Oracle>, max_retries: u32, max_tokens: u32) -> Self {
        Self {
            oracle,
            max_retries,
            max_tokens,
        }
    }

    async fn call_oracle(
        &self,
        envelope: &PromptEnvelope,
        temperature: f32,
    ) -> Result<String, RedraftError> {
        self.oracle
            .complete(CompletionRequest {
                system: envelope.system_prompt(),
                user: envelope.user_prompt(),
                temperature,
                max_tokens: self.max_tokens,
            })
            .await
    }

    /// One schema-enforced oracle call: decode, escalate the prompt on each
    /// failure, give back the raw text once the attempt budget is spent.
    pub async fn request(&self, envelope: &PromptEnvelope, temperature: f32) -> StructuredReply {
        let mut current = envelope.clone();
        let mut last_raw = String::new();

        for attempt in 0..=self.max_retries {
            let raw = match self.call_oracle(&current, temperature).await {
                Ok(raw) => raw,
                Err(e) => {
                    // a dead transport attempt spends budget like a bad reply
                    tracing::warn!(attempt, "oracle call failed: {e}");
                    continue;
                }
            };
            last_raw = raw;

            match decode(&last_raw, &envelope.template.schema) {
                Decoded::Matched(mut map) => {
                    if attempt > 0 && !map.contains_key(DIAG_KEY) {
                        map.insert(DIAG_KEY.to_string(), auto_diagnostic(attempt));
                    }
                    return StructuredReply::Object(map);
                }
                Decoded::Unparsable => {
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        "no JSON candidate in oracle reply: {}",
                        truncate_str(&last_raw, 200)
                    );
                    current = envelope.tightened(&RetryContext {
                        attempt,
                        cause: RetryCause::NoJsonCandidate,
                        missing_keys: Vec::new(),
                    });
                }
                Decoded::Partial { violations, .. } => {
                    let missing_keys = missing_key_paths(&violations);
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        violations = violations.len(),
                        missing = ?missing_keys,
                        "partial schema match"
                    );
                    current = envelope.tightened(&RetryContext {
                        attempt,
                        cause: RetryCause::MissingKeys,
                        missing_keys,
                    });
                }
            }
        }

        tracing::error!("failed to decode a structured reply after schema-enforced retries");
        StructuredReply::Degraded(last_raw)
    }

    /// Temperature-escalation sweep: a few tries per level, stepping toward
    /// the role maximum. `None` when the whole sweep never yields an object.
    pub async fn sweep(
        &self,
        envelope: &PromptEnvelope,
        sweep: &TempSweep,
    ) -> Option<Map<String, Value>> {
        let mut temperature = sweep.base;
        while temperature <= sweep.max + 1e-4 {
            for _ in 0..sweep.retries_per_temp {
                if let Some(map) = self.request(envelope, temperature).await.into_object() {
                    return Some(map);
                }
            }
            temperature += sweep.step;
        }
        tracing::warn!("temperature sweep exhausted without a structured object");
        None
    }
}

/// Diagnostic inserted when a retried call finally succeeds but the oracle
/// skipped the report, so consumers can still tell the answer needed retries.
fn auto_diagnostic(attempt: u32) -> Value {
    json!({
        "attempts": attempt + 1,
        "root_cause": "not_provided",
        "parser_errors": [],
        "missing_keys": [],
        "selected_fix": "not_provided",
        "notes": ["auto-filled"],
    })
}
