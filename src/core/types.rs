// src/core/types.rs — Core domain types for the refinement search

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// SHA-256 content hash of a draft's text, hex-encoded. Keys the visited set
/// and the parent lineage references.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// A request for access to a forbidden source, surfaced instead of its content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EscalationSuggestion {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub forbidden_doc_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub owner_email: String,
}

/// Raw composer output: a draft plus its supporting records, before scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftState {
    #[serde(default)]
    pub draft: String,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub escalation_suggestions: Vec<EscalationSuggestion>,
}

impl DraftState {
    /// Lenient extraction from a decoded oracle object. Missing or mistyped
    /// fields fall back to empty rather than failing the branch.
    pub fn from_reply(reply: &Map<String, Value>) -> Self {
        let draft = reply
            .get("draft")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let citations = reply
            .get("citations")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let escalation_suggestions = reply
            .get("escalation_suggestions")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            draft,
            citations,
            escalation_suggestions,
        }
    }
}

/// Per-axis quality scores, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    #[serde(default)]
    pub clarity: f64,
    #[serde(default)]
    pub structure: f64,
    #[serde(default)]
    pub evidence: f64,
    #[serde(default)]
    pub coverage: f64,
    #[serde(default)]
    pub consistency: f64,
}

impl QualityScores {
    pub fn all_at_least(&self, threshold: f64) -> bool {
        [
            self.clarity,
            self.structure,
            self.evidence,
            self.coverage,
            self.consistency,
        ]
        .iter()
        .all(|s| *s >= threshold)
    }
}

/// The normalized audit record attached to every scored node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditMetrics {
    pub score: f64,
    pub leak_detected: bool,
    #[serde(default)]
    pub leak_reason: String,
    #[serde(default)]
    pub quality: QualityScores,
    #[serde(default)]
    pub overall_quality_ok: bool,
    #[serde(default)]
    pub assessment_summary: String,
    #[serde(default)]
    pub next_actions: Vec<String>,
}

/// One candidate document in the search tree. Immutable once built:
/// refinement always produces a new node at depth + 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftNode {
    pub draft: String,
    pub citations: Vec<String>,
    pub escalation_suggestions: Vec<EscalationSuggestion>,
    pub metrics: AuditMetrics,
    pub depth: u32,
    pub parent_hash: Option<String>,
    pub revisit_count: u32,
}

impl DraftNode {
    pub fn root(state: DraftState, metrics: AuditMetrics) -> Self {
        Self {
            draft: state.draft,
            citations: state.citations,
            escalation_suggestions: state.escalation_suggestions,
            metrics,
            depth: 0,
            parent_hash: None,
            revisit_count: 0,
        }
    }

    pub fn child_of(parent_hash: &str, depth: u32, state: DraftState, metrics: AuditMetrics) -> Self {
        Self {
            draft: state.draft,
            citations: state.citations,
            escalation_suggestions: state.escalation_suggestions,
            metrics,
            depth,
            parent_hash: Some(parent_hash.to_string()),
            revisit_count: 0,
        }
    }

    pub fn content_hash(&self) -> String {
        hash_text(&self.draft)
    }
}
