// src/core/actions.rs — Draft expansion: plan, then compose
//
// Structural edits want more determinism than free-form scoring, so both
// sweeps here run cooler than the evaluation critics.

use serde_json::Value;

use crate::decode::{StructuredDecoder, TempSweep};
use crate::prompt::{critics, PromptEnvelope};
use crate::util::truncate_str;

use super::types::{DraftNode, DraftState};

const PLANNER_SWEEP: TempSweep = TempSweep {
    base: 0.1,
    max: 0.6,
    step: 0.2,
    retries_per_temp: 2,
};

const COMPOSER_SWEEP: TempSweep = TempSweep {
    base: 0.0,
    max: 0.5,
    step: 0.2,
    retries_per_temp: 2,
};

const DRAFTER_SWEEP: TempSweep = TempSweep {
    base: 0.1,
    max: 0.7,
    step: 0.2,
    retries_per_temp: 2,
};

pub struct ActionPipeline {
    decoder: StructuredDecoder,
    lang: String,
}

impl ActionPipeline {
    pub fn new(decoder: StructuredDecoder, lang: impl Into<String>) -> Self {
        Self {
            decoder,
            lang: lang.into(),
        }
    }

    /// Expand a node into at most one improved child state.
    ///
    /// Either sub-call failing to decode prunes the branch silently: the
    /// caller gets an empty list, never an error.
    pub async fn expand(
        &self,
        parent: &DraftNode,
        directive: &str,
        allowed: &str,
        forbidden: &str,
    ) -> Vec<DraftState> {
        tracing::debug!(
            depth = parent.depth,
            draft = truncate_str(&parent.draft, 120),
            "running action pipeline"
        );

        let prior_audit = serde_json::to_string(&parent.metrics).unwrap_or_default();
        let planner_envelope = PromptEnvelope::new(
            critics::planner(&self.lang),
            vec![
                ("directive", directive),
                ("current_draft", parent.draft.as_str()),
                ("allowed_context", allowed),
                ("prior_audit_json", prior_audit.as_str()),
            ],
        );

        let Some(plan) = self.decoder.sweep(&planner_envelope, &PLANNER_SWEEP).await else {
            tracing::info!("planner produced no structured plan; pruning branch");
            return Vec::new();
        };

        let plan_json = Value::Object(plan).to_string();
        let composer_envelope = PromptEnvelope::new(
            critics::composer(&self.lang),
            vec![
                ("directive", directive),
                ("original_draft", parent.draft.as_str()),
                ("improvement_plan_json", plan_json.as_str()),
                ("allowed_context", allowed),
                ("forbidden_context", forbidden),
            ],
        );

        let Some(reply) = self.decoder.sweep(&composer_envelope, &COMPOSER_SWEEP).await else {
            tracing::info!("composer produced no structured draft; pruning branch");
            return Vec::new();
        };

        let state = DraftState::from_reply(&reply);
        tracing::debug!(draft = truncate_str(&state.draft, 120), "composer finalized draft");
        vec![state]
    }

    /// Compose the depth-0 draft. A failed sweep yields an empty state so the
    /// search still runs and, at worst, returns the unmodified initial draft.
    pub async fn initial_draft(
        &self,
        directive: &str,
        allowed: &str,
        forbidden: &str,
    ) -> DraftState {
        let envelope = PromptEnvelope::new(
            critics::drafter(&self.lang),
            vec![
                ("directive", directive),
                ("allowed_context", allowed),
                ("forbidden_context", forbidden),
            ],
        );

        match self.decoder.sweep(&envelope, &DRAFTER_SWEEP).await {
            Some(reply) => DraftState::from_reply(&reply),
            None => {
                tracing::warn!("drafter produced no structured draft; starting from empty state");
                DraftState::default()
            }
        }
    }
}
