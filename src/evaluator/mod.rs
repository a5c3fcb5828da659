// src/evaluator/mod.rs — Three-stage critic evaluation of a draft
//
// Security, quality, formatter — strictly in that order: the security
// verdict feeds both the quality-stage fallback and the formatter merge.
// Every stage degrades instead of failing; a draft always comes back with a
// score and an audit record.

use serde_json::{Map, Value};

use crate::core::types::{AuditMetrics, DraftState, QualityScores};
use crate::decode::{StructuredDecoder, TempSweep};
use crate::prompt::{critics, PromptEnvelope};

const CRITIC_SWEEP: TempSweep = TempSweep {
    base: 0.0,
    max: 0.4,
    step: 0.2,
    retries_per_temp: 2,
};

/// Score a draft never decodable by the security critic.
const SECURITY_FAIL_SCORE: f64 = -100.0;
/// Score a draft whose quality critic never decodes.
const QUALITY_FAIL_SCORE: f64 = -50.0;
/// Every quality subscore must clear this for overall acceptance.
const QUALITY_OK_THRESHOLD: f64 = 0.7;

/// Canonical fitness formula, applied identically by the formatter path and
/// every local fallback. The -100 leak term ranks leaking drafts far below
/// any safe draft without hard-excluding them from the frontier.
pub fn score_audit(clarity: f64, structure: f64, evidence: f64, leak: bool) -> f64 {
    0.3 * clarity + 0.4 * structure + 0.3 * evidence - 100.0 * if leak { 1.0 } else { 0.0 }
}

pub struct EvaluationPipeline {
    decoder: StructuredDecoder,
    lang: String,
}

impl EvaluationPipeline {
    pub fn new(decoder: StructuredDecoder, lang: impl Into<String>) -> Self {
        Self {
            decoder,
            lang: lang.into(),
        }
    }

    /// Turn a draft into a scalar fitness score plus its audit record.
    pub async fn evaluate(
        &self,
        state: &DraftState,
        directive: &str,
        allowed: &str,
        forbidden: &str,
    ) -> (f64, AuditMetrics) {
        // === Stage 1: security critic ===
        let security_envelope = PromptEnvelope::new(
            critics::security(&self.lang),
            vec![
                ("draft_to_evaluate", state.draft.as_str()),
                ("allowed_context", allowed),
                ("forbidden_context", forbidden),
            ],
        );
        let Some(security_report) = self.decoder.sweep(&security_envelope, &CRITIC_SWEEP).await
        else {
            tracing::warn!("security report is missing; treating draft as leaking");
            let metrics = AuditMetrics {
                score: SECURITY_FAIL_SCORE,
                leak_detected: true,
                leak_reason: "security critic returned no structured verdict".into(),
                ..Default::default()
            };
            return (SECURITY_FAIL_SCORE, metrics);
        };

        // === Stage 2: quality critic ===
        let quality_envelope = PromptEnvelope::new(
            critics::quality(&self.lang),
            vec![
                ("directive", directive),
                ("draft_to_evaluate", state.draft.as_str()),
                ("allowed_context", allowed),
            ],
        );
        let Some(quality_report) = self.decoder.sweep(&quality_envelope, &CRITIC_SWEEP).await
        else {
            tracing::warn!("quality report is missing; scoring draft as low quality");
            let metrics = AuditMetrics {
                score: QUALITY_FAIL_SCORE,
                leak_detected: get_bool(&security_report, "leak_detected", true),
                leak_reason: leak_summary(&security_report),
                quality: QualityScores::default(),
                overall_quality_ok: false,
                assessment_summary: "quality critic returned no structured assessment".into(),
                next_actions: Vec::new(),
            };
            return (QUALITY_FAIL_SCORE, metrics);
        };

        // === Stage 3: formatter critic ===
        let security_json = Value::Object(security_report.clone()).to_string();
        let quality_json = Value::Object(quality_report.clone()).to_string();
        let formatter_envelope = PromptEnvelope::new(
            critics::formatter(&self.lang),
            vec![
                ("security_report_json", security_json.as_str()),
                ("quality_report_json", quality_json.as_str()),
            ],
        );
        let Some(audit) = self.decoder.sweep(&formatter_envelope, &CRITIC_SWEEP).await else {
            tracing::warn!("formatter report is missing; merging reports locally");
            let metrics = merge_reports(&security_report, &quality_report);
            return (metrics.score, metrics);
        };

        let quality = quality_scores_from(&audit);
        let leak_detected = get_bool(&audit, "leak_detected", true);
        let score = score_audit(quality.clarity, quality.structure, quality.evidence, leak_detected);

        let metrics = AuditMetrics {
            score,
            leak_detected,
            leak_reason: get_str(&audit, "leak_reason"),
            quality,
            overall_quality_ok: get_bool(&audit, "overall_quality_ok", false),
            assessment_summary: get_str(&audit, "assessment_summary"),
            next_actions: get_str_list(&audit, "next_actions"),
        };
        tracing::debug!(score, "final evaluator score");
        (score, metrics)
    }
}

/// Local stand-in for the formatter critic: same record, same formula.
fn merge_reports(security: &Map<String, Value>, quality: &Map<String, Value>) -> AuditMetrics {
    let leak_detected = get_bool(security, "leak_detected", true);
    let quality_scores = quality_scores_from(quality);
    let score = score_audit(
        quality_scores.clarity,
        quality_scores.structure,
        quality_scores.evidence,
        leak_detected,
    );
    AuditMetrics {
        score,
        leak_detected,
        leak_reason: leak_summary(security),
        quality: quality_scores,
        overall_quality_ok: !leak_detected && quality_scores.all_at_least(QUALITY_OK_THRESHOLD),
        assessment_summary: get_str(quality, "assessment_summary"),
        next_actions: Vec::new(),
    }
}

/// Read the five quality axes out of a report's `quality_assessment` block.
fn quality_scores_from(report: &Map<String, Value>) -> QualityScores {
    let Some(block) = report.get("quality_assessment").and_then(Value::as_object) else {
        return QualityScores::default();
    };
    QualityScores {
        clarity: get_f64(block, "clarity_score"),
        structure: get_f64(block, "structure_score"),
        evidence: get_f64(block, "evidence_score"),
        coverage: get_f64(block, "coverage_score"),
        consistency: get_f64(block, "consistency_score"),
    }
}

/// One-line leak summary from the security critic's reason list.
fn leak_summary(security: &Map<String, Value>) -> String {
    security
        .get("leak_reasons")
        .and_then(Value::as_array)
        .and_then(|reasons| reasons.first())
        .and_then(|r| r.get("explanation"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn get_f64(map: &Map<String, Value>, key: &str) -> f64 {
    map.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn get_bool(map: &Map<String, Value>, key: &str, default: bool) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn get_str(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn get_str_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
