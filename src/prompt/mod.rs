// src/prompt/mod.rs — Prompt envelopes for oracle calls
//
// A template carries the fixed system-instruction sections; an envelope binds
// it to the named context blocks of one call. Escalated retries derive a
// tightened envelope from the ORIGINAL template plus a fixed-size addendum —
// corrective instructions never stack across attempts.

pub mod critics;

use serde_json::{json, Value};

use crate::decode::shape::{with_decode_diagnostics, Shape, DIAG_KEY};

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub role: String,
    pub purpose: String,
    pub lang: String,
    pub guiding_principles: Vec<String>,
    pub instructions: Vec<String>,
    pub validation: Vec<String>,
    pub examples: Vec<Value>,
    pub schema: Shape,
}

impl PromptTemplate {
    pub fn system_prompt(&self) -> String {
        let mut parts = String::new();
        push_text_section(&mut parts, "role", &self.role);
        push_text_section(&mut parts, "purpose", &self.purpose);
        push_text_section(&mut parts, "lang", &self.lang);
        push_list_section(&mut parts, "guiding_principles", &self.guiding_principles, false);
        push_list_section(&mut parts, "instructions", &self.instructions, true);
        push_list_section(&mut parts, "validation", &self.validation, false);
        if !self.examples.is_empty() {
            push_json_section(&mut parts, "examples", &Value::Array(self.examples.clone()));
        }
        push_json_section(&mut parts, "output_schema", &self.schema.render());
        parts.trim_end().to_string()
    }
}

fn push_text_section(out: &mut String, tag: &str, content: &str) {
    if content.is_empty() {
        return;
    }
    out.push_str(&format!("<{tag}>\n{content}\n</{tag}>\n\n"));
}

fn push_list_section(out: &mut String, tag: &str, items: &[String], numbered: bool) {
    if items.is_empty() {
        return;
    }
    let body: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if numbered {
                format!("{}. {item}", i + 1)
            } else {
                format!("- {item}")
            }
        })
        .collect();
    out.push_str(&format!("<{tag}>\n{}\n</{tag}>\n\n", body.join("\n")));
}

fn push_json_section(out: &mut String, tag: &str, content: &Value) {
    let rendered = serde_json::to_string_pretty(content).unwrap_or_default();
    out.push_str(&format!("<{tag}>\n{rendered}\n</{tag}>\n\n"));
}

/// A template bound to one call's named context blocks.
#[derive(Debug, Clone)]
pub struct PromptEnvelope {
    pub template: PromptTemplate,
    pub context: Vec<(String, String)>,
}

impl PromptEnvelope {
    pub fn new(template: PromptTemplate, context: Vec<(&str, &str)>) -> Self {
        Self {
            template,
            context: context
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn system_prompt(&self) -> String {
        self.template.system_prompt()
    }

    pub fn user_prompt(&self) -> String {
        let mut parts = String::new();
        for (tag, content) in &self.context {
            push_text_section(&mut parts, tag, content);
        }
        parts.trim_end().to_string()
    }

    /// Derive the escalated-retry envelope: same context, base template plus
    /// corrective instructions, an augmented schema, a minimal example, and
    /// the attempt diagnostics.
    pub fn tightened(&self, retry: &RetryContext) -> PromptEnvelope {
        let base = &self.template;
        let effective_schema = with_decode_diagnostics(&base.schema);

        let mut guiding_principles = base.guiding_principles.clone();
        guiding_principles.extend([
            "Output EXACTLY ONE JSON object (no prose, no code fences).".to_string(),
            "Keys and value types MUST match <output_schema> exactly.".to_string(),
            "Do NOT invent content; if unknown or off-limits, use an empty string or empty array.".to_string(),
            format!("Populate '{DIAG_KEY}' with concise diagnostics."),
        ]);

        let mut instructions = base.instructions.clone();
        instructions.extend([
            "Produce the JSON directly without any preface or explanation.".to_string(),
            "Ensure every required key from <output_schema> is present.".to_string(),
            "For arrays use [] and for strings use \"\" when no content can be provided.".to_string(),
        ]);

        let mut validation = base.validation.clone();
        validation.extend([
            "The final answer MUST parse as JSON.".to_string(),
            "All required top-level keys exist; no extra top-level keys.".to_string(),
            "All value types match exactly.".to_string(),
            format!("Include '{DIAG_KEY}' with root_cause and the attempt count."),
        ]);

        if !retry.missing_keys.is_empty() {
            instructions.push(format!(
                "Add the missing keys exactly as listed: {:?}.",
                retry.missing_keys
            ));
            validation.push(format!(
                "Confirm the following keys now exist: {:?}.",
                retry.missing_keys
            ));
        }

        let mut examples = base.examples.clone();
        let mut example_min = effective_schema.minimal_example();
        if let Some(map) = example_min.as_object_mut() {
            map.insert(DIAG_KEY.to_string(), retry.diagnostic_block());
        }
        examples.push(example_min);
        examples.push(json!({ "retry_reason": retry.cause.as_str() }));
        if !retry.missing_keys.is_empty() {
            examples.push(json!({ "missing_keys": &retry.missing_keys }));
        }

        PromptEnvelope {
            template: PromptTemplate {
                role: base.role.clone(),
                purpose: base.purpose.clone(),
                lang: base.lang.clone(),
                guiding_principles,
                instructions,
                validation,
                examples,
                schema: effective_schema,
            },
            context: self.context.clone(),
        }
    }
}

/// Why the previous attempt failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCause {
    NoJsonCandidate,
    MissingKeys,
}

impl RetryCause {
    pub fn as_str(self) -> &'static str {
        match self {
            RetryCause::NoJsonCandidate => "NO_JSON_CANDIDATE_FOUND",
            RetryCause::MissingKeys => "MISSING_KEYS",
        }
    }
}

/// Per-attempt diagnostic state threaded into escalated prompts. Built fresh
/// for each failed attempt and dropped once a clean match returns.
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub attempt: u32,
    pub cause: RetryCause,
    pub missing_keys: Vec<String>,
}

impl RetryContext {
    pub fn diagnostic_block(&self) -> Value {
        json!({
            "attempts": self.attempt + 1,
            "root_cause": self.cause.as_str(),
            "parser_errors": [],
            "missing_keys": &self.missing_keys,
            "selected_fix": "schema_enforced_retry",
            "notes": ["auto example"],
        })
    }
}
