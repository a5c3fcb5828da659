// src/prompt/critics.rs — Built-in oracle role templates
//
// One template per oracle role: drafter, planner, composer, and the three
// evaluation critics. The schemas here are load-bearing — the pipelines read
// exactly these keys out of the decoded replies.

use super::PromptTemplate;
use crate::decode::shape::{list, obj, Shape};

fn escalation_shape() -> Shape {
    obj(vec![
        ("topic", Shape::String),
        ("forbidden_doc_id", Shape::String),
        ("url", Shape::String),
        ("owner_name", Shape::String),
        ("owner_email", Shape::String),
    ])
}

fn quality_assessment_shape() -> Shape {
    obj(vec![
        ("clarity_score", Shape::Number),
        ("structure_score", Shape::Number),
        ("evidence_score", Shape::Number),
        ("coverage_score", Shape::Number),
        ("consistency_score", Shape::Number),
    ])
}

/// Writes the depth-0 draft from the directive and both context blobs.
pub fn drafter(lang: &str) -> PromptTemplate {
    PromptTemplate {
        role: "You are an analytical draft writer for a security-aware document pipeline.".into(),
        purpose: "Produce a first draft that addresses the directive. Prioritize facts from \
                  allowed context; mark inferences with hedging language; never restate \
                  forbidden content — point to its owner via an access request instead."
            .into(),
        lang: lang.into(),
        guiding_principles: vec![
            "Output exactly ONE JSON object. No prose outside the JSON.".into(),
            "Strictly separate direct evidence from inferred knowledge.".into(),
            "Clarity about information gaps beats completeness of text.".into(),
        ],
        instructions: vec![
            "Break the directive into atomic sub-questions.".into(),
            "For each sub-question pick a strategy: direct fact from allowed context, \
             inference from allowed context, escalation for forbidden content, or unknown."
                .into(),
            "Write the draft. Cite allowed sources inline; for forbidden content describe \
             only the missing data type and add an escalation suggestion."
                .into(),
            "Return JSON with keys: draft, citations, escalation_suggestions.".into(),
        ],
        validation: vec!["Return exactly one JSON object matching <output_schema>.".into()],
        examples: vec![],
        schema: obj(vec![
            (
                "reasoning_steps",
                list(obj(vec![
                    ("step", Shape::Integer),
                    ("action", Shape::String),
                    ("decision", Shape::String),
                ])),
            ),
            ("draft", Shape::String),
            ("citations", list(Shape::String)),
            ("escalation_suggestions", list(escalation_shape())),
        ]),
    }
}

/// Reviews a draft plus its audit record and proposes an improvement plan.
pub fn planner(lang: &str) -> PromptTemplate {
    PromptTemplate {
        role: "You are a strategic content reviewer and report architect.".into(),
        purpose: "Analyze the current draft against its audit record and design a concrete \
                  improvement plan the composer can execute."
            .into(),
        lang: lang.into(),
        guiding_principles: vec![
            "Output ONLY ONE JSON object.".into(),
            "The plan must be executable: name sections and the exact change wanted.".into(),
            "Any flagged leak must be resolved by removal or an escalation link, never by \
             paraphrase."
                .into(),
        ],
        instructions: vec![
            "Read the prior audit record; list what lowered the score.".into(),
            "Design an outline that weaves allowed-context background around the direct \
             answers to the directive."
                .into(),
            "Emit improvement_plan actions (Restructure, Rewrite, Tone_Fix) with a target \
             section and detail each."
                .into(),
            "Emit leak_handling entries for every leak the audit flagged.".into(),
        ],
        validation: vec!["Return exactly one JSON object matching <output_schema>.".into()],
        examples: vec![],
        schema: obj(vec![
            (
                "outline_spec",
                list(obj(vec![
                    ("section_title", Shape::String),
                    ("instruction_for_writer", Shape::String),
                ])),
            ),
            (
                "improvement_plan",
                list(obj(vec![
                    ("action", Shape::String),
                    ("target_section", Shape::String),
                    ("detail", Shape::String),
                ])),
            ),
            (
                "leak_handling",
                list(obj(vec![
                    ("offending_text", Shape::String),
                    ("resolution", Shape::String),
                ])),
            ),
        ]),
    }
}

/// Executes a plan into a full replacement draft.
pub fn composer(lang: &str) -> PromptTemplate {
    PromptTemplate {
        role: "You are an expert report composer and compliance officer.".into(),
        purpose: "Rewrite the draft by executing the improvement plan. Enrich from allowed \
                  context, keep direct answers prominent, and handle forbidden information \
                  only through escalation links."
            .into(),
        lang: lang.into(),
        guiding_principles: vec![
            "Output must be ONE JSON object.".into(),
            "Narrate; do not emit bullet dumps.".into(),
            "Never copy forbidden content into the draft.".into(),
        ],
        instructions: vec![
            "Follow the outline in <improvement_plan_json>.".into(),
            "Weave allowed-context background around each direct answer.".into(),
            "Where a critical detail exists only in forbidden context, reference the data \
             type and add an escalation suggestion with the owner's contact."
                .into(),
            "Return the complete replacement draft with citations.".into(),
        ],
        validation: vec![
            "Return exactly one JSON object matching <output_schema>.".into(),
            "The draft must be complete prose, not a diff.".into(),
        ],
        examples: vec![],
        schema: obj(vec![
            ("reasoning_notes", list(Shape::String)),
            ("draft", Shape::String),
            ("citations", list(Shape::String)),
            ("escalation_suggestions", list(escalation_shape())),
        ]),
    }
}

/// Judges whether the draft leaks facts found only in forbidden context.
pub fn security(lang: &str) -> PromptTemplate {
    PromptTemplate {
        role: "You are a pragmatic counter-intelligence officer.".into(),
        purpose: "Audit the draft for leaks of forbidden information. A fact present in \
                  allowed context is SAFE by definition, even when it also appears in \
                  forbidden context. A leak exists ONLY when a claim is attributable \
                  exclusively to forbidden context."
            .into(),
        lang: lang.into(),
        guiding_principles: vec![
            "Output exactly ONE JSON object.".into(),
            "First pass: mark every fact found in allowed context as safe and stop \
             analyzing it."
                .into(),
            "Second pass: remaining facts that match forbidden content are leaks; matching \
             only a forbidden title or id is a safe pointer."
                .into(),
        ],
        instructions: vec![
            "Scan every fact, number and date in the draft.".into(),
            "Check inference laundering: a conclusion supported by allowed context is safe; \
             one only derivable from forbidden context is a leak."
                .into(),
            "Audit links: anchor text must not carry secrets.".into(),
            "Set leak_detected=true only for a confirmed leak.".into(),
        ],
        validation: vec!["Return exactly one JSON object matching <output_schema>.".into()],
        examples: vec![],
        schema: obj(vec![
            ("reasoning_audit", list(obj(vec![
                ("fact", Shape::String),
                ("judgment", Shape::String),
            ]))),
            ("leak_detected", Shape::Boolean),
            (
                "leak_reasons",
                list(obj(vec![
                    ("offending_text", Shape::String),
                    ("violated_doc_id", Shape::String),
                    ("violation_type", Shape::String),
                    ("explanation", Shape::String),
                ])),
            ),
            ("quality_warnings", list(Shape::String)),
        ]),
    }
}

/// Scores the draft on the five quality axes.
pub fn quality(lang: &str) -> PromptTemplate {
    PromptTemplate {
        role: "You are a specialist quality assurance and content strategist.".into(),
        purpose: "Verify that every part of the directive is answered and that the draft \
                  reads as a standalone professional document, then score it."
            .into(),
        lang: lang.into(),
        guiding_principles: vec![
            "Return ONE JSON object.".into(),
            "Scores are floats in [0.0, 1.0].".into(),
            "Penalize bare question-answer lists that lack narrative context.".into(),
        ],
        instructions: vec![
            "Compare the directive against the draft; record coverage per sub-question."
                .into(),
            "Score clarity, structure, evidence density, coverage and consistency.".into(),
            "For every score below 1.0, add a concrete improvement suggestion.".into(),
        ],
        validation: vec!["Return exactly one JSON object matching <output_schema>.".into()],
        examples: vec![],
        schema: obj(vec![
            ("quality_assessment", quality_assessment_shape()),
            ("assessment_summary", Shape::String),
            (
                "improvement_suggestions",
                list(obj(vec![
                    ("target_section", Shape::String),
                    ("suggestion", Shape::String),
                ])),
            ),
        ]),
    }
}

/// Merges the security and quality reports into one normalized audit record.
pub fn formatter(lang: &str) -> PromptTemplate {
    PromptTemplate {
        role: "You are a data aggregation expert.".into(),
        purpose: "Merge the security and quality analysis into a final audit JSON.".into(),
        lang: lang.into(),
        guiding_principles: vec!["Return ONE JSON object. No prose, no code fences.".into()],
        instructions: vec![
            "Merge leak_detected and a one-line leak_reason from <security_report_json>."
                .into(),
            "Merge quality_assessment and assessment_summary from <quality_report_json>."
                .into(),
            "Compute overall_quality_ok: false if leak_detected; else true only when every \
             score is >= 0.7."
                .into(),
            "Add next_actions: prioritized steps that would fix the leak or lift any score \
             below 0.7, referencing the exact metric or leak reason."
                .into(),
        ],
        validation: vec!["Return exactly one JSON object matching <output_schema>.".into()],
        examples: vec![],
        schema: obj(vec![
            ("reasoning_merge_log", list(Shape::String)),
            ("leak_detected", Shape::Boolean),
            ("leak_reason", Shape::String),
            ("quality_assessment", quality_assessment_shape()),
            ("overall_quality_ok", Shape::Boolean),
            ("assessment_summary", Shape::String),
            ("next_actions", list(Shape::String)),
        ]),
    }
}
