// src/decode/extract.rs — Pull a schema-shaped JSON object out of raw oracle text
//
// Oracles wrap their JSON in prose, code fences, tags, or label prefixes, and
// routinely emit almost-JSON (trailing commas, single quotes, bare keys).
// Extraction collects every plausible span, tries a raw parse then a lightly
// repaired parse per span, and keeps the candidate closest to the schema.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::shape::{diff, nfkc, Shape, Violation};

/// Outcome of decoding one oracle reply against a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Zero violations.
    Matched(Map<String, Value>),
    /// Best candidate found, with what is still wrong about it.
    Partial {
        value: Value,
        violations: Vec<Violation>,
    },
    /// Nothing in the text parses as JSON at all.
    Unparsable,
}

static FENCE_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```json\s+([\s\S]*?)```").unwrap());
static FENCE_BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```\s+([\s\S]*?)```").unwrap());
static TAG_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<json>([\s\S]*?)</json>").unwrap());
static LABEL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*json\s*[:=]?\s*(\{[\s\S]*\})\s*$").unwrap());

static CONTROL_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\x00-\x1F\x7F]").unwrap());
static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());
static BARE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|[{,\s])([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap());

fn strip_bom_ws(s: &str) -> &str {
    s.trim_start_matches('\u{feff}').trim()
}

/// Collect JSON-looking spans: fenced blocks, <json> tags, a bare
/// brace-to-brace body, and a `json: {...}` labeled body. Unbalanced opening
/// braces get their closers padded first. Deduplicated by (prefix, length),
/// longest candidates first.
pub fn candidate_spans(text: &str) -> Vec<String> {
    let mut text = text.to_string();
    let n_open = text.matches('{').count();
    let n_close = text.matches('}').count();
    if n_open > n_close {
        text.push_str(&"}".repeat(n_open - n_close));
    }
    let text = strip_bom_ws(&text);

    let mut candidates: Vec<String> = Vec::new();

    for re in [&*FENCE_JSON, &*FENCE_BARE, &*TAG_JSON] {
        for caps in re.captures_iter(text) {
            let block = strip_bom_ws(caps.get(1).map(|m| m.as_str()).unwrap_or(""));
            if block.starts_with('{') && block.ends_with('}') {
                candidates.push(block.to_string());
            }
        }
    }

    if text.starts_with('{') && text.ends_with('}') {
        candidates.push(text.to_string());
    }

    if let Some(caps) = LABEL_PREFIX.captures(text) {
        let block = strip_bom_ws(caps.get(1).map(|m| m.as_str()).unwrap_or(""));
        if block.starts_with('{') && block.ends_with('}') {
            candidates.push(block.to_string());
        }
    }

    candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));
    let mut seen = std::collections::HashSet::new();
    candidates.retain(|c| {
        let prefix_len = c.len().min(512);
        let mut end = prefix_len;
        while end > 0 && !c.is_char_boundary(end) {
            end -= 1;
        }
        seen.insert((c[..end].to_string(), c.len()))
    });
    candidates
}

/// Fix the classic almost-JSON defects: control characters, trailing commas,
/// single quotes, unquoted object keys.
pub fn light_repair(js: &str) -> String {
    let js = CONTROL_CHARS.replace_all(js, "");
    let js = TRAILING_COMMA.replace_all(&js, "$1");
    let js = js.replace('\'', "\"");
    BARE_KEY.replace_all(&js, "$1\"$2\":").into_owned()
}

/// Decode raw oracle text against a schema shape.
///
/// Returns on the first zero-violation candidate; otherwise the
/// lowest-penalty partial (ties broken by longer raw span, then the
/// unrepaired variant), or `Unparsable` when nothing parses.
pub fn decode(raw_text: &str, schema: &Shape) -> Decoded {
    let candidates = candidate_spans(raw_text);
    if candidates.is_empty() {
        return Decoded::Unparsable;
    }

    let required = schema.required_keys();

    let mut best: Option<(Value, Vec<Violation>, (u64, i64, usize))> = None;

    for raw in &candidates {
        for (variant_idx, js) in [raw.clone(), light_repair(raw)].into_iter().enumerate() {
            let Ok(parsed) = serde_json::from_str::<Value>(&js) else {
                continue;
            };

            let top_pen: u64 = match schema {
                s if s.is_object() && !parsed.is_object() => 1000,
                s if s.is_list() && !parsed.is_array() => 1000,
                _ => 0,
            };

            let missing_required: u64 = match parsed.as_object() {
                Some(map) if !required.is_empty() => {
                    let present: std::collections::HashSet<String> =
                        map.keys().map(|k| nfkc(k)).collect();
                    required.iter().filter(|k| !present.contains(*k)).count() as u64
                }
                _ => 0,
            };

            let violations = diff(&parsed, schema);

            let parsed = if top_pen == 0 && missing_required == 0 && violations.is_empty() {
                match parsed {
                    Value::Object(map) => return Decoded::Matched(map),
                    other => other,
                }
            } else {
                parsed
            };

            let score = (
                1000 * missing_required + violations.len() as u64 + top_pen,
                -(js.len() as i64),
                variant_idx,
            );
            if best.as_ref().map(|(_, _, s)| score < *s).unwrap_or(true) {
                best = Some((parsed, violations, score));
            }
        }
    }

    match best {
        Some((value, violations, _)) => Decoded::Partial { value, violations },
        None => Decoded::Unparsable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::shape::{list, obj};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn name_val_shape() -> Shape {
        obj(vec![("name", Shape::String), ("val", Shape::Integer)])
    }

    #[test]
    fn test_decode_exact_json_first_attempt() {
        let out = decode(r#"{"name": "a", "val": 1}"#, &name_val_shape());
        let Decoded::Matched(map) = out else {
            panic!("expected match, got {out:?}");
        };
        assert_eq!(map["name"], "a");
        assert_eq!(map["val"], 1);
    }

    #[test]
    fn test_decode_repairs_trailing_comma_and_quotes() {
        let out = decode(r#"{name: 'a', val: 1,}"#, &name_val_shape());
        let Decoded::Matched(map) = out else {
            panic!("expected match, got {out:?}");
        };
        assert_eq!(Value::Object(map), json!({"name": "a", "val": 1}));
    }

    #[test]
    fn test_decode_fenced_block() {
        let text = "Here you go:\n```json\n{\"name\": \"a\", \"val\": 2}\n```\nDone.";
        assert!(matches!(decode(text, &name_val_shape()), Decoded::Matched(_)));
    }

    #[test]
    fn test_decode_tagged_block() {
        let text = "<json>{\"name\": \"a\", \"val\": 2}</json>";
        assert!(matches!(decode(text, &name_val_shape()), Decoded::Matched(_)));
    }

    #[test]
    fn test_decode_label_prefix() {
        let text = "json: {\"name\": \"a\", \"val\": 2}";
        assert!(matches!(decode(text, &name_val_shape()), Decoded::Matched(_)));
    }

    #[test]
    fn test_decode_pads_missing_closing_braces() {
        let text = r#"{"name": "a", "val": 1, "nested": {"x": 1"#;
        // padded to parse; extra key is fine, required keys present
        assert!(matches!(decode(text, &name_val_shape()), Decoded::Matched(_)));
    }

    #[test]
    fn test_decode_partial_reports_missing_key() {
        let out = decode(r#"{"name": "a"}"#, &name_val_shape());
        let Decoded::Partial { violations, .. } = out else {
            panic!("expected partial, got {out:?}");
        };
        assert_eq!(
            violations,
            vec![Violation::MissingKey { path: "val".into() }]
        );
    }

    #[test]
    fn test_decode_prose_only_is_unparsable() {
        assert_eq!(
            decode("Sorry, I cannot answer that.", &name_val_shape()),
            Decoded::Unparsable
        );
    }

    #[test]
    fn test_decode_empty_is_unparsable() {
        assert_eq!(decode("", &name_val_shape()), Decoded::Unparsable);
    }

    #[test]
    fn test_decode_prefers_complete_candidate() {
        // Two fenced blocks: the longer one satisfies the schema
        let text = "```json\n{\"name\": \"x\"}\n```\n```json\n{\"name\": \"y\", \"val\": 3}\n```";
        let Decoded::Matched(map) = decode(text, &name_val_shape()) else {
            panic!("expected match");
        };
        assert_eq!(map["name"], "y");
    }

    #[test]
    fn test_light_repair_leaves_valid_json_alone() {
        let js = r#"{"name": "a", "val": 1}"#;
        assert_eq!(light_repair(js), js);
    }

    #[test]
    fn test_light_repair_quotes_bare_keys() {
        assert_eq!(light_repair(r#"{name: "a"}"#), r#"{"name": "a"}"#);
    }

    #[test]
    fn test_light_repair_strips_control_chars() {
        assert_eq!(light_repair("{\"a\":\x01 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_candidate_spans_dedup_longest_first() {
        let body = r#"{"name": "a", "val": 1}"#;
        let text = format!("```json\n{body}\n```\nand again <json>{body}</json>");
        let spans = candidate_spans(&text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0], body);
    }

    #[test]
    fn test_decode_list_schema_entries() {
        let shape = obj(vec![("items", list(obj(vec![("id", Shape::String)])))]);
        let out = decode(r#"{"items": [{"id": "a"}, {"id": 2}]}"#, &shape);
        let Decoded::Partial { violations, .. } = out else {
            panic!("expected partial");
        };
        assert_eq!(violations.len(), 1);
    }
}
