// src/decode/shape.rs — Schema shapes for oracle output
//
// A Shape describes the structure a critic's JSON reply must satisfy. The
// same value renders the <output_schema> prompt section and drives the
// structural diff used to score decode candidates.

use serde_json::{json, Map, Value};
use unicode_normalization::UnicodeNormalization;

/// Keys whose name starts with this prefix form the oracle's internal
/// reasoning bucket. They are never required, so a reply that skips its
/// reasoning still validates.
pub const REASONING_PREFIX: &str = "reasoning";

/// Diagnostic block requested on escalated retries and auto-filled on
/// first success after a retry.
pub const DIAG_KEY: &str = "reasoning_decode_report";

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    String,
    Integer,
    Number,
    Boolean,
    Null,
    Any,
    /// At most one prototype element; every target entry is checked against
    /// it. An empty prototype (or an empty target) is always satisfied.
    List(Vec<Shape>),
    /// Ordered key → shape pairs.
    Object(Vec<(String, Shape)>),
}

/// Shorthand constructor for object shapes.
pub fn obj(fields: Vec<(&str, Shape)>) -> Shape {
    Shape::Object(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

/// Shorthand constructor for lists with a single prototype element.
pub fn list(proto: Shape) -> Shape {
    Shape::List(vec![proto])
}

/// Unicode NFKC fold, so visually-equivalent key spellings match.
pub fn nfkc(s: &str) -> String {
    s.nfkc().collect()
}

pub fn is_reasoning_key(key: &str) -> bool {
    nfkc(key).starts_with(REASONING_PREFIX)
}

impl Shape {
    /// Render into the JSON value shown in the prompt's schema section.
    pub fn render(&self) -> Value {
        match self {
            Shape::String => json!("string"),
            Shape::Integer => json!("integer"),
            Shape::Number => json!("number"),
            Shape::Boolean => json!("boolean"),
            Shape::Null => json!("null"),
            Shape::Any => json!("any"),
            Shape::List(proto) => Value::Array(proto.iter().take(1).map(Shape::render).collect()),
            Shape::Object(fields) => {
                let mut map = Map::new();
                for (k, v) in fields {
                    map.insert(k.clone(), v.render());
                }
                Value::Object(map)
            }
        }
    }

    /// Shallow placeholder for one field of a minimal example reply.
    pub fn placeholder(&self) -> Value {
        match self {
            Shape::String => json!(""),
            Shape::Integer => json!(0),
            Shape::Number => json!(0.0),
            Shape::Boolean => json!(false),
            Shape::List(_) => json!([]),
            Shape::Object(_) => json!({}),
            Shape::Null | Shape::Any => Value::Null,
        }
    }

    /// Minimal example object: every top-level key mapped to its placeholder.
    /// Non-object shapes fall back to their own placeholder.
    pub fn minimal_example(&self) -> Value {
        match self {
            Shape::Object(fields) => {
                let mut map = Map::new();
                for (k, v) in fields {
                    map.insert(k.clone(), v.placeholder());
                }
                Value::Object(map)
            }
            other => other.placeholder(),
        }
    }

    /// NFKC-folded names of required top-level keys (reasoning bucket excluded).
    pub fn required_keys(&self) -> Vec<String> {
        match self {
            Shape::Object(fields) => fields
                .iter()
                .filter(|(k, _)| !is_reasoning_key(k))
                .map(|(k, _)| nfkc(k))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Shape::Object(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Shape::List(_))
    }
}

/// Augment a schema with the decode-diagnostic block. Pure: returns a new
/// shape, the input is never touched. Idempotent when the block is present.
pub fn with_decode_diagnostics(shape: &Shape) -> Shape {
    let Shape::Object(fields) = shape else {
        return shape.clone();
    };
    if fields.iter().any(|(k, _)| k == DIAG_KEY) {
        return shape.clone();
    }
    let mut fields = fields.clone();
    fields.push((DIAG_KEY.to_string(), diag_shape()));
    Shape::Object(fields)
}

fn diag_shape() -> Shape {
    obj(vec![
        ("attempts", Shape::Integer),
        ("root_cause", Shape::String),
        ("parser_errors", list(Shape::String)),
        ("missing_keys", list(Shape::String)),
        ("selected_fix", Shape::String),
        ("notes", list(Shape::String)),
    ])
}

/// One structural mismatch between a parsed value and its expected shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    MissingKey { path: String },
    WrongType { path: String, expected: &'static str },
    WrongShape { path: String, expected: &'static str },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::MissingKey { path } => write!(f, "missing key: {path}"),
            Violation::WrongType { path, expected } => {
                write!(f, "type mismatch at {path}: expected {expected}")
            }
            Violation::WrongShape { path, expected } => {
                write!(f, "{path} should be {expected}")
            }
        }
    }
}

/// The key paths a reply must add, pulled out of a violation list.
pub fn missing_key_paths(violations: &[Violation]) -> Vec<String> {
    violations
        .iter()
        .filter_map(|v| match v {
            Violation::MissingKey { path } => Some(path.clone()),
            _ => None,
        })
        .collect()
}

/// Recursive structural diff of a parsed value against a shape.
pub fn diff(target: &Value, shape: &Shape) -> Vec<Violation> {
    let mut out = Vec::new();
    diff_at(target, shape, &mut Vec::new(), &mut out);
    out
}

fn path_str(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

fn diff_at(target: &Value, shape: &Shape, path: &mut Vec<String>, out: &mut Vec<Violation>) {
    match shape {
        Shape::Object(fields) => {
            let Some(map) = target.as_object() else {
                out.push(Violation::WrongShape {
                    path: path_str(path),
                    expected: "an object",
                });
                return;
            };
            // NFKC index so visually-equivalent key spellings resolve
            let norm_index: std::collections::HashMap<String, &String> =
                map.keys().map(|k| (nfkc(k), k)).collect();
            for (key, field_shape) in fields {
                if is_reasoning_key(key) {
                    continue;
                }
                match norm_index.get(&nfkc(key)) {
                    None => {
                        path.push(key.clone());
                        out.push(Violation::MissingKey {
                            path: path.join("."),
                        });
                        path.pop();
                    }
                    Some(real_key) => {
                        path.push(key.clone());
                        diff_at(&map[*real_key], field_shape, path, out);
                        path.pop();
                    }
                }
            }
        }
        Shape::List(proto) => {
            let Some(arr) = target.as_array() else {
                out.push(Violation::WrongShape {
                    path: path_str(path),
                    expected: "an array",
                });
                return;
            };
            let Some(proto) = proto.first() else {
                return;
            };
            for (i, el) in arr.iter().enumerate() {
                path.push(format!("[{i}]"));
                diff_at(el, proto, path, out);
                path.pop();
            }
        }
        Shape::String => check_type(target.is_string(), "string", path, out),
        Shape::Integer => check_type(target.is_i64() || target.is_u64(), "integer", path, out),
        Shape::Number => check_type(target.is_number(), "number", path, out),
        Shape::Boolean => check_type(target.is_boolean(), "boolean", path, out),
        Shape::Null => check_type(target.is_null(), "null", path, out),
        Shape::Any => {}
    }
}

fn check_type(ok: bool, expected: &'static str, path: &[String], out: &mut Vec<Violation>) {
    if !ok {
        out.push(Violation::WrongType {
            path: path_str(path),
            expected,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_shape() -> Shape {
        obj(vec![
            ("name", Shape::String),
            ("val", Shape::Integer),
            ("tags", list(Shape::String)),
            ("nested", obj(vec![("flag", Shape::Boolean)])),
            ("reasoning_trace", list(Shape::String)),
        ])
    }

    #[test]
    fn test_diff_exact_match() {
        let v = json!({
            "name": "a",
            "val": 1,
            "tags": ["x", "y"],
            "nested": { "flag": true },
        });
        assert!(diff(&v, &demo_shape()).is_empty());
    }

    #[test]
    fn test_diff_reasoning_keys_not_required() {
        // reasoning_trace omitted above and still a clean match
        let v = json!({ "name": "a", "val": 1, "tags": [], "nested": { "flag": false } });
        assert!(diff(&v, &demo_shape()).is_empty());
    }

    #[test]
    fn test_diff_missing_key() {
        let v = json!({ "name": "a", "tags": [], "nested": { "flag": true } });
        let violations = diff(&v, &demo_shape());
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0],
            Violation::MissingKey { path: "val".into() }
        );
    }

    #[test]
    fn test_diff_nested_missing_key() {
        let v = json!({ "name": "a", "val": 1, "tags": [], "nested": {} });
        let violations = diff(&v, &demo_shape());
        assert_eq!(missing_key_paths(&violations), vec!["nested.flag"]);
    }

    #[test]
    fn test_diff_type_mismatch() {
        let v = json!({ "name": 7, "val": 1, "tags": [], "nested": { "flag": true } });
        let violations = diff(&v, &demo_shape());
        assert_eq!(violations.len(), 1);
        assert!(matches!(&violations[0], Violation::WrongType { path, .. } if path == "name"));
    }

    #[test]
    fn test_diff_list_entries_checked_against_prototype() {
        let v = json!({ "name": "a", "val": 1, "tags": ["ok", 3], "nested": { "flag": true } });
        let violations = diff(&v, &demo_shape());
        assert_eq!(violations.len(), 1);
        assert!(matches!(&violations[0], Violation::WrongType { path, .. } if path == "tags.[1]"));
    }

    #[test]
    fn test_diff_empty_lists_satisfied() {
        let shape = obj(vec![("items", Shape::List(vec![]))]);
        assert!(diff(&json!({ "items": [1, "two", null] }), &shape).is_empty());
        let shape = obj(vec![("items", list(Shape::String))]);
        assert!(diff(&json!({ "items": [] }), &shape).is_empty());
    }

    #[test]
    fn test_diff_root_shape_mismatch() {
        let violations = diff(&json!([1, 2]), &demo_shape());
        assert_eq!(
            violations[0],
            Violation::WrongShape {
                path: "<root>".into(),
                expected: "an object"
            }
        );
    }

    #[test]
    fn test_nfkc_key_matching() {
        // full-width "ｎａｍｅ" folds to "name"
        let shape = obj(vec![("name", Shape::String)]);
        let v = json!({ "ｎａｍｅ": "a" });
        assert!(diff(&v, &shape).is_empty());
    }

    #[test]
    fn test_required_keys_exclude_reasoning() {
        let keys = demo_shape().required_keys();
        assert_eq!(keys, vec!["name", "val", "tags", "nested"]);
    }

    #[test]
    fn test_with_decode_diagnostics_adds_block_once() {
        let augmented = with_decode_diagnostics(&demo_shape());
        let Shape::Object(fields) = &augmented else {
            panic!("expected object shape");
        };
        assert!(fields.iter().any(|(k, _)| k == DIAG_KEY));
        // idempotent
        let again = with_decode_diagnostics(&augmented);
        assert_eq!(augmented, again);
    }

    #[test]
    fn test_with_decode_diagnostics_pure() {
        let base = demo_shape();
        let _ = with_decode_diagnostics(&base);
        assert_eq!(base, demo_shape());
    }

    #[test]
    fn test_render_primitive_names() {
        let rendered = demo_shape().render();
        assert_eq!(rendered["name"], "string");
        assert_eq!(rendered["val"], "integer");
        assert_eq!(rendered["tags"], json!(["string"]));
        assert_eq!(rendered["nested"]["flag"], "boolean");
    }

    #[test]
    fn test_minimal_example_placeholders() {
        let example = demo_shape().minimal_example();
        assert_eq!(example["name"], "");
        assert_eq!(example["val"], 0);
        assert_eq!(example["tags"], json!([]));
        assert_eq!(example["nested"], json!({}));
    }
}
