//! Defensive extraction of JSON from free-form model output.
//!
//! Two stages, each returning `Option`: the body between `<tag>...</tag>`
//! first, then the first balanced `{...}` (or `[...]`) span. Shape checks on
//! the parsed value are left to the caller.

use serde_json::{Map, Value};

/// Body between `<tag>` and the next `</tag>`, trimmed.
pub fn extract_tagged<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    let body = text[start..end].trim();

    if body.is_empty() {
        None
    } else {
        Some(body)
    }
}

/// Extract first JSON object substring from a possibly noisy LLM output.
/// Handles nested braces and braces inside JSON strings (with escapes).
pub fn extract_first_json_object(s: &str) -> Option<&str> {
    extract_balanced(s, '{', '}')
}

/// Same as [`extract_first_json_object`] for a top-level array.
pub fn extract_first_json_array(s: &str) -> Option<&str> {
    extract_balanced(s, '[', ']')
}

fn extract_balanced(s: &str, open: char, close: char) -> Option<&str> {
    let mut start: Option<usize> = None;
    let mut depth: i32 = 0;

    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in s.char_indices() {
        if start.is_none() {
            if ch == open {
                start = Some(i);
                depth = 1;
                in_string = false;
                escaped = false;
            }
            continue;
        }

        if in_string {
            if escaped {
                escaped = false;
                continue;
            }
            match ch {
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                let st = start?;
                return Some(&s[st..=i]);
            }
        }
    }

    None
}

/// Parse a JSON object from model output: tagged body first, then a brace scan.
pub fn parse_json_object(text: &str, tag: &str) -> Option<Map<String, Value>> {
    let from_tag = extract_tagged(text, tag).and_then(|body| object_from(body));
    from_tag.or_else(|| object_from(text))
}

/// Parse a JSON array from model output: tagged body first, then a bracket scan.
pub fn parse_json_array(text: &str, tag: &str) -> Option<Vec<Value>> {
    let from_tag = extract_tagged(text, tag).and_then(|body| array_from(body));
    from_tag.or_else(|| array_from(text))
}

fn object_from(text: &str) -> Option<Map<String, Value>> {
    let candidate = extract_first_json_object(text)?;
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn array_from(text: &str) -> Option<Vec<Value>> {
    let candidate = extract_first_json_array(text)?;
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}
