//! Best-effort extraction of a JSON object from model output.
//!
//! Completion endpoints wrap payloads in prose or code fences and sometimes
//! truncate mid-object. The repair here is deliberately conservative: scan
//! from the first `{`, track string literals, and close whatever is still
//! open at end of input. A payload cut off in the middle of an escape
//! sequence is not repairable and yields None.

use serde_json::Value;

/// Locate the first balanced JSON object in `raw`, repairing a truncated
/// tail by appending the missing closers. Returns the candidate object text.
pub fn extract_json_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let body = &raw[start..];

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut end = None;

    for (i, ch) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                // Mismatched closer: give up rather than guess.
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    end = Some(i + ch.len_utf8());
                    break;
                }
            }
            _ => {}
        }
    }

    if let Some(end) = end {
        return Some(body[..end].to_string());
    }

    // Truncated input: close an unterminated string at the cut point, then
    // unwind the structural stack. Truncation inside an escape is hopeless.
    if escaped {
        return None;
    }
    let mut repaired = body.to_string();
    if in_string {
        repaired.push('"');
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    Some(repaired)
}

/// Extract and parse, tolerating fences, leading prose, and truncation.
pub fn parse_lenient(raw: &str) -> Option<Value> {
    let candidate = extract_json_object(raw)?;
    serde_json::from_str(&candidate).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_object() {
        let v = parse_lenient(r#"{"sports":["Climbing"],"themes":[]}"#).unwrap();
        assert_eq!(v["sports"][0], "Climbing");
    }

    #[test]
    fn strips_code_fences_and_prose() {
        let raw = "Here are the tags:\n```json\n{\"themes\":[\"Adventure\"]}\n```\nDone.";
        let v = parse_lenient(raw).unwrap();
        assert_eq!(v["themes"][0], "Adventure");
    }

    #[test]
    fn repairs_truncated_array_and_object() {
        let raw = r#"{"sports":["Climbing","Skiing"#;
        let v = parse_lenient(raw).unwrap();
        assert_eq!(v["sports"][1], "Skiing");
    }

    #[test]
    fn repairs_truncation_inside_string() {
        // Fenced, truncated mid-string: the unterminated literal is closed,
        // then the array and object.
        let raw = "```json\n{\"sports\":[\"Climbing\"],\"themes\":[\"Advent";
        let v = parse_lenient(raw).unwrap();
        assert_eq!(v["sports"][0], "Climbing");
        assert_eq!(v["themes"][0], "Advent");
    }

    #[test]
    fn rejects_truncation_inside_escape() {
        assert!(parse_lenient(r#"{"a":"x\"#).is_none());
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let raw = r#"{"reasoning":"uses { and [ freely","sports":[]}"#;
        let v = parse_lenient(raw).unwrap();
        assert_eq!(v["reasoning"], "uses { and [ freely");
    }

    #[test]
    fn rejects_mismatched_closers() {
        assert!(parse_lenient(r#"{"a":[1}"#).is_none());
    }

    #[test]
    fn no_object_means_none() {
        assert!(parse_lenient("no json here").is_none());
    }
}
