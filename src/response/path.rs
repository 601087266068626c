//! Dotted path navigation over a parsed body.
//!
//! Supported forms: `$.a.b`, `a.b`, `items[0].name`, `items[*]`.
//! Any segment that does not resolve makes the whole lookup `None`.

use serde_json::Value;

pub(crate) fn navigate(value: &Value, path: &str) -> Option<Value> {
    let trimmed = path.trim();
    let clean = trimmed
        .strip_prefix("$.")
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed);

    resolve(value, &split_segments(clean))
}

fn resolve(value: &Value, segments: &[Segment]) -> Option<Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(value.clone());
    };

    match first {
        // The rest of the path is applied to every element; misses are skipped.
        Segment::All => {
            let items = value.as_array()?;
            Some(Value::Array(
                items.iter().filter_map(|item| resolve(item, rest)).collect(),
            ))
        }
        Segment::Index(index) => resolve(value.as_array()?.get(*index)?, rest),
        Segment::Field(name) => resolve(value.as_object()?.get(name.as_str())?, rest),
    }
}

#[derive(Debug, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
    All,
}

/// `users[0].name` -> `[Field(users), Index(0), Field(name)]`. A bracket
/// that is neither a number nor `*` is read as a field name.
fn split_segments(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => flush(&mut current, &mut segments),
            '[' => {
                flush(&mut current, &mut segments);
                let inner: String = chars.by_ref().take_while(|next| *next != ']').collect();
                let inner = inner.trim().trim_matches(|q| q == '\'' || q == '"');
                segments.push(match inner {
                    "*" => Segment::All,
                    _ => inner
                        .parse()
                        .map(Segment::Index)
                        .unwrap_or_else(|_| Segment::Field(inner.to_string())),
                });
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut segments);

    segments
}

fn flush(current: &mut String, segments: &mut Vec<Segment>) {
    if !current.is_empty() {
        segments.push(Segment::Field(std::mem::take(current)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_navigate_nested_field() {
        let body = json!({"data": {"token": "abc123"}});
        assert_eq!(navigate(&body, "$.data.token"), Some(json!("abc123")));
        assert_eq!(navigate(&body, "data.token"), Some(json!("abc123")));
    }

    #[test]
    fn test_navigate_array_index() {
        let body = json!({"products": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(navigate(&body, "$.products[1].name"), Some(json!("b")));
        assert_eq!(navigate(&json!([10, 20]), "$[1]"), Some(json!(20)));
    }

    #[test]
    fn test_navigate_wildcard() {
        let body = json!({"items": [1, 2, 3]});
        assert_eq!(navigate(&body, "$.items[*]"), Some(json!([1, 2, 3])));
        assert_eq!(navigate(&json!({"items": 1}), "$.items[*]"), None);

        let body = json!({"users": [{"id": 1}, {"name": "x"}, {"id": 3}]});
        assert_eq!(navigate(&body, "$.users[*].id"), Some(json!([1, 3])));
    }

    #[test]
    fn test_missing_segments_are_none() {
        let body = json!({"products": [{"name": "a"}]});
        assert_eq!(navigate(&body, "$.products[5].name"), None);
        assert_eq!(navigate(&body, "$.missing"), None);
        assert_eq!(navigate(&body, "$.products.name"), None);
        assert_eq!(navigate(&Value::Null, "$.anything"), None);
    }

    #[test]
    fn test_root_path_returns_whole_document() {
        let body = json!({"a": 1});
        assert_eq!(navigate(&body, "$"), Some(body.clone()));
        assert_eq!(navigate(&body, ""), Some(body));
    }

    #[test]
    fn test_quoted_bracket_field() {
        let body = json!({"root": {"@id": "7"}});
        assert_eq!(navigate(&body, "root['@id']"), Some(json!("7")));
    }

    #[test]
    fn test_split_segments() {
        assert_eq!(
            split_segments("users[0].name"),
            vec![
                Segment::Field("users".to_string()),
                Segment::Index(0),
                Segment::Field("name".to_string())
            ]
        );
    }
}
