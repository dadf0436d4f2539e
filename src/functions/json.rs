//! JSON functions: path extraction and pretty formatting.

use std::collections::HashMap;

use serde_json::Value;

use crate::{Result, StageflowError, common::Vars, functions::FunctionOutcome};

/// Extracts a value from the JSON input via the configured dotted path.
///
/// Path segments separate with dots; a segment may carry an index suffix
/// `[i]` or the wildcard `[]`, which maps the rest of the path over every
/// array element and joins the results with ", ".
pub(crate) fn parse_json(
    config: &Vars,
    input: &str,
) -> Result<FunctionOutcome> {
    let path = config.get_str("path").unwrap_or_default();
    let root: Value = serde_json::from_str(input)
        .map_err(|err| StageflowError::Function(format!("parse_json: invalid json input: {err}")))?;

    let segments = parse_path(&path)?;
    let text = resolve(&root, &segments, &path)?;
    Ok(FunctionOutcome::text(text))
}

pub(crate) fn format_json(input: &str) -> Result<FunctionOutcome> {
    let value: Value = serde_json::from_str(input)
        .map_err(|err| StageflowError::Function(format!("format_json: invalid json input: {err}")))?;
    let text = serde_json::to_string_pretty(&value)?;
    Ok(FunctionOutcome::text(text))
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    if path.is_empty() {
        return Ok(segments);
    }
    for part in path.split('.') {
        let mut rest = part;
        // leading key, then any number of bracket suffixes
        if let Some(open) = rest.find('[') {
            let (key, brackets) = rest.split_at(open);
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            rest = brackets;
            while let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped
                    .find(']')
                    .ok_or(StageflowError::Function(format!("unclosed bracket in path segment '{part}'")))?;
                let inner = &stripped[..close];
                if inner.is_empty() {
                    segments.push(Segment::Wildcard);
                } else {
                    let idx = inner.parse::<usize>().map_err(|_| {
                        StageflowError::Function(format!("bad array index '{inner}' in path segment '{part}'"))
                    })?;
                    segments.push(Segment::Index(idx));
                }
                rest = &stripped[close + 1..];
            }
            if !rest.is_empty() {
                return Err(StageflowError::Function(format!("malformed path segment '{part}'")));
            }
        } else {
            segments.push(Segment::Key(rest.to_string()));
        }
    }
    Ok(segments)
}

fn resolve(
    value: &Value,
    segments: &[Segment],
    path: &str,
) -> Result<String> {
    let Some((head, tail)) = segments.split_first() else {
        return Ok(stringify(value));
    };
    match head {
        Segment::Key(key) => {
            let next = value
                .get(key.as_str())
                .ok_or(StageflowError::PathNotFound(path.to_string()))?;
            resolve(next, tail, path)
        }
        Segment::Index(idx) => {
            let next = value
                .get(*idx)
                .ok_or(StageflowError::PathNotFound(path.to_string()))?;
            resolve(next, tail, path)
        }
        Segment::Wildcard => {
            let items = value
                .as_array()
                .ok_or(StageflowError::PathNotFound(path.to_string()))?;
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(resolve(item, tail, path)?);
            }
            Ok(parts.join(", "))
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_json_dotted_path() {
        let config = Vars::from(json!({"path": "user.name"}));
        let outcome = parse_json(&config, r#"{"user": {"name": "ada"}}"#).unwrap();
        assert_eq!(outcome.primary(), "ada");
    }

    #[test]
    fn test_parse_json_index_and_wildcard() {
        let input = r#"{"items": [{"id": 1}, {"id": 2}, {"id": 3}]}"#;

        let by_index = Vars::from(json!({"path": "items[1].id"}));
        assert_eq!(parse_json(&by_index, input).unwrap().primary(), "2");

        let wildcard = Vars::from(json!({"path": "items[].id"}));
        assert_eq!(parse_json(&wildcard, input).unwrap().primary(), "1, 2, 3");
    }

    #[test]
    fn test_parse_json_empty_path_returns_whole() {
        let outcome = parse_json(&Vars::new(), r#"{"a": 1}"#).unwrap();
        assert_eq!(outcome.primary(), r#"{"a":1}"#);
    }

    #[test]
    fn test_parse_json_missing_path() {
        let config = Vars::from(json!({"path": "a.b.c"}));
        let err = parse_json(&config, r#"{"a": {}}"#).unwrap_err();
        assert!(matches!(err, StageflowError::PathNotFound(path) if path == "a.b.c"));
    }

    #[test]
    fn test_parse_json_rejects_invalid_input() {
        assert!(parse_json(&Vars::new(), "not json").is_err());
    }

    #[test]
    fn test_format_json() {
        let outcome = format_json(r#"{"b":2,"a":1}"#).unwrap();
        let text = outcome.primary();
        assert!(text.contains('\n'));
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, json!({"a": 1, "b": 2}));
    }
}
