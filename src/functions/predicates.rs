//! Predicate functions emitting paired true/false output ports.
//!
//! Every predicate returns both ports: the matching port carries the input
//! verbatim, the other carries the empty string. Downstream connections
//! branch by listening on whichever port fired.

use std::collections::HashMap;

use regex::Regex;

use crate::{
    Result, StageflowError,
    common::Vars,
    functions::{FunctionKind, FunctionOutcome},
};

pub const TRUE_PORT: &str = "true";
pub const FALSE_PORT: &str = "false";

pub(crate) fn execute(
    kind: FunctionKind,
    config: &Vars,
    input: &str,
) -> Result<FunctionOutcome> {
    let verdict = match kind {
        FunctionKind::IsJson => serde_json::from_str::<serde_json::Value>(input).is_ok(),
        FunctionKind::IsEmpty => input.trim().is_empty(),
        FunctionKind::IsUrl => is_url(input),
        FunctionKind::StringContains => {
            let value = config.get_str("value").ok_or(StageflowError::Function("string_contains requires 'value' in config".to_string()))?;
            input.contains(&value)
        }
        FunctionKind::IfElse => if_else_verdict(config, input)?,
        other => return Err(StageflowError::Function(format!("{} is not a predicate function", other.as_ref()))),
    };

    Ok(branch(verdict, input))
}

fn branch(
    verdict: bool,
    input: &str,
) -> FunctionOutcome {
    let mut outputs = HashMap::new();
    let (fired, silent) = if verdict { (TRUE_PORT, FALSE_PORT) } else { (FALSE_PORT, TRUE_PORT) };
    outputs.insert(fired.to_string(), input.to_string());
    outputs.insert(silent.to_string(), String::new());
    FunctionOutcome::success(outputs)
}

fn is_url(input: &str) -> bool {
    let re = Regex::new(r"^https?://[^\s]+$").unwrap();
    re.is_match(input.trim())
}

/// Comparisons an if_else node supports against its configured value.
fn if_else_verdict(
    config: &Vars,
    input: &str,
) -> Result<bool> {
    let value = config.get_str("value").ok_or(StageflowError::Function("if_else requires 'value' in config".to_string()))?;
    let comparison = config.get_str("comparison").unwrap_or("contains".to_string());

    match comparison.as_str() {
        "contains" => Ok(input.contains(&value)),
        "equals" => Ok(input == value),
        "starts_with" => Ok(input.starts_with(&value)),
        "ends_with" => Ok(input.ends_with(&value)),
        other => Err(StageflowError::Function(format!("unknown if_else comparison '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Exactly one port is non-empty and it equals the input verbatim.
    fn assert_completeness(
        outcome: &FunctionOutcome,
        input: &str,
        expected: bool,
    ) {
        assert!(outcome.success);
        assert_eq!(outcome.outputs.len(), 2);
        let (fired, silent) = if expected { (TRUE_PORT, FALSE_PORT) } else { (FALSE_PORT, TRUE_PORT) };
        assert_eq!(outcome.outputs[fired], input);
        assert_eq!(outcome.outputs[silent], "");
    }

    #[test]
    fn test_is_json() {
        let input = r#"{"a": 1}"#;
        assert_completeness(&execute(FunctionKind::IsJson, &Vars::new(), input).unwrap(), input, true);
        assert_completeness(&execute(FunctionKind::IsJson, &Vars::new(), "nope").unwrap(), "nope", false);
    }

    #[test]
    fn test_is_empty() {
        assert_completeness(&execute(FunctionKind::IsEmpty, &Vars::new(), "  ").unwrap(), "  ", true);
        assert_completeness(&execute(FunctionKind::IsEmpty, &Vars::new(), "x").unwrap(), "x", false);
    }

    #[test]
    fn test_is_url() {
        assert_completeness(&execute(FunctionKind::IsUrl, &Vars::new(), "https://example.com/a").unwrap(), "https://example.com/a", true);
        assert_completeness(&execute(FunctionKind::IsUrl, &Vars::new(), "example dot com").unwrap(), "example dot com", false);
    }

    #[test]
    fn test_string_contains() {
        let config = Vars::from(json!({"value": "needle"}));
        assert_completeness(&execute(FunctionKind::StringContains, &config, "a needle here").unwrap(), "a needle here", true);
        assert_completeness(&execute(FunctionKind::StringContains, &config, "nothing").unwrap(), "nothing", false);
        assert!(execute(FunctionKind::StringContains, &Vars::new(), "x").is_err());
    }

    #[test]
    fn test_if_else_comparisons() {
        let contains = Vars::from(json!({"value": "DONE"}));
        assert_completeness(&execute(FunctionKind::IfElse, &contains, "all DONE").unwrap(), "all DONE", true);

        let equals = Vars::from(json!({"value": "yes", "comparison": "equals"}));
        assert_completeness(&execute(FunctionKind::IfElse, &equals, "yes").unwrap(), "yes", true);
        assert_completeness(&execute(FunctionKind::IfElse, &equals, "yes!").unwrap(), "yes!", false);

        let starts = Vars::from(json!({"value": "ERR", "comparison": "starts_with"}));
        assert_completeness(&execute(FunctionKind::IfElse, &starts, "ERR: boom").unwrap(), "ERR: boom", true);

        let bad = Vars::from(json!({"value": "x", "comparison": "sounds_like"}));
        assert!(execute(FunctionKind::IfElse, &bad, "x").is_err());
    }
}
