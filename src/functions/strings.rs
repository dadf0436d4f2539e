//! Pure string operations.

use regex::Regex;

use crate::{
    Result, StageflowError,
    common::Vars,
    functions::{FunctionKind, FunctionOutcome},
};

const URL_PATTERN: &str = r"https?://[^\s<>\x22]+";
const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";

pub(crate) fn execute(
    kind: FunctionKind,
    config: &Vars,
    input: &str,
) -> Result<FunctionOutcome> {
    let output = match kind {
        FunctionKind::ToUppercase => input.to_uppercase(),
        FunctionKind::ToLowercase => input.to_lowercase(),
        FunctionKind::Trim => input.trim().to_string(),
        FunctionKind::Append => {
            let suffix = config.get_str("value").unwrap_or_default();
            format!("{}{}", input, suffix)
        }
        FunctionKind::Prepend => {
            let prefix = config.get_str("value").unwrap_or_default();
            format!("{}{}", prefix, input)
        }
        FunctionKind::Replace => {
            let find = config.get_str("find").ok_or(StageflowError::Function("replace requires 'find' in config".to_string()))?;
            let replace = config.get_str("replace").unwrap_or_default();
            input.replace(&find, &replace)
        }
        FunctionKind::WordCount => input.split_whitespace().count().to_string(),
        FunctionKind::CharacterCount => input.chars().count().to_string(),
        FunctionKind::ExtractUrls => extract_all(URL_PATTERN, input),
        FunctionKind::ExtractEmails => extract_all(EMAIL_PATTERN, input),
        other => return Err(StageflowError::Function(format!("{} is not a string function", other.as_ref()))),
    };

    Ok(FunctionOutcome::text(output))
}

fn extract_all(
    pattern: &str,
    input: &str,
) -> String {
    let re = Regex::new(pattern).unwrap();
    re.find_iter(input).map(|m| m.as_str().to_string()).collect::<Vec<_>>().join("\n")
}

/// URLs found in `input`, used by string extraction and by web_scrape.
pub(crate) fn extract_urls(input: &str) -> Vec<String> {
    let re = Regex::new(URL_PATTERN).unwrap();
    re.find_iter(input).map(|m| m.as_str().to_string()).collect()
}
