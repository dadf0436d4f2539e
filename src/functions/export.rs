//! Export functions writing node output to files under the export directory.
//!
//! The returned output is informational only ("Exported to ..."); it is not
//! meant to feed downstream nodes.

use std::{fs, path::Path};

use crate::{
    Result, StageflowError,
    common::Vars,
    functions::{FunctionKind, FunctionOutcome},
    utils,
};

pub(crate) fn execute(
    kind: FunctionKind,
    export_dir: &Path,
    config: &Vars,
    input: &str,
) -> Result<FunctionOutcome> {
    let extension = match kind {
        FunctionKind::ExportMarkdown => "md",
        FunctionKind::ExportJson => "json",
        FunctionKind::ExportText => "txt",
        FunctionKind::ExportPdf => "pdf",
        FunctionKind::ExportWord => "doc",
        other => return Err(StageflowError::Function(format!("{} is not an export function", other.as_ref()))),
    };

    let content = match kind {
        FunctionKind::ExportJson => {
            let value: serde_json::Value = serde_json::from_str(input)
                .map_err(|err| StageflowError::Function(format!("export_json: invalid json input: {err}")))?;
            serde_json::to_string_pretty(&value)?
        }
        _ => input.to_string(),
    };

    let stem = config
        .get_str("filename")
        .map(|name| sanitize(&name))
        .filter(|name| !name.is_empty())
        .unwrap_or(format!("export-{}", utils::time::time_millis()));

    fs::create_dir_all(export_dir)?;
    let path = export_dir.join(format!("{stem}.{extension}"));
    fs::write(&path, content)?;

    Ok(FunctionOutcome::text(format!("Exported to {}", path.display())))
}

/// Keep the filename inside the export directory.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("stageflow-export-{tag}-{}", utils::longid()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_export_text_writes_file() {
        let dir = temp_dir("text");
        let config = Vars::from(json!({"filename": "report"}));
        let outcome = execute(FunctionKind::ExportText, &dir, &config, "hello").unwrap();

        let path = dir.join("report.txt");
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
        assert_eq!(outcome.primary(), format!("Exported to {}", path.display()));
    }

    #[test]
    fn test_export_json_pretty_prints() {
        let dir = temp_dir("json");
        let config = Vars::from(json!({"filename": "data"}));
        execute(FunctionKind::ExportJson, &dir, &config, r#"{"b":2,"a":1}"#).unwrap();

        let written = fs::read_to_string(dir.join("data.json")).unwrap();
        assert!(written.contains('\n'));
        assert!(execute(FunctionKind::ExportJson, &dir, &config, "not json").is_err());
    }

    #[test]
    fn test_export_without_filename_generates_one() {
        let dir = temp_dir("anon");
        let outcome = execute(FunctionKind::ExportMarkdown, &dir, &Vars::new(), "# title").unwrap();
        assert!(outcome.primary().starts_with("Exported to "));
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
    }

    #[test]
    fn test_sanitize_strips_path_separators() {
        assert_eq!(sanitize("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize("notes 2026"), "notes_2026");
    }
}
