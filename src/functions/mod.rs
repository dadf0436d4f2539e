//! The function library: built-in node behaviors.
//!
//! Every behavior takes a text input and produces one or more named outputs.
//! Failures never escape as errors: they are converted to a
//! [`FunctionOutcome`] with `success: false`, which the orchestrator turns
//! into node-local error state without halting the rest of the stage.

mod export;
mod json;
mod memory;
mod predicates;
mod strings;
mod web;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{InferenceConfig, Result, common::Vars, workflow::node::DEFAULT_OUTPUT_PORT};

pub use memory::{MemoryEntry, MemoryStore};

/// Selector for a function node's behavior.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FunctionKind {
    // string operations
    ToUppercase,
    ToLowercase,
    Trim,
    Append,
    Prepend,
    Replace,
    WordCount,
    CharacterCount,
    ExtractUrls,
    ExtractEmails,
    // predicates, emitting true/false ports
    IsJson,
    IsEmpty,
    IsUrl,
    StringContains,
    IfElse,
    // JSON
    ParseJson,
    FormatJson,
    // stateful
    Memory,
    // network-backed
    WebSearch,
    WebScrape,
    ApiCall,
    // exports
    ExportMarkdown,
    ExportJson,
    ExportText,
    ExportPdf,
    ExportWord,
}

/// Result of one function execution.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionOutcome {
    pub success: bool,
    /// named output ports; single-output functions use the `output` port
    pub outputs: HashMap<String, String>,
    pub error: Option<String>,
}

impl FunctionOutcome {
    /// Create a successful outcome from named output ports
    pub fn success(outputs: HashMap<String, String>) -> Self {
        Self {
            success: true,
            outputs,
            error: None,
        }
    }

    /// Create a successful single-output outcome
    pub fn text(output: impl Into<String>) -> Self {
        let mut outputs = HashMap::new();
        outputs.insert(DEFAULT_OUTPUT_PORT.to_string(), output.into());
        Self::success(outputs)
    }

    /// Create a failed outcome
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            outputs: HashMap::new(),
            error: Some(error.into()),
        }
    }

    /// The value downstream connections without a named port receive.
    pub fn primary(&self) -> String {
        self.outputs
            .get(DEFAULT_OUTPUT_PORT)
            .cloned()
            .or_else(|| self.outputs.values().find(|v| !v.is_empty()).cloned())
            .unwrap_or_default()
    }
}

/// Executes function nodes by dispatching on their [`FunctionKind`].
///
/// The executor owns the shared memory store (injected, run-independent) and
/// the HTTP client used by network-backed functions.
pub struct FunctionExecutor {
    memory: Arc<MemoryStore>,
    client: reqwest::Client,
    inference: InferenceConfig,
    export_dir: PathBuf,
}

impl FunctionExecutor {
    pub fn new(
        memory: Arc<MemoryStore>,
        inference: InferenceConfig,
        export_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            memory,
            client: reqwest::Client::new(),
            inference,
            export_dir: export_dir.into(),
        }
    }

    pub fn memory(&self) -> Arc<MemoryStore> {
        self.memory.clone()
    }

    /// Execute one function behavior against `input`.
    ///
    /// `rid` identifies the run for memory-entry bookkeeping. Any error from
    /// the behavior is contained and returned as a failed outcome.
    pub async fn execute(
        &self,
        kind: FunctionKind,
        config: &Vars,
        input: &str,
        rid: &str,
    ) -> FunctionOutcome {
        let result: Result<FunctionOutcome> = match kind {
            FunctionKind::ToUppercase
            | FunctionKind::ToLowercase
            | FunctionKind::Trim
            | FunctionKind::Append
            | FunctionKind::Prepend
            | FunctionKind::Replace
            | FunctionKind::WordCount
            | FunctionKind::CharacterCount
            | FunctionKind::ExtractUrls
            | FunctionKind::ExtractEmails => strings::execute(kind, config, input),

            FunctionKind::IsJson | FunctionKind::IsEmpty | FunctionKind::IsUrl | FunctionKind::StringContains | FunctionKind::IfElse => {
                predicates::execute(kind, config, input)
            }

            FunctionKind::ParseJson => json::parse_json(config, input),
            FunctionKind::FormatJson => json::format_json(input),

            FunctionKind::Memory => memory::execute(&self.memory, config, input, rid),

            FunctionKind::WebSearch => web::web_search(&self.client, &self.inference, input).await,
            FunctionKind::WebScrape => web::web_scrape(&self.client, &self.inference, input).await,
            FunctionKind::ApiCall => web::api_call(&self.client, &self.inference, config, input).await,

            FunctionKind::ExportMarkdown | FunctionKind::ExportJson | FunctionKind::ExportText | FunctionKind::ExportPdf | FunctionKind::ExportWord => {
                export::execute(kind, &self.export_dir, config, input)
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => FunctionOutcome::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn executor() -> FunctionExecutor {
        FunctionExecutor::new(Arc::new(MemoryStore::new()), InferenceConfig::default(), std::env::temp_dir().join("stageflow-tests"))
    }

    #[tokio::test]
    async fn test_dispatch_string_function() {
        let outcome = executor().execute(FunctionKind::ToUppercase, &Vars::new(), "hello", "r1").await;
        assert!(outcome.success);
        assert_eq!(outcome.primary(), "HELLO");
    }

    #[tokio::test]
    async fn test_dispatch_contains_errors() {
        let outcome = executor().execute(FunctionKind::ParseJson, &Vars::new(), "not json", "r1").await;
        assert!(!outcome.success);
        assert!(outcome.outputs.is_empty());
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_kind_string_forms() {
        assert_eq!(FunctionKind::WebScrape.as_ref(), "web_scrape");
        assert_eq!("if_else".parse::<FunctionKind>().unwrap(), FunctionKind::IfElse);
    }
}
