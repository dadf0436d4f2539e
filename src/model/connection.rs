use serde::{Deserialize, Serialize};

/// Authored data-flow edge between two nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionModel {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_output_port: Option<String>,
    /// break-condition configuration; only meaningful on loop-closing edges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub break_config: Option<serde_json::Value>,
}
