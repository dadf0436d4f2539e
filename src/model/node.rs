use serde::{Deserialize, Serialize};

/// Authored node definition as the Data Service persists it.
///
/// `kind` selects the variant (`agent`, `function`, `tool`); variant-specific
/// fields (`agent`, `function_type`, `config`, `output_ports`) stay loose here
/// and are validated when the runtime [`Node`](crate::workflow::node::Node) is
/// built from this model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeModel {
    pub id: String,
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_ports: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_executions: Option<u32>,
}
