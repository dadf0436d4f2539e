use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    Result, StageflowError,
    common::Vars,
    functions::FunctionKind,
    inference::AgentConfig,
    workflow::loops::LoopId,
};

/// node id
pub type NodeId = String;

/// Maximum number of prior outputs retained per node.
pub const PREVIOUS_OUTPUTS_CAP: usize = 10;

/// Name of the single output port of ordinary nodes.
pub const DEFAULT_OUTPUT_PORT: &str = "output";

/// Lifecycle status of a node during a run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Complete,
    Error,
}

/// Variant-specific payload of a node.
///
/// Node behavior dispatches over this tag: agent nodes call the inference
/// service, function nodes call the function library, tool nodes are declared
/// but not executable in the current scope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Agent {
        agent: AgentConfig,
    },
    Function {
        function_type: FunctionKind,
        #[serde(default)]
        config: Vars,
        #[serde(default = "default_output_ports")]
        output_ports: Vec<String>,
    },
    Tool,
}

fn default_output_ports() -> Vec<String> {
    vec![DEFAULT_OUTPUT_PORT.to_string()]
}

/// Output produced by a node execution.
///
/// Single-port nodes produce `Text`; branching functions produce `Ports`
/// (e.g. predicates populate exactly one of their `true`/`false` ports).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum NodeOutput {
    Text(String),
    Ports(HashMap<String, String>),
}

impl NodeOutput {
    /// The value downstream connections without a named port receive:
    /// the `output` port when present, otherwise the first non-empty port.
    pub fn primary(&self) -> String {
        match self {
            NodeOutput::Text(s) => s.clone(),
            NodeOutput::Ports(ports) => ports
                .get(DEFAULT_OUTPUT_PORT)
                .cloned()
                .or_else(|| ports.values().find(|v| !v.is_empty()).cloned())
                .unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct NodeMetadata {
    id: NodeId,
    name: String,
    #[serde(default)]
    max_executions: Option<u32>,
    #[serde(flatten)]
    kind: NodeKind,
}

/// Runtime node representation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Node {
    /// node id
    pub id: NodeId,
    /// node display name
    pub name: String,
    /// variant payload
    pub kind: NodeKind,
    /// lifecycle status, reset to idle at run start
    #[serde(default)]
    pub status: NodeStatus,
    /// latest output of this node
    #[serde(default)]
    pub output: Option<NodeOutput>,
    /// number of executions in the current run
    #[serde(default)]
    pub execution_count: u32,
    /// per-node execution ceiling
    pub max_executions: u32,
    /// prior outputs, newest last, capped at [`PREVIOUS_OUTPUTS_CAP`]
    #[serde(default)]
    pub previous_outputs: Vec<String>,
    /// whether this node is a member of a detected loop
    #[serde(default)]
    pub is_in_loop: bool,
    /// identifier of the loop this node belongs to, if any
    #[serde(default)]
    pub loop_id: Option<LoopId>,
}

impl Node {
    pub fn new(
        input: Vars,
        default_max_executions: u32,
    ) -> Result<Self> {
        let value: serde_json::Value = input.into();
        jsonschema::validate(&Self::schema(), &value)?;

        let meta: NodeMetadata = serde_json::from_value(value).map_err(|e| StageflowError::Node(format!("invalid node input: {}", e)))?;

        Ok(Self {
            id: meta.id,
            name: meta.name,
            kind: meta.kind,
            status: NodeStatus::Idle,
            output: None,
            execution_count: 0,
            max_executions: meta.max_executions.unwrap_or(default_max_executions),
            previous_outputs: Vec::new(),
            is_in_loop: false,
            loop_id: None,
        })
    }

    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["id", "name", "kind"],
            "properties": {
                "id": { "type": "string", "minLength": 1 },
                "name": { "type": "string" },
                "kind": { "type": "string", "enum": ["agent", "function", "tool"] },
                "agent": { "type": "object" },
                "function_type": { "type": "string" },
                "config": { "type": "object" },
                "output_ports": {
                    "type": "array",
                    "items": { "type": "string" }
                },
                "max_executions": { "type": "integer", "minimum": 1 }
            }
        })
    }

    /// Return the node to its pre-run state.
    pub fn reset(&mut self) {
        self.status = NodeStatus::Idle;
        self.output = None;
        self.execution_count = 0;
        self.previous_outputs.clear();
        self.is_in_loop = false;
        self.loop_id = None;
    }

    /// Record a finished execution and its output.
    pub fn record(
        &mut self,
        status: NodeStatus,
        output: NodeOutput,
    ) {
        self.previous_outputs.push(output.primary());
        if self.previous_outputs.len() > PREVIOUS_OUTPUTS_CAP {
            let overflow = self.previous_outputs.len() - PREVIOUS_OUTPUTS_CAP;
            self.previous_outputs.drain(..overflow);
        }
        self.execution_count += 1;
        self.output = Some(output);
        self.status = status;
    }
}
