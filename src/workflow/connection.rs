//! Workflow connection definitions.
//!
//! Connections are the only way data flows between nodes. A connection may
//! name the output port it reads from (for branching functions) and may carry
//! a break-condition configuration, which is only meaningful when the
//! connection closes a loop.

use serde::{Deserialize, Serialize};

use crate::{
    Result, StageflowError,
    common::Vars,
    workflow::{breaks::BreakConfig, node::NodeId},
};

/// Unique identifier for a connection within a workflow.
pub type ConnectionId = String;

/// Runtime connection representation between two nodes.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Connection {
    /// Unique connection identifier.
    pub id: ConnectionId,
    /// ID of the upstream node.
    pub from: NodeId,
    /// ID of the downstream node.
    pub to: NodeId,
    /// Named output port this connection reads from, if any.
    #[serde(default)]
    pub from_output_port: Option<String>,
    /// Break condition attached to this connection (loop-closing edges only).
    #[serde(default)]
    pub break_config: Option<BreakConfig>,
}

impl Connection {
    /// Creates a new connection from input variables.
    pub fn new(input: Vars) -> Result<Self> {
        let connection = serde_json::from_value(input.into()).map_err(|e| StageflowError::Connection(format!("invalid connection input: {}", e)))?;
        Ok(connection)
    }

    /// Key under which the upstream value lives in the run-scoped output map.
    pub fn output_key(&self) -> String {
        match &self.from_output_port {
            Some(port) => format!("{}:{}", self.from, port),
            None => self.from.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_output_key_with_and_without_port() {
        let plain = Connection::new(Vars::from(json!({"id": "c1", "from": "a", "to": "b"}))).unwrap();
        assert_eq!(plain.output_key(), "a");

        let ported = Connection::new(Vars::from(json!({
            "id": "c2", "from": "a", "to": "b", "from_output_port": "true"
        })))
        .unwrap();
        assert_eq!(ported.output_key(), "a:true");
    }

    #[test]
    fn test_new_rejects_missing_endpoint() {
        let result = Connection::new(Vars::from(json!({"id": "c1", "from": "a"})));
        assert!(result.is_err());
    }

    #[test]
    fn test_break_config_parses() {
        let conn = Connection::new(Vars::from(json!({
            "id": "c3", "from": "b", "to": "a",
            "break_config": {
                "condition": { "type": "contains", "value": "DONE" },
                "max_iterations": 5
            }
        })))
        .unwrap();
        let config = conn.break_config.unwrap();
        assert_eq!(config.max_iterations, Some(5));
        assert!(config.condition.is_some());
    }
}
