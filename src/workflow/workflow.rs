//! Runtime workflow representation using a directed graph.
//!
//! This module provides the internal workflow representation used during
//! execution. It wraps the workflow model in a directed graph structure
//! (using petgraph) for efficient traversal and state management, plus the
//! ordered stage list that drives sweep scheduling.

use std::collections::HashMap;

use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};

use crate::{
    Result, ShareLock, StageflowError, WorkflowModel,
    common::Vars,
    workflow::{
        connection::Connection,
        loops::{LoopId, LoopMetadata},
        node::{Node, NodeId, NodeOutput, NodeStatus},
    },
};

/// Declared stage: an id, a display name, and the ordered ids of its nodes.
#[derive(Debug, Clone)]
pub struct StageInfo {
    pub id: String,
    pub name: String,
    pub node_ids: Vec<NodeId>,
}

/// Runtime workflow representation as a directed graph.
///
/// The workflow graph maintains:
/// - Nodes grouped into ordered stages
/// - Connections representing data flow between nodes
/// - Execution state for each node
///
/// Stage order defines the default execution sequence; connections pointing
/// backward to earlier stages are what create loops.
#[derive(Clone)]
pub struct Workflow {
    /// Thread-safe directed graph storing nodes and connections.
    graph: ShareLock<DiGraph<Node, Connection>>,
    /// Declared stages in execution order.
    stages: Vec<StageInfo>,
}

#[allow(unused)]
impl Workflow {
    /// Output a human-readable representation of the workflow graph
    pub fn schema(&self) -> String {
        let graph = self.graph.read().unwrap();
        let mut lines = Vec::new();

        lines.push("=== Workflow Graph ===".to_string());
        lines.push(format!("Stages: {}, Nodes: {}, Connections: {}", self.stages.len(), graph.node_count(), graph.edge_count()));
        lines.push(String::new());

        lines.push("--- Stages ---".to_string());
        for stage in &self.stages {
            lines.push(format!("[{}] {} -> {}", stage.id, stage.name, stage.node_ids.join(", ")));
        }
        lines.push(String::new());

        lines.push("--- Nodes ---".to_string());
        for idx in graph.node_indices() {
            let node = &graph[idx];
            let loop_tag = match &node.loop_id {
                Some(id) => format!(", loop: {}", id),
                None => String::new(),
            };
            lines.push(format!("[{}] {} (status: {}{})", node.id, node.name, node.status.as_ref(), loop_tag));
        }
        lines.push(String::new());

        lines.push("--- Connections ---".to_string());
        for idx in graph.edge_indices() {
            let connection = &graph[idx];
            let port = connection.from_output_port.as_deref().unwrap_or("output");
            lines.push(format!("{} --[{}]--> {} (id: {})", connection.from, port, connection.to, connection.id));
        }

        lines.join("\n")
    }

    /// Declared stages in execution order.
    pub fn stages(&self) -> &[StageInfo] {
        &self.stages
    }

    /// get node by id
    pub fn get_node(
        &self,
        id: &str,
    ) -> Option<Node> {
        let graph = self.graph.read().unwrap();
        graph.node_indices().find(|idx| graph[*idx].id.eq(id)).map(|idx| graph[idx].clone())
    }

    /// get node status by id
    pub fn get_node_status(
        &self,
        id: &str,
    ) -> Option<NodeStatus> {
        self.get_node(id).map(|n| n.status)
    }

    /// get all node ids in stage order
    pub fn get_all_node_ids(&self) -> Vec<NodeId> {
        self.stages.iter().flat_map(|stage| stage.node_ids.iter().cloned()).collect()
    }

    /// every connection in the workflow
    pub fn connections(&self) -> Vec<Connection> {
        let graph = self.graph.read().unwrap();
        graph.edge_indices().map(|idx| graph[idx].clone()).collect()
    }

    /// map from node id to its position in the declared stage sequence
    pub fn node_order(&self) -> HashMap<NodeId, usize> {
        self.get_all_node_ids().into_iter().enumerate().map(|(n, id)| (id, n)).collect()
    }

    /// Incoming connections of a node, in the order they were declared.
    pub fn incoming_connections(
        &self,
        nid: &str,
    ) -> Vec<Connection> {
        let graph = self.graph.read().unwrap();
        let Some(node_idx) = graph.node_indices().find(|idx| graph[*idx].id.eq(nid)) else {
            return Vec::new();
        };

        let mut edges: Vec<_> = graph.edges_directed(node_idx, Direction::Incoming).map(|edge_ref| (edge_ref.id(), edge_ref.weight().clone())).collect();
        edges.sort_by_key(|(idx, _)| *idx);
        edges.into_iter().map(|(_, connection)| connection).collect()
    }

    /// Reset every node to idle with empty outputs and zero counts.
    /// Idempotent: calling it twice leaves the same state.
    pub fn reset(&self) {
        let mut graph = self.graph.write().unwrap();
        for idx in graph.node_indices().collect::<Vec<_>>() {
            graph[idx].reset();
        }
    }

    /// mutate node status
    pub fn set_node_status(
        &self,
        id: &str,
        status: NodeStatus,
    ) {
        let mut graph = self.graph.write().unwrap();
        if let Some(idx) = graph.node_indices().find(|idx| graph[*idx].id.eq(id)) {
            graph[idx].status = status;
        }
    }

    /// Record a finished execution: output, history, count, status.
    pub fn record_result(
        &self,
        id: &str,
        status: NodeStatus,
        output: NodeOutput,
    ) {
        let mut graph = self.graph.write().unwrap();
        if let Some(idx) = graph.node_indices().find(|idx| graph[*idx].id.eq(id)) {
            graph[idx].record(status, output);
        }
    }

    /// Tag the member nodes of every detected loop.
    pub fn mark_loop_members(
        &self,
        loops: &[LoopMetadata],
    ) {
        let mut graph = self.graph.write().unwrap();
        for meta in loops {
            for idx in graph.node_indices().collect::<Vec<_>>() {
                if meta.contains(&graph[idx].id) {
                    graph[idx].is_in_loop = true;
                    graph[idx].loop_id = Some(meta.id.clone());
                }
            }
        }
    }

    /// Clear loop membership on every node tagged with `loop_id`.
    pub fn clear_loop_members(
        &self,
        loop_id: &LoopId,
    ) {
        let mut graph = self.graph.write().unwrap();
        for idx in graph.node_indices().collect::<Vec<_>>() {
            if graph[idx].loop_id.as_ref() == Some(loop_id) {
                graph[idx].is_in_loop = false;
                graph[idx].loop_id = None;
            }
        }
    }

    /// Latest primary output of every node that produced one.
    pub fn outputs_snapshot(&self) -> HashMap<NodeId, String> {
        let graph = self.graph.read().unwrap();
        graph
            .node_indices()
            .filter_map(|idx| {
                let node = &graph[idx];
                node.output.as_ref().map(|output| (node.id.clone(), output.primary()))
            })
            .collect()
    }
}

impl TryFrom<&WorkflowModel> for Workflow {
    type Error = StageflowError;

    fn try_from(model: &WorkflowModel) -> Result<Self> {
        Self::from_model(model, crate::config::DEFAULT_NODE_EXECUTIONS)
    }
}

impl Workflow {
    /// Build the runtime graph from a model, giving every node without an
    /// explicit `max_executions` the configured default.
    pub fn from_model(
        model: &WorkflowModel,
        default_max_executions: u32,
    ) -> Result<Self> {
        let mut graph: DiGraph<Node, Connection> = DiGraph::new();

        let mut nodes = HashMap::new();
        let mut stages = Vec::new();

        for stage_model in model.stages.iter() {
            let mut node_ids = Vec::new();
            for node_model in stage_model.nodes.iter() {
                let node_value = serde_json::to_value(node_model)?;
                let node = Node::new(Vars::from(node_value), default_max_executions)?;
                let nid = node.id.clone();
                if nodes.contains_key(&nid) {
                    return Err(StageflowError::Workflow(format!("duplicate node id {}", nid)));
                }
                let node_idx = graph.add_node(node);
                nodes.insert(nid.clone(), node_idx);
                node_ids.push(nid);
            }
            stages.push(StageInfo {
                id: stage_model.id.clone(),
                name: stage_model.name.clone(),
                node_ids,
            });
        }

        for connection_model in model.connections.iter() {
            let connection_value = serde_json::to_value(connection_model)?;
            let connection = Connection::new(Vars::from(connection_value))?;
            let from = nodes.get(&connection.from).ok_or(StageflowError::Connection(format!("source node {} not found", connection.from)))?;
            let to = nodes.get(&connection.to).ok_or(StageflowError::Connection(format!("target node {} not found", connection.to)))?;
            graph.add_edge(*from, *to, connection);
        }

        Ok(Self {
            graph: ShareLock::new(graph.into()),
            stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn two_stage_model() -> WorkflowModel {
        WorkflowModel::from_json(
            &json!({
                "id": "wf-1",
                "name": "test",
                "stages": [
                    {
                        "id": "s1",
                        "name": "first",
                        "nodes": [
                            {"id": "a", "name": "upper", "kind": "function", "function_type": "to_uppercase"},
                            {"id": "b", "name": "check", "kind": "function", "function_type": "is_empty",
                             "output_ports": ["true", "false"]}
                        ]
                    },
                    {
                        "id": "s2",
                        "name": "second",
                        "nodes": [
                            {"id": "c", "name": "trim", "kind": "function", "function_type": "trim"}
                        ]
                    }
                ],
                "connections": [
                    {"id": "c1", "from": "a", "to": "c"},
                    {"id": "c2", "from": "b", "to": "c", "from_output_port": "false"}
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_from_model() {
        let workflow = Workflow::try_from(&two_stage_model()).unwrap();

        assert_eq!(workflow.stages().len(), 2);
        assert_eq!(workflow.get_all_node_ids(), vec!["a", "b", "c"]);
        assert_eq!(workflow.connections().len(), 2);
        assert_eq!(workflow.get_node_status("a"), Some(NodeStatus::Idle));
    }

    #[test]
    fn test_build_rejects_unknown_connection_endpoint() {
        let mut model = two_stage_model();
        model.connections.push(crate::ConnectionModel {
            id: "c3".to_string(),
            from: "ghost".to_string(),
            to: "c".to_string(),
            from_output_port: None,
            break_config: None,
        });
        assert!(Workflow::try_from(&model).is_err());
    }

    #[test]
    fn test_node_order_follows_stage_sequence() {
        let workflow = Workflow::try_from(&two_stage_model()).unwrap();
        let order = workflow.node_order();
        assert!(order["a"] < order["c"]);
        assert!(order["b"] < order["c"]);
    }

    #[test]
    fn test_incoming_connections_preserve_declared_order() {
        let workflow = Workflow::try_from(&two_stage_model()).unwrap();
        let incoming = workflow.incoming_connections("c");
        assert_eq!(incoming.len(), 2);
        assert_eq!(incoming[0].id, "c1");
        assert_eq!(incoming[1].id, "c2");
        assert_eq!(incoming[1].output_key(), "b:false");
    }

    #[test]
    fn test_reset_is_idempotent() {
        let workflow = Workflow::try_from(&two_stage_model()).unwrap();
        workflow.record_result("a", NodeStatus::Complete, NodeOutput::Text("X".into()));
        workflow.set_node_status("b", NodeStatus::Error);

        workflow.reset();
        workflow.reset();

        for nid in workflow.get_all_node_ids() {
            let node = workflow.get_node(&nid).unwrap();
            assert_eq!(node.status, NodeStatus::Idle);
            assert_eq!(node.output, None);
            assert_eq!(node.execution_count, 0);
            assert!(node.previous_outputs.is_empty());
            assert!(!node.is_in_loop);
        }
    }

    #[test]
    fn test_loop_membership_mark_and_clear() {
        let workflow = Workflow::try_from(&two_stage_model()).unwrap();
        let meta = LoopMetadata::new("loop-0".to_string(), ["a".to_string(), "c".to_string()].into(), vec![], None);

        workflow.mark_loop_members(std::slice::from_ref(&meta));
        assert!(workflow.get_node("a").unwrap().is_in_loop);
        assert!(!workflow.get_node("b").unwrap().is_in_loop);
        assert_eq!(workflow.get_node("c").unwrap().loop_id, Some("loop-0".to_string()));

        workflow.clear_loop_members(&"loop-0".to_string());
        assert!(!workflow.get_node("a").unwrap().is_in_loop);
        assert_eq!(workflow.get_node("c").unwrap().loop_id, None);
    }
}
