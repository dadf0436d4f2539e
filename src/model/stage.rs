use serde::{Deserialize, Serialize};

use crate::model::NodeModel;

/// An ordered execution phase of a workflow.
///
/// Nodes within a stage execute concurrently during a sweep; stage order
/// defines the default (non-loop) execution sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageModel {
    pub id: String,
    pub name: String,
    pub nodes: Vec<NodeModel>,
}
