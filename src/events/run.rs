use std::collections::HashMap;

use crate::workflow::node::NodeId;

#[derive(Debug, Clone)]
pub enum RunEvent {
    Start(RunStartEvent),
    Succeeded,
    Failed(RunFailedEvent),
    Aborted(RunAbortedEvent),
    /// A loop exited (break condition, force stop, or per-loop ceiling).
    LoopExited(LoopExitedEvent),
    /// The global sweep ceiling was hit; the run stops gracefully.
    LoopLimitReached(LoopLimitEvent),
}

impl RunEvent {
    pub fn str(&self) -> &str {
        match self {
            RunEvent::Start(_) => "Running",
            RunEvent::Succeeded => "Succeeded",
            RunEvent::Failed(_) => "Failed",
            RunEvent::Aborted(_) => "Aborted",
            RunEvent::LoopExited(_) => "Running",
            RunEvent::LoopLimitReached(_) => "Running",
        }
    }
}

/// Event emitted when a run starts
#[derive(Debug, Clone)]
pub struct RunStartEvent {
    /// All node IDs in the workflow for batch initialization
    pub node_ids: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct RunFailedEvent {
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct RunAbortedEvent {
    pub reason: String,
    pub outputs: HashMap<NodeId, String>,
}

#[derive(Debug, Clone)]
pub struct LoopExitedEvent {
    pub loop_id: String,
    pub reason: String,
    pub iterations: u32,
}

#[derive(Debug, Clone)]
pub struct LoopLimitEvent {
    pub iterations: u32,
}
