//! Event types for workflow run execution.
//!
//! Events are emitted during a run to notify subscribers about node state
//! changes, run completion, safety-limit warnings, and log lines.

mod node;
mod run;

pub use node::*;
pub use run::*;

use crate::{runtime::RunId, workflow::node::NodeId};

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Top-level event type for workflow graph events.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// Run-level events (start, succeeded, failed, etc.).
    Run(RunEvent),
    /// Node-level events (running, complete, error, etc.).
    Node(NodeEvent),
}

/// Event message containing run and node context.
#[derive(Debug, Clone)]
pub struct Message {
    /// Run ID that generated this event.
    pub rid: RunId,
    /// Node ID that generated this event (empty for run events).
    pub nid: NodeId,
    /// The actual event data.
    pub event: GraphEvent,
}

/// Severity of a user-facing run log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum LogLevel {
    Info,
    Running,
    Success,
    Error,
    Warning,
}

/// Log entry emitted during node execution.
#[derive(Debug, Clone)]
pub struct Log {
    /// Run ID that generated this log.
    pub rid: RunId,
    /// Node ID that generated this log.
    pub nid: NodeId,
    /// Log severity.
    pub level: LogLevel,
    /// Log message content.
    pub content: String,
    /// Timestamp in milliseconds of the log entry.
    pub timestamp: i64,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl GraphEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self, GraphEvent::Run(RunEvent::Succeeded))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, GraphEvent::Run(RunEvent::Failed(_)))
    }
}
