use std::fmt;

#[derive(Debug, Clone)]
pub enum NodeEvent {
    Running(i64),
    Stopped(i64),
    Skipped(SkipReason),
    Complete(i64),
    Error(ErrorReason),
}

impl NodeEvent {
    pub fn str(&self) -> &str {
        match self {
            NodeEvent::Running(_) => "Running",
            NodeEvent::Stopped(_) => "Stopped",
            NodeEvent::Skipped(_) => "Skipped",
            NodeEvent::Complete(_) => "Complete",
            NodeEvent::Error(_) => "Error",
        }
    }
}

/// Why a node was passed over during a sweep.
#[derive(Debug, Clone)]
pub enum SkipReason {
    /// The node reached its per-node execution ceiling.
    ExecutionLimit(u32),
}

impl fmt::Display for SkipReason {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            SkipReason::ExecutionLimit(limit) => write!(f, "execution limit of {} reached", limit),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ErrorReason {
    Timeout,
    Failed(String),
}

impl fmt::Display for ErrorReason {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ErrorReason::Timeout => write!(f, "Timeout"),
            ErrorReason::Failed(msg) => write!(f, "Failed: {}", msg),
        }
    }
}
