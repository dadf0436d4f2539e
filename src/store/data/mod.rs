mod event;
mod log;
mod node;
mod run;
mod workflow;

pub use event::Event;
pub use log::Log;
pub use node::Node;
pub use run::Run;
pub use workflow::Workflow;

/// A stored record with an id and an owning run.
pub trait DbDocument {
    fn id(&self) -> &str;
    /// run id the record belongs to; empty for run-independent records
    fn rid(&self) -> &str {
        ""
    }
}
