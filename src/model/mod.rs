mod connection;
mod node;
mod stage;
mod workflow;

pub use connection::ConnectionModel;
pub use node::NodeModel;
pub use stage::StageModel;
pub use workflow::WorkflowModel;
