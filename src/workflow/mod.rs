pub mod breaks;
pub mod connection;
pub mod loops;
pub mod node;
mod workflow;

pub use workflow::{StageInfo, Workflow};
