//! # Stageflow
//!
//! Stageflow is a stage-based AI agent workflow execution engine written in Rust.
//! It is designed to be embedded in applications that let users author directed
//! graphs of agent and function nodes and execute them stage by stage.
//!
//! ## Core Features
//!
//! - **Stage Sweeps**: nodes inside a stage execute concurrently; stages execute
//!   strictly in declared order
//! - **Loop Execution**: backward connections form loops, detected structurally
//!   and re-executed until a break condition fires or a safety ceiling is hit
//! - **Function Library**: ~two dozen built-in node behaviors (string ops,
//!   predicates, JSON paths, memory, search, scrape, export)
//! - **Agent Nodes**: delegated to a remote inference service over HTTP or SSE
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stageflow::{EngineBuilder, WorkflowModel};
//!
//! let engine = EngineBuilder::new().build().unwrap();
//! engine.launch();
//!
//! let workflow = WorkflowModel::from_json(json_str)?;
//! let run = engine.build_run(&workflow, "user question")?;
//! engine.start_run(run)?;
//! ```

mod builder;
mod common;
mod config;
mod dispatcher;
mod engine;
mod error;
mod events;
mod functions;
mod inference;
mod model;
mod runtime;
mod store;
mod utils;
mod workflow;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use config::{Config, InferenceConfig, LimitsConfig};
pub use engine::Engine;
pub use error::StageflowError;
pub use events::{Event, GraphEvent, Log, LogLevel, Message, NodeEvent, RunEvent};
pub use functions::{FunctionKind, FunctionOutcome, MemoryStore};
pub use inference::{AgentConfig, InferenceClient, InferenceResponse};
pub use model::*;
pub use runtime::{Channel, ChannelEvent, ChannelOptions, Run, RunId};
pub use store::{Query, Store};
pub use workflow::breaks::{BreakCondition, BreakConfig, BreakDecision};
pub use workflow::loops::{LoopId, LoopMetadata};

/// Result type alias for Stageflow operations.
pub type Result<T> = std::result::Result<T, StageflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
