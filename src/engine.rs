//! Workflow engine - the main entry point for Stageflow.
//!
//! The engine manages the lifecycle of workflows and runs, including:
//! - Deploying workflow definitions
//! - Building and starting run instances
//! - Managing the event channel and storage
//! - Graceful shutdown coordination

mod monitor;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::runtime::Runtime;

use crate::{
    ChannelEvent, ChannelOptions, Config, Result, StageflowError,
    common::{MemCache, Queue, Shutdown},
    functions::{FunctionExecutor, MemoryStore},
    inference::{HttpInferenceClient, InferenceClient},
    model::WorkflowModel,
    runtime::{Channel, Run, RunId},
    store::{DbStore, MemStore, Store, data},
    utils,
    workflow::loops::LoopId,
};

use monitor::Monitor;

/// Maximum number of runs to cache in memory.
const RUN_CACHE_SIZE: usize = 2048;
/// Size of the queue for completed run notifications.
const RUN_COMPLETE_QUEUE_SIZE: usize = 100;

/// The main workflow engine.
///
/// Engine is the central coordinator for Stageflow, responsible for:
/// - Managing the tokio runtime for async execution
/// - Coordinating the event channel for pub/sub messaging
/// - Storing workflow definitions and run state
/// - Creating and managing run instances
///
/// # Example
///
/// ```rust,ignore
/// let engine = Engine::new_with_config(Config::default());
/// engine.launch();
///
/// engine.deploy(&workflow_model)?;
///
/// let run = engine.build_run(&workflow_model, "analyze this".to_string())?;
/// let rid = engine.start_run(run)?;
///
/// engine.shutdown();
/// ```
pub struct Engine {
    /// Event channel for broadcasting run events.
    channel: Arc<Channel>,
    /// Persistent storage for workflows and runs.
    store: Arc<Store>,
    /// Background monitor for event persistence.
    monitor: Monitor,
    /// Queue for receiving run completion notifications.
    runs_complete_queue: Arc<Queue<RunId>>,
    /// In-memory cache of active runs.
    runs: Arc<MemCache<RunId, Arc<Run>>>,

    /// Shared function executor (memory store, HTTP client, export dir).
    functions: Arc<FunctionExecutor>,
    /// Inference service boundary for agent nodes.
    inference: Arc<dyn InferenceClient>,
    config: Config,

    /// Flag indicating if the engine is running.
    running: Arc<AtomicBool>,
    /// Tokio runtime for async task execution.
    runtime: Arc<Runtime>,
    /// Shutdown coordinator for graceful termination.
    shutdown: Arc<Shutdown>,
}

impl Engine {
    /// Creates a new engine with the given configuration and the default
    /// HTTP inference client.
    pub fn new_with_config(config: Config) -> Self {
        let runtime = Arc::new(
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.async_worker_thread_number.into())
                .enable_all()
                .build()
                .unwrap(),
        );
        let inference = Arc::new(HttpInferenceClient::new(config.inference.clone()));
        Self::new(config, runtime, inference)
    }

    pub(crate) fn new(
        config: Config,
        runtime: Arc<Runtime>,
        inference: Arc<dyn InferenceClient>,
    ) -> Self {
        let store = Store::new();
        MemStore::new().init(&store);
        let store = Arc::new(store);

        let channel = Arc::new(Channel::new(runtime.clone()));
        let monitor = Monitor::new(store.clone(), channel.clone(), runtime.clone());

        let functions = Arc::new(FunctionExecutor::new(
            Arc::new(MemoryStore::new()),
            config.inference.clone(),
            config.export_dir.clone(),
        ));

        let runs_complete_queue = Queue::new(RUN_COMPLETE_QUEUE_SIZE);

        Self {
            channel,
            store,
            monitor,
            runs_complete_queue,
            runs: Arc::new(MemCache::new(RUN_CACHE_SIZE)),
            functions,
            inference,
            config,
            running: Arc::new(AtomicBool::new(false)),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Starts the engine and begins processing events.
    ///
    /// This method:
    /// - Starts the event monitor for persistence
    /// - Begins listening on the event channel
    /// - Spawns a background task to clean up completed runs
    pub fn launch(&self) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }

        // Register handlers first, then start listening
        // This ensures no events are missed
        self.monitor.monitor();
        self.channel.listen();

        // Run complete queue
        let runs_complete_queue = self.runs_complete_queue.clone();
        ChannelEvent::channel(self.channel.clone(), ChannelOptions::default()).on_complete(move |rid| {
            let _ = runs_complete_queue.send(rid);
        });

        let runs_complete_queue = self.runs_complete_queue.clone();
        let shutdown = self.shutdown.clone();
        let runs = self.runs.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some(rid) = runs_complete_queue.next_async() => {
                        runs.remove(&rid);
                    }
                }
            }
        });
    }

    /// Gracefully shuts down the engine.
    ///
    /// This method:
    /// - Signals all components to stop
    /// - Aborts all active runs
    /// - Shuts down the event channel
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        self.shutdown.shutdown();
        for (_, run) in self.runs.iter() {
            run.abort();
        }
        self.channel.shutdown();
    }

    /// Deploys a workflow definition to the store.
    pub fn deploy(
        &self,
        workflow: &WorkflowModel,
    ) -> Result<bool> {
        self.store.deploy(workflow)
    }

    /// Build a run from a workflow model and the run's user input.
    pub fn build_run(
        &self,
        model: &WorkflowModel,
        user_input: String,
    ) -> Result<Arc<Run>> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(StageflowError::Engine("Engine is not running".to_string()));
        }

        let run = Run::new(
            model,
            user_input,
            self.store.clone(),
            self.channel.clone(),
            self.runtime.clone(),
            self.functions.clone(),
            self.inference.clone(),
            &self.config,
        )?;

        if self.runs.get(&run.id().to_string()).is_some() {
            return Err(StageflowError::Run(format!("Run {} already exists in cache", run.id())));
        }

        Ok(run)
    }

    /// Build a run from a deployed workflow id.
    pub fn build_run_from_store(
        &self,
        wid: &str,
        user_input: String,
    ) -> Result<Arc<Run>> {
        let workflow_data = self.store.workflows().find(wid)?;
        let model = WorkflowModel::from_json(&workflow_data.data)?;
        self.build_run(&model, user_input)
    }

    /// Start a run and return its id.
    /// Returns the rid first, then starts the run execution.
    pub fn start_run(
        &self,
        run: Arc<Run>,
    ) -> Result<String> {
        let rid = run.id().to_string();

        let run_data = data::Run {
            id: rid.clone(),
            wid: run.wid().to_string(),
            state: "Pending".to_string(),
            start_time: utils::time::time_millis(),
            end_time: 0,
            err: None,
            timestamp: utils::time::time_millis(),
        };
        self.store.runs().create(&run_data)?;

        // Add run to cache first (before starting)
        self.runs.set(rid.clone(), run.clone());

        run.start();

        Ok(rid)
    }

    /// Aborts an active run by its ID.
    pub fn stop(
        &self,
        rid: &str,
    ) -> Result<()> {
        let rid_string = rid.to_string();
        if let Some(run) = self.runs.get(&rid_string) {
            run.abort();
            Ok(())
        } else {
            Err(StageflowError::Run(format!("Run {} not found", rid)))
        }
    }

    /// Cancel one loop of an active run, leaving the rest of the run alone.
    pub fn force_stop_loop(
        &self,
        rid: &str,
        loop_id: LoopId,
    ) -> Result<()> {
        let rid_string = rid.to_string();
        if let Some(run) = self.runs.get(&rid_string) {
            run.stop_loop(loop_id);
            Ok(())
        } else {
            Err(StageflowError::Run(format!("Run {} not found", rid)))
        }
    }

    /// Gets a run by its ID from the cache.
    pub fn get_run(
        &self,
        rid: &String,
    ) -> Option<Arc<Run>> {
        self.runs.get(rid)
    }

    /// Returns a reference to the store.
    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    /// Returns a reference to the event channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    /// The process-wide memory store used by memory function nodes.
    ///
    /// Memory entries accumulate across runs; `MemoryStore::clear` is the
    /// only eviction path, so embedders are expected to clear keys they no
    /// longer need.
    pub fn memory(&self) -> Arc<MemoryStore> {
        self.functions.memory()
    }
}
