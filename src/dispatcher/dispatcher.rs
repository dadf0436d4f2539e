//! Run dispatcher: the stage-by-stage execution orchestrator.
//!
//! The dispatcher is responsible for:
//! - Processing run commands (Start, Abort, StopLoop)
//! - Sweeping the stages in declared order, executing each stage's nodes
//!   concurrently and joining them before the next stage starts
//! - Resolving node inputs from upstream outputs
//! - Driving loop re-iteration and break-condition evaluation
//! - Enforcing the per-node, per-loop and run-wide safety ceilings

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use futures::future::join_all;
use regex::Regex;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::{
    Result, StageflowError,
    common::{Queue, Shutdown, Vars},
    events::{
        ErrorReason, GraphEvent, LogLevel, LoopExitedEvent, LoopLimitEvent, NodeEvent, RunAbortedEvent, RunEvent, RunFailedEvent, RunStartEvent, SkipReason,
    },
    functions::{FunctionExecutor, FunctionOutcome},
    inference::{AgentConfig, InferenceClient, InferenceRequest},
    runtime::{RunCommand, RunContext},
    utils,
    workflow::{
        Workflow,
        breaks::should_exit_loop,
        loops::{LoopId, detect_loops},
        node::{DEFAULT_OUTPUT_PORT, Node, NodeId, NodeKind, NodeOutput, NodeStatus},
    },
};

const NO_INPUT: &str = "No input provided";
const INPUT_SEPARATOR: &str = "\n\n---\n\n";

/// What one node contributed to the current sweep.
enum SweepOutcome {
    /// executed (or was stopped), no loop opinion
    Done,
    /// skipped by the per-node execution ceiling
    Skipped,
    /// a loop member executed and its loop wants another sweep
    LoopContinue,
    /// a loop member executed and its loop exited
    LoopExit,
}

/// Workflow run dispatcher.
///
/// One dispatcher drives one run: it owns the command loop and the sweep
/// algorithm, and holds the function executor and inference client the run
/// dispatches node work to.
pub struct Dispatcher {
    ctx: Arc<RunContext>,
    workflow: Arc<Workflow>,
    command_queue: Arc<Queue<RunCommand>>,
    runtime: Arc<Runtime>,
    functions: Arc<FunctionExecutor>,
    inference: Arc<dyn InferenceClient>,
    shutdown: Arc<Shutdown>,
}

impl Dispatcher {
    pub fn new(
        ctx: Arc<RunContext>,
        workflow: Arc<Workflow>,
        command_queue: Arc<Queue<RunCommand>>,
        runtime: Arc<Runtime>,
        functions: Arc<FunctionExecutor>,
        inference: Arc<dyn InferenceClient>,
    ) -> Self {
        Self {
            ctx,
            workflow,
            command_queue,
            runtime,
            functions,
            inference,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Starts the dispatcher's command loop.
    pub fn start(&self) {
        let ctx = self.ctx.clone();
        let workflow = self.workflow.clone();
        let command_queue = self.command_queue.clone();
        let runtime = self.runtime.clone();
        let functions = self.functions.clone();
        let inference = self.inference.clone();
        let shutdown = self.shutdown.clone();

        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,

                    cmd_opt = command_queue.next_async() => {
                        if let Some(cmd) = cmd_opt {
                            match cmd {
                                RunCommand::Start => {
                                    let ctx = ctx.clone();
                                    let workflow = workflow.clone();
                                    let functions = functions.clone();
                                    let inference = inference.clone();
                                    runtime.spawn(async move {
                                        Self::execute_run(&ctx, &workflow, &functions, &inference).await;
                                    });
                                }
                                RunCommand::Abort => {
                                    ctx.emit_message("".to_string(), GraphEvent::Run(RunEvent::Aborted(RunAbortedEvent {
                                        reason: "Aborted by command".to_string(),
                                        outputs: workflow.outputs_snapshot(),
                                    })));
                                    ctx.emit_log("".to_string(), LogLevel::Warning, "Run aborted by command".to_string());
                                    ctx.done();
                                }
                                RunCommand::StopLoop(loop_id) => {
                                    Self::force_stop_loop(&ctx, &workflow, &loop_id);
                                }
                            }
                        }
                    }
                }
            }
        });
    }

    /// Stops the dispatcher.
    pub fn stop(&self) {
        self.shutdown.shutdown();
    }

    /// Latest primary output of every node, as vars keyed by node id.
    pub fn outputs(&self) -> Vars {
        let mut result = Vars::new();
        for (nid, output) in self.workflow.outputs_snapshot() {
            result.set(nid.as_str(), output);
        }
        result
    }

    /// Checks if the dispatcher has completed execution.
    pub fn is_complete(&self) -> bool {
        self.shutdown.is_terminated()
    }

    fn force_stop_loop(
        ctx: &Arc<RunContext>,
        workflow: &Arc<Workflow>,
        loop_id: &LoopId,
    ) {
        if let Some(meta) = ctx.force_stop_loop(loop_id) {
            workflow.clear_loop_members(loop_id);
            ctx.emit_message("".to_string(), GraphEvent::Run(RunEvent::LoopExited(LoopExitedEvent {
                loop_id: loop_id.clone(),
                reason: "force stopped".to_string(),
                iterations: meta.current_iteration,
            })));
            ctx.emit_log("".to_string(), LogLevel::Warning, format!("Loop {} force stopped after {} iterations", loop_id, meta.current_iteration));
        }
    }

    /// Run the whole workflow to completion or to a safety limit.
    async fn execute_run(
        ctx: &Arc<RunContext>,
        workflow: &Arc<Workflow>,
        functions: &Arc<FunctionExecutor>,
        inference: &Arc<dyn InferenceClient>,
    ) {
        workflow.reset();
        debug!("run {} graph:\n{}", ctx.rid(), workflow.schema());

        let order = workflow.node_order();
        let loops = detect_loops(&workflow.connections(), &order);
        for meta in &loops {
            if !meta.has_config {
                ctx.emit_log(
                    "".to_string(),
                    LogLevel::Warning,
                    format!("Loop {} has no break condition configured; safety ceilings apply", meta.id),
                );
            }
        }
        workflow.mark_loop_members(&loops);
        ctx.register_loops(loops);

        ctx.emit_message("".to_string(), GraphEvent::Run(RunEvent::Start(RunStartEvent {
            node_ids: workflow.get_all_node_ids(),
        })));
        ctx.emit_log("".to_string(), LogLevel::Info, "Starting workflow run".to_string());

        let max_sweeps = ctx.limits().max_loop_iterations;
        let mut sweeps: u32 = 0;

        loop {
            sweeps += 1;
            ctx.advance_loop_iterations();

            let mut continue_loop = false;

            for stage in workflow.stages() {
                if ctx.is_terminated() {
                    return;
                }
                debug!("sweep {} stage {}", sweeps, stage.id);

                let results = join_all(
                    stage
                        .node_ids
                        .iter()
                        .map(|nid| Self::execute_node(ctx, workflow, functions, inference, nid.clone())),
                )
                .await;

                for result in results {
                    match result {
                        Ok(SweepOutcome::LoopContinue) => continue_loop = true,
                        Ok(_) => {}
                        Err(err) => {
                            // run-wide ceiling: fatal, partial outputs reported
                            ctx.emit_log("".to_string(), LogLevel::Error, err.to_string());
                            ctx.emit_message("".to_string(), GraphEvent::Run(RunEvent::Failed(RunFailedEvent {
                                error: err.to_string(),
                            })));
                            ctx.done();
                            return;
                        }
                    }
                }
            }

            if ctx.is_terminated() {
                return;
            }

            if !continue_loop || !ctx.has_active_loops() {
                break;
            }

            if sweeps >= max_sweeps {
                ctx.emit_message("".to_string(), GraphEvent::Run(RunEvent::LoopLimitReached(LoopLimitEvent {
                    iterations: sweeps,
                })));
                ctx.emit_log(
                    "".to_string(),
                    LogLevel::Warning,
                    format!("Loop iteration limit of {} reached; stopping with partial results", max_sweeps),
                );
                break;
            }
        }

        ctx.emit_message("".to_string(), GraphEvent::Run(RunEvent::Succeeded));
        ctx.emit_log("".to_string(), LogLevel::Success, "Workflow run completed".to_string());
        ctx.done();
    }

    /// Execute a single node within the current sweep.
    ///
    /// Returns `Err` only for the run-wide execution ceiling; every
    /// node-local failure is recorded as the node's output instead.
    async fn execute_node(
        ctx: &Arc<RunContext>,
        workflow: &Arc<Workflow>,
        functions: &Arc<FunctionExecutor>,
        inference: &Arc<dyn InferenceClient>,
        nid: NodeId,
    ) -> Result<SweepOutcome> {
        if ctx.is_terminated() {
            return Ok(SweepOutcome::Done);
        }

        let node = workflow
            .get_node(&nid)
            .ok_or(StageflowError::Node(format!("node {} not found", nid)))?;

        ctx.bump_global()?;

        if node.execution_count >= node.max_executions {
            ctx.emit_message(nid.clone(), GraphEvent::Node(NodeEvent::Skipped(SkipReason::ExecutionLimit(node.max_executions))));
            ctx.emit_log(
                nid.clone(),
                LogLevel::Warning,
                format!("Node {} skipped: execution limit of {} reached", node.name, node.max_executions),
            );
            return Ok(SweepOutcome::Skipped);
        }

        let input = Self::resolve_input(ctx, workflow, &nid);

        workflow.set_node_status(&nid, NodeStatus::Running);
        ctx.emit_message(nid.clone(), GraphEvent::Node(NodeEvent::Running(utils::time::time_millis())));
        ctx.emit_log(nid.clone(), LogLevel::Running, format!("Executing node {}", node.name));

        let outcome = match &node.kind {
            NodeKind::Agent {
                agent,
            } => match Self::execute_agent(ctx, inference, &node, agent, &input).await {
                Some(outcome) => outcome,
                // cancelled mid-flight by run or loop shutdown
                None => {
                    workflow.set_node_status(&nid, NodeStatus::Idle);
                    ctx.emit_message(nid.clone(), GraphEvent::Node(NodeEvent::Stopped(utils::time::time_millis())));
                    return Ok(SweepOutcome::Done);
                }
            },
            NodeKind::Function {
                function_type,
                config,
                ..
            } => {
                let config = resolve_config(config, &ctx.env());
                functions.execute(*function_type, &config, &input, &ctx.rid()).await
            }
            NodeKind::Tool => FunctionOutcome::failed("tool nodes are not directly executable"),
        };

        let output_text = Self::record_outcome(ctx, workflow, &node, outcome);

        // loop bookkeeping with the node's output, error text included
        if let Some(loop_id) = &node.loop_id {
            let decision = ctx.with_loop_mut(loop_id, |meta| {
                let decision = should_exit_loop(meta, &output_text);
                meta.push_history(output_text.clone());
                decision
            });

            match decision {
                Some(decision) if decision.should_exit => {
                    if let Some(meta) = ctx.remove_loop(loop_id) {
                        workflow.clear_loop_members(loop_id);
                        ctx.emit_message("".to_string(), GraphEvent::Run(RunEvent::LoopExited(LoopExitedEvent {
                            loop_id: loop_id.clone(),
                            reason: decision.reason.clone(),
                            iterations: meta.current_iteration,
                        })));
                        ctx.emit_log(
                            nid.clone(),
                            LogLevel::Info,
                            format!("Loop {} exited after {} iterations: {}", loop_id, meta.current_iteration, decision.reason),
                        );
                    }
                    return Ok(SweepOutcome::LoopExit);
                }
                Some(_) => return Ok(SweepOutcome::LoopContinue),
                // loop already exited or was force stopped
                None => {}
            }
        }

        Ok(SweepOutcome::Done)
    }

    /// Concatenate upstream outputs in declared connection order.
    ///
    /// A connection with a named output port reads `from:port` first and
    /// falls back to the bare node id. Nodes without incoming connections
    /// read the run's user input.
    fn resolve_input(
        ctx: &Arc<RunContext>,
        workflow: &Arc<Workflow>,
        nid: &str,
    ) -> String {
        let incoming = workflow.incoming_connections(nid);
        if incoming.is_empty() {
            let user_input = ctx.user_input();
            if user_input.is_empty() {
                return NO_INPUT.to_string();
            }
            return user_input.to_string();
        }

        let parts: Vec<String> = incoming
            .iter()
            .filter_map(|conn| ctx.get_output(&conn.output_key()).or_else(|| ctx.get_output(&conn.from)))
            .collect();
        parts.join(INPUT_SEPARATOR)
    }

    /// Call the inference service for an agent node, racing the run and
    /// per-loop cancellation tokens. `None` means the call was cancelled.
    async fn execute_agent(
        ctx: &Arc<RunContext>,
        inference: &Arc<dyn InferenceClient>,
        node: &Node,
        agent: &AgentConfig,
        input: &str,
    ) -> Option<FunctionOutcome> {
        let env = ctx.env();
        let mut agent = agent.clone();
        agent.system_prompt = resolve_env(&agent.system_prompt, &env);
        agent.user_prompt = agent.user_prompt.as_deref().map(|p| resolve_env(p, &env));

        let request = InferenceRequest {
            agent_config: agent,
            input: input.to_string(),
            global_user_input: ctx.user_input().to_string(),
            stream: false,
        };

        let call = inference.complete(request);
        let response = match node.loop_id.as_ref().and_then(|id| ctx.loop_token(id)) {
            Some(token) => {
                tokio::select! {
                    _ = ctx.wait_shutdown() => return None,
                    _ = token.wait() => return None,
                    res = call => res,
                }
            }
            None => {
                tokio::select! {
                    _ = ctx.wait_shutdown() => return None,
                    res = call => res,
                }
            }
        };

        Some(match response {
            Ok(response) if response.success => {
                for tool_output in &response.tool_outputs {
                    ctx.emit_log(node.id.clone(), LogLevel::Info, format!("Tool {}: {}", tool_output.tool_id, tool_output.output));
                }
                FunctionOutcome::text(response.output)
            }
            Ok(response) => FunctionOutcome::failed(response.error.unwrap_or("inference failed".to_string())),
            Err(err) => FunctionOutcome::failed(err.to_string()),
        })
    }

    /// Store a node's outputs and status, emit its events, and return the
    /// text that feeds loop bookkeeping and downstream inputs.
    ///
    /// A failed outcome becomes the node's output so downstream nodes see
    /// the error text as data; only the run-wide ceiling aborts the run.
    fn record_outcome(
        ctx: &Arc<RunContext>,
        workflow: &Arc<Workflow>,
        node: &Node,
        outcome: FunctionOutcome,
    ) -> String {
        let nid = node.id.clone();
        let now = utils::time::time_millis();

        if outcome.success {
            let primary = outcome.primary();
            ctx.add_output(nid.clone(), primary.clone());
            for (port, value) in &outcome.outputs {
                ctx.add_output(format!("{}:{}", nid, port), value.clone());
            }

            let output = if outcome.outputs.len() == 1 && outcome.outputs.contains_key(DEFAULT_OUTPUT_PORT) {
                NodeOutput::Text(primary.clone())
            } else {
                NodeOutput::Ports(outcome.outputs)
            };
            workflow.record_result(&nid, NodeStatus::Complete, output);

            ctx.emit_message(nid.clone(), GraphEvent::Node(NodeEvent::Complete(now)));
            ctx.emit_log(nid, LogLevel::Success, format!("Node {} completed", node.name));
            primary
        } else {
            let error_text = outcome.error.unwrap_or("unknown error".to_string());
            ctx.add_output(nid.clone(), error_text.clone());
            workflow.record_result(&nid, NodeStatus::Error, NodeOutput::Text(error_text.clone()));

            ctx.emit_message(nid.clone(), GraphEvent::Node(NodeEvent::Error(ErrorReason::Failed(error_text.clone()))));
            ctx.emit_log(nid, LogLevel::Error, format!("Node {} failed: {}", node.name, error_text));
            error_text
        }
    }
}

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").unwrap());

/// Substitute `${NAME}` references with workflow env values.
fn resolve_env(
    text: &str,
    env: &Arc<crate::common::MemCache<String, String>>,
) -> String {
    ENV_VAR_PATTERN
        .replace_all(text, |caps: &regex::Captures| env.get(&caps[1].to_string()).unwrap_or_default())
        .into_owned()
}

/// Substitute `${NAME}` references in string-valued config fields.
fn resolve_config(
    config: &Vars,
    env: &Arc<crate::common::MemCache<String, String>>,
) -> Vars {
    let mut resolved = Vars::new();
    for (key, value) in config.iter() {
        match value {
            serde_json::Value::String(s) => resolved.insert(key.clone(), resolve_env(s, env).into()),
            other => resolved.insert(key.clone(), other.clone()),
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use std::{
        thread,
        time::{Duration, Instant},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        Config, Engine, EngineBuilder,
        config::LimitsConfig,
        inference::{InferenceRequest, InferenceResponse},
        model::WorkflowModel,
        store::Query,
    };

    struct EchoClient;

    #[async_trait]
    impl InferenceClient for EchoClient {
        async fn complete(
            &self,
            request: InferenceRequest,
        ) -> Result<InferenceResponse> {
            Ok(InferenceResponse::ok(format!("agent: {}", request.input)))
        }
    }

    fn engine_with(limits: LimitsConfig) -> Engine {
        let config = Config {
            limits,
            ..Config::default()
        };
        let engine = EngineBuilder::new()
            .config(config)
            .async_worker_thread_number(2)
            .inference_client(Arc::new(EchoClient))
            .build()
            .unwrap();
        engine.launch();
        engine
    }

    fn engine() -> Engine {
        engine_with(LimitsConfig::default())
    }

    fn wait_until(
        timeout_ms: u64,
        f: impl Fn() -> bool,
    ) -> bool {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        while Instant::now() < deadline {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(25));
        }
        false
    }

    fn run_to_completion(
        engine: &Engine,
        model: &WorkflowModel,
        user_input: &str,
    ) -> Arc<crate::Run> {
        let run = engine.build_run(model, user_input.to_string()).unwrap();
        engine.start_run(run.clone()).unwrap();
        assert!(wait_until(10_000, || run.is_complete()), "run did not finish in time");
        run
    }

    fn run_state(
        engine: &Engine,
        rid: &str,
    ) -> String {
        engine.store().runs().find(rid).map(|r| r.state).unwrap_or_default()
    }

    #[test]
    fn test_stage_order_delivers_latest_upstream_output() {
        let engine = engine();
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-chain", "name": "chain",
                "stages": [
                    {"id": "s1", "name": "first", "nodes": [
                        {"id": "a", "name": "Upper", "kind": "function", "function_type": "to_uppercase"}
                    ]},
                    {"id": "s2", "name": "second", "nodes": [
                        {"id": "b", "name": "Bang", "kind": "function", "function_type": "append", "config": {"value": "!"}}
                    ]}
                ],
                "connections": [{"id": "c1", "from": "a", "to": "b"}]
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, "hello");
        let outputs = run.get_outputs();
        assert_eq!(outputs.get_str("a").as_deref(), Some("HELLO"));
        assert_eq!(outputs.get_str("b").as_deref(), Some("HELLO!"));
        assert!(wait_until(2_000, || run_state(&engine, run.id()) == "Succeeded"));
        engine.shutdown();
    }

    #[test]
    fn test_env_vars_resolve_into_function_config() {
        let engine = engine();
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-env", "name": "env",
                "env": {"SUFFIX": " [done]"},
                "stages": [
                    {"id": "s1", "name": "only", "nodes": [
                        {"id": "a", "name": "Tag", "kind": "function", "function_type": "append", "config": {"value": "${SUFFIX}"}}
                    ]}
                ]
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, "report");
        assert_eq!(run.get_outputs().get_str("a").as_deref(), Some("report [done]"));
        engine.shutdown();
    }

    #[test]
    fn test_multiple_inputs_join_with_separator() {
        let engine = engine();
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-join", "name": "join",
                "stages": [
                    {"id": "s1", "name": "first", "nodes": [
                        {"id": "a", "name": "Upper", "kind": "function", "function_type": "to_uppercase"},
                        {"id": "b", "name": "Lower", "kind": "function", "function_type": "to_lowercase"}
                    ]},
                    {"id": "s2", "name": "second", "nodes": [
                        {"id": "c", "name": "Join", "kind": "function", "function_type": "trim"}
                    ]}
                ],
                "connections": [
                    {"id": "c1", "from": "a", "to": "c"},
                    {"id": "c2", "from": "b", "to": "c"}
                ]
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, "MiXeD");
        let outputs = run.get_outputs();
        assert_eq!(outputs.get_str("c").as_deref(), Some("MIXED\n\n---\n\nmixed"));
        engine.shutdown();
    }

    #[test]
    fn test_multi_output_ports_route_independently() {
        let engine = engine();
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-ports", "name": "ports",
                "stages": [
                    {"id": "s1", "name": "first", "nodes": [
                        {"id": "p", "name": "IsJson", "kind": "function", "function_type": "is_json",
                         "output_ports": ["true", "false"]}
                    ]},
                    {"id": "s2", "name": "second", "nodes": [
                        {"id": "t", "name": "Upper", "kind": "function", "function_type": "to_uppercase"},
                        {"id": "f", "name": "Tail", "kind": "function", "function_type": "append", "config": {"value": "tail"}}
                    ]}
                ],
                "connections": [
                    {"id": "c1", "from": "p", "to": "t", "from_output_port": "true"},
                    {"id": "c2", "from": "p", "to": "f", "from_output_port": "false"}
                ]
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, r#"{"k": 1}"#);
        let outputs = run.get_outputs();
        // the fired port carries the input, the silent port is empty
        assert_eq!(outputs.get_str("t").as_deref(), Some(r#"{"K": 1}"#));
        assert_eq!(outputs.get_str("f").as_deref(), Some("tail"));
        engine.shutdown();
    }

    #[test]
    fn test_node_failure_propagates_as_data() {
        let engine = engine();
        // replace without a 'find' config fails; downstream sees the error text
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-err", "name": "err",
                "stages": [
                    {"id": "s1", "name": "first", "nodes": [
                        {"id": "a", "name": "Bad", "kind": "function", "function_type": "replace"}
                    ]},
                    {"id": "s2", "name": "second", "nodes": [
                        {"id": "b", "name": "Upper", "kind": "function", "function_type": "to_uppercase"}
                    ]}
                ],
                "connections": [{"id": "c1", "from": "a", "to": "b"}]
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, "text");
        let outputs = run.get_outputs();
        let error_text = outputs.get_str("a").unwrap();
        assert!(!error_text.is_empty());
        assert_eq!(outputs.get_str("b").unwrap(), error_text.to_uppercase());
        // node-local failure does not fail the run
        assert!(wait_until(2_000, || run_state(&engine, run.id()) == "Succeeded"));
        engine.shutdown();
    }

    #[test]
    fn test_agent_node_calls_inference_client() {
        let engine = engine();
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-agent", "name": "agent",
                "stages": [
                    {"id": "s1", "name": "first", "nodes": [
                        {"id": "a", "name": "Summarizer", "kind": "agent",
                         "agent": {"system_prompt": "summarize"}}
                    ]}
                ],
                "connections": []
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, "the text");
        assert_eq!(run.get_outputs().get_str("a").as_deref(), Some("agent: the text"));
        engine.shutdown();
    }

    #[test]
    fn test_loop_exits_on_break_condition() {
        let engine = engine();
        // a: memory grows each pass; b: character_count emits "0", "2", "4"
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-loop", "name": "loop",
                "stages": [
                    {"id": "s1", "name": "first", "nodes": [
                        {"id": "a", "name": "Mem", "kind": "function", "function_type": "memory",
                         "config": {"memory_key": "w-loop-test"}}
                    ]},
                    {"id": "s2", "name": "second", "nodes": [
                        {"id": "b", "name": "Count", "kind": "function", "function_type": "character_count"}
                    ]}
                ],
                "connections": [
                    {"id": "c1", "from": "a", "to": "b"},
                    {"id": "c2", "from": "b", "to": "a",
                     "break_config": {"condition": {"type": "contains", "value": "4"}}}
                ]
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, "ignored");
        assert!(wait_until(2_000, || {
            let events = engine.store().events().query(&Query::by_rid(run.id())).unwrap();
            events.iter().any(|e| e.message.contains("LoopExited") && e.message.contains("iterations: 3"))
        }));
        assert!(wait_until(2_000, || run_state(&engine, run.id()) == "Succeeded"));
        engine.shutdown();
    }

    #[test]
    fn test_sweep_ceiling_stops_gracefully() {
        let engine = engine_with(LimitsConfig {
            max_loop_iterations: 4,
            ..LimitsConfig::default()
        });
        // memory + append never stagnate and have no break condition
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-ceiling", "name": "ceiling",
                "stages": [
                    {"id": "s1", "name": "first", "nodes": [
                        {"id": "a", "name": "Mem", "kind": "function", "function_type": "memory",
                         "config": {"memory_key": "w-ceiling-test"}}
                    ]},
                    {"id": "s2", "name": "second", "nodes": [
                        {"id": "b", "name": "Grow", "kind": "function", "function_type": "append", "config": {"value": "x"}}
                    ]}
                ],
                "connections": [
                    {"id": "c1", "from": "a", "to": "b"},
                    {"id": "c2", "from": "b", "to": "a"}
                ]
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, "ignored");
        assert!(wait_until(2_000, || {
            let events = engine.store().events().query(&Query::by_rid(run.id())).unwrap();
            events.iter().any(|e| e.message.contains("LoopLimitReached"))
        }));
        // exactly four sweeps: each loop member completed four times
        let events = engine.store().events().query(&Query::by_rid(run.id())).unwrap();
        let completes = events.iter().filter(|e| e.nid == "a" && e.name.starts_with("Complete")).count();
        assert_eq!(completes, 4);
        assert!(wait_until(2_000, || run_state(&engine, run.id()) == "Succeeded"));
        engine.shutdown();
    }

    #[test]
    fn test_per_node_ceiling_skips_without_failing() {
        let engine = engine_with(LimitsConfig {
            max_loop_iterations: 4,
            ..LimitsConfig::default()
        });
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-skip", "name": "skip",
                "stages": [
                    {"id": "s1", "name": "first", "nodes": [
                        {"id": "a", "name": "Mem", "kind": "function", "function_type": "memory",
                         "config": {"memory_key": "w-skip-test"}, "max_executions": 2}
                    ]},
                    {"id": "s2", "name": "second", "nodes": [
                        {"id": "b", "name": "Mem2", "kind": "function", "function_type": "memory",
                         "config": {"memory_key": "w-skip-b"}}
                    ]}
                ],
                "connections": [
                    {"id": "c1", "from": "a", "to": "b"},
                    {"id": "c2", "from": "b", "to": "a"}
                ]
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, "ignored");
        assert!(wait_until(2_000, || {
            let events = engine.store().events().query(&Query::by_rid(run.id())).unwrap();
            let completes = events.iter().filter(|e| e.nid == "a" && e.name.starts_with("Complete")).count();
            let skips = events.iter().filter(|e| e.nid == "a" && e.name.starts_with("Skipped")).count();
            completes == 2 && skips == 2
        }));
        assert!(wait_until(2_000, || run_state(&engine, run.id()) == "Succeeded"));
        engine.shutdown();
    }

    #[test]
    fn test_engine_memory_accessor_clears_entries() {
        let engine = engine();
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-mem-clear", "name": "mem clear",
                "stages": [
                    {"id": "s1", "name": "only", "nodes": [
                        {"id": "a", "name": "Mem", "kind": "function", "function_type": "memory",
                         "config": {"memory_key": "w-mem-clear-key"}}
                    ]}
                ]
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, "remember this");
        assert!(wait_until(2_000, || run_state(&engine, run.id()) == "Succeeded"));

        let memory = engine.memory();
        assert_eq!(memory.entries("w-mem-clear-key").len(), 1);
        memory.clear("w-mem-clear-key");
        assert!(memory.entries("w-mem-clear-key").is_empty());
        engine.shutdown();
    }

    #[test]
    fn test_configured_node_execution_default_applies() {
        let engine = engine_with(LimitsConfig {
            max_loop_iterations: 3,
            default_node_executions: 1,
            ..LimitsConfig::default()
        });
        // "a" takes the configured default of 1; "b" opts out and drives the loop
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-default", "name": "default",
                "stages": [
                    {"id": "s1", "name": "first", "nodes": [
                        {"id": "a", "name": "Mem", "kind": "function", "function_type": "memory",
                         "config": {"memory_key": "w-default-a"}}
                    ]},
                    {"id": "s2", "name": "second", "nodes": [
                        {"id": "b", "name": "Mem2", "kind": "function", "function_type": "memory",
                         "config": {"memory_key": "w-default-b"}, "max_executions": 10}
                    ]}
                ],
                "connections": [
                    {"id": "c1", "from": "a", "to": "b"},
                    {"id": "c2", "from": "b", "to": "a"}
                ]
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, "seed");
        assert!(wait_until(2_000, || {
            let events = engine.store().events().query(&Query::by_rid(run.id())).unwrap();
            let completes = events.iter().filter(|e| e.nid == "a" && e.name.starts_with("Complete")).count();
            let skips = events.iter().filter(|e| e.nid == "a" && e.name.starts_with("Skipped")).count();
            completes == 1 && skips == 2
        }));
        assert!(wait_until(2_000, || run_state(&engine, run.id()) == "Succeeded"));
        engine.shutdown();
    }

    #[test]
    fn test_global_ceiling_fails_the_run() {
        let engine = engine_with(LimitsConfig {
            max_global_executions: 3,
            ..LimitsConfig::default()
        });
        let model = WorkflowModel::from_json(
            r#"{
                "id": "w-fatal", "name": "fatal",
                "stages": [
                    {"id": "s1", "name": "first", "nodes": [
                        {"id": "a", "name": "Mem", "kind": "function", "function_type": "memory",
                         "config": {"memory_key": "w-fatal-test"}}
                    ]},
                    {"id": "s2", "name": "second", "nodes": [
                        {"id": "b", "name": "Grow", "kind": "function", "function_type": "append", "config": {"value": "x"}}
                    ]}
                ],
                "connections": [
                    {"id": "c1", "from": "a", "to": "b"},
                    {"id": "c2", "from": "b", "to": "a"}
                ]
            }"#,
        )
        .unwrap();

        let run = run_to_completion(&engine, &model, "ignored");
        assert!(wait_until(2_000, || run_state(&engine, run.id()) == "Failed"));
        let record = engine.store().runs().find(run.id()).unwrap();
        assert!(record.err.unwrap().contains("global execution limit"));
        engine.shutdown();
    }
}
