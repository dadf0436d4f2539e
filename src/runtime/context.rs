use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU32, Ordering},
    },
};

use crate::{
    Result, ShareLock, StageflowError,
    common::{MemCache, Shutdown},
    config::LimitsConfig,
    events::{Event, GraphEvent, Log, LogLevel, Message},
    runtime::{Channel, RunId},
    utils,
    workflow::{
        loops::{LoopId, LoopMetadata},
        node::NodeId,
    },
};

/// A detected loop currently eligible for re-iteration, together with the
/// cancellation token that force-stop uses to interrupt in-flight members.
pub struct ActiveLoop {
    pub meta: LoopMetadata,
    pub token: Arc<Shutdown>,
}

/// Per-run mutable state threaded through the orchestration call chain.
///
/// Owns the output map, the env map, the global execution counter and the
/// active-loop registry. One context belongs to exactly one in-flight run.
#[derive(Clone)]
pub struct RunContext {
    rid: RunId,
    user_input: String,
    limits: LimitsConfig,
    env: Arc<MemCache<String, String>>,
    // plain map: output keys are bounded by workflow size and must never
    // be evicted mid-run
    outputs: ShareLock<HashMap<String, String>>,
    global_executions: Arc<AtomicU32>,
    active_loops: ShareLock<HashMap<LoopId, ActiveLoop>>,
    channel: Arc<Channel>,

    shutdown: Arc<Shutdown>,
}

impl RunContext {
    pub fn new(
        rid: RunId,
        user_input: String,
        limits: LimitsConfig,
        channel: Arc<Channel>,
    ) -> Self {
        Self {
            rid,
            user_input,
            limits,
            env: Arc::new(MemCache::new(1024)),
            outputs: Arc::new(RwLock::new(HashMap::new())),
            global_executions: Arc::new(AtomicU32::new(0)),
            active_loops: Arc::new(RwLock::new(HashMap::new())),
            channel,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub fn rid(&self) -> RunId {
        self.rid.to_owned()
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    pub fn env(&self) -> Arc<MemCache<String, String>> {
        self.env.clone()
    }

    /// Store a node output under `key` (a node id, or `nid:port`).
    pub fn add_output(
        &self,
        key: impl Into<String>,
        output: String,
    ) {
        self.outputs.write().unwrap().insert(key.into(), output);
    }

    pub fn get_output(
        &self,
        key: &str,
    ) -> Option<String> {
        self.outputs.read().unwrap().get(key).cloned()
    }

    /// Count one node execution against the run-wide ceiling.
    ///
    /// Exceeding the ceiling is fatal for the whole run, unlike the per-node
    /// ceiling which only skips the offending node.
    pub fn bump_global(&self) -> Result<u32> {
        let count = self.global_executions.fetch_add(1, Ordering::SeqCst) + 1;
        if count > self.limits.max_global_executions {
            return Err(StageflowError::Limit(format!(
                "global execution limit reached ({} executions)",
                self.limits.max_global_executions
            )));
        }
        Ok(count)
    }

    pub fn global_executions(&self) -> u32 {
        self.global_executions.load(Ordering::SeqCst)
    }

    pub fn register_loops(
        &self,
        loops: Vec<LoopMetadata>,
    ) {
        let mut active = self.active_loops.write().unwrap();
        for meta in loops {
            active.insert(
                meta.id.clone(),
                ActiveLoop {
                    meta,
                    token: Arc::new(Shutdown::new()),
                },
            );
        }
    }

    pub fn has_active_loops(&self) -> bool {
        !self.active_loops.read().unwrap().is_empty()
    }

    /// The cancellation token of an active loop, if the loop still runs.
    pub fn loop_token(
        &self,
        loop_id: &LoopId,
    ) -> Option<Arc<Shutdown>> {
        self.active_loops.read().unwrap().get(loop_id).map(|l| l.token.clone())
    }

    /// Mutate one active loop's metadata in place.
    pub fn with_loop_mut<R>(
        &self,
        loop_id: &LoopId,
        f: impl FnOnce(&mut LoopMetadata) -> R,
    ) -> Option<R> {
        self.active_loops.write().unwrap().get_mut(loop_id).map(|l| f(&mut l.meta))
    }

    /// Deactivate a loop, returning its final metadata.
    pub fn remove_loop(
        &self,
        loop_id: &LoopId,
    ) -> Option<LoopMetadata> {
        self.active_loops.write().unwrap().remove(loop_id).map(|l| l.meta)
    }

    /// Fire a loop's cancellation token and deactivate it.
    pub fn force_stop_loop(
        &self,
        loop_id: &LoopId,
    ) -> Option<LoopMetadata> {
        let removed = self.active_loops.write().unwrap().remove(loop_id);
        removed.map(|l| {
            l.token.shutdown();
            l.meta
        })
    }

    /// Advance `current_iteration` on every still-active loop. Called once
    /// per stage sweep.
    pub fn advance_loop_iterations(&self) {
        let mut active = self.active_loops.write().unwrap();
        for l in active.values_mut() {
            l.meta.current_iteration += 1;
        }
    }

    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    pub fn emit_message(
        &self,
        nid: NodeId,
        event: GraphEvent,
    ) {
        let message = Message {
            rid: self.rid.clone(),
            nid,
            event,
        };
        let _ = self.channel.event_queue().send(Event::new(&message));
    }

    pub fn emit_log(
        &self,
        nid: NodeId,
        level: LogLevel,
        content: String,
    ) {
        let log = Log {
            rid: self.rid.clone(),
            nid,
            level,
            content,
            timestamp: utils::time::time_millis(),
        };
        let _ = self.channel.log_queue().send(Event::new(&log));
    }

    pub fn done(&self) {
        self.shutdown.shutdown();
    }

    pub fn is_terminated(&self) -> bool {
        self.shutdown.is_terminated()
    }

    pub fn wait_shutdown(&self) -> impl Future<Output = ()> + Send + 'static {
        self.shutdown.wait()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tokio::runtime::Builder;

    use super::*;

    fn context() -> RunContext {
        let runtime = Arc::new(Builder::new_multi_thread().worker_threads(1).enable_all().build().unwrap());
        let limits = LimitsConfig {
            max_global_executions: 3,
            ..LimitsConfig::default()
        };
        RunContext::new(utils::longid(), "go".to_string(), limits, Arc::new(Channel::new(runtime)))
    }

    fn sample_loop(id: &str) -> LoopMetadata {
        LoopMetadata::new(
            id.to_string(),
            BTreeSet::from(["a".to_string(), "b".to_string()]),
            vec!["c1".to_string()],
            None,
        )
    }

    #[test]
    fn test_bump_global_enforces_ceiling() {
        let ctx = context();
        assert_eq!(ctx.bump_global().unwrap(), 1);
        assert_eq!(ctx.bump_global().unwrap(), 2);
        assert_eq!(ctx.bump_global().unwrap(), 3);
        assert!(ctx.bump_global().is_err());
    }

    #[test]
    fn test_outputs_keyed_by_node_and_port() {
        let ctx = context();
        ctx.add_output("n1", "plain".to_string());
        ctx.add_output("n1:true", "ported".to_string());
        assert_eq!(ctx.get_output("n1").as_deref(), Some("plain"));
        assert_eq!(ctx.get_output("n1:true").as_deref(), Some("ported"));
        assert!(ctx.get_output("n2").is_none());
    }

    #[test]
    fn test_every_output_survives_a_large_run() {
        let ctx = context();
        for i in 0..10_000 {
            ctx.add_output(format!("n{i}"), i.to_string());
        }
        assert_eq!(ctx.get_output("n0").as_deref(), Some("0"));
        assert_eq!(ctx.get_output("n9999").as_deref(), Some("9999"));
    }

    #[test]
    fn test_loop_registry_lifecycle() {
        let ctx = context();
        ctx.register_loops(vec![sample_loop("loop-0"), sample_loop("loop-1")]);
        assert!(ctx.has_active_loops());

        ctx.advance_loop_iterations();
        let iter = ctx.with_loop_mut(&"loop-0".to_string(), |m| m.current_iteration).unwrap();
        assert_eq!(iter, 1);

        let token = ctx.loop_token(&"loop-1".to_string()).unwrap();
        assert!(!token.is_terminated());
        ctx.force_stop_loop(&"loop-1".to_string());
        assert!(token.is_terminated());

        ctx.remove_loop(&"loop-0".to_string());
        assert!(!ctx.has_active_loops());
    }
}
