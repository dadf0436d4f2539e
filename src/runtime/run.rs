use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::{
    Result, StageflowError,
    common::{Queue, Vars},
    config::Config,
    dispatcher::Dispatcher,
    events::{GraphEvent, RunEvent},
    functions::FunctionExecutor,
    inference::InferenceClient,
    model::WorkflowModel,
    runtime::{Channel, ChannelOptions, RunContext, channel::ChannelEvent},
    store::Store,
    utils,
    workflow::{Workflow, loops::LoopId},
};

const COMMAND_QUEUE_SIZE: usize = 100;

pub type RunId = String;

#[derive(Debug, Clone)]
pub enum RunCommand {
    Start,
    Abort,
    StopLoop(LoopId),
}

/// One execution of a workflow.
///
/// A run owns its dispatcher and command queue; callers drive it through
/// [`start`], [`abort`] and [`stop_loop`] and observe it through the engine
/// channel.
///
/// [`start`]: Run::start
/// [`abort`]: Run::abort
/// [`stop_loop`]: Run::stop_loop
#[derive(Clone)]
pub struct Run {
    id: RunId,
    wid: String,
    dispatcher: Arc<Dispatcher>,
    command_queue: Arc<Queue<RunCommand>>,
    channel: Arc<Channel>,
}

impl Run {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: &WorkflowModel,
        user_input: String,
        store: Arc<Store>,
        channel: Arc<Channel>,
        runtime: Arc<Runtime>,
        functions: Arc<FunctionExecutor>,
        inference: Arc<dyn InferenceClient>,
        config: &Config,
    ) -> Result<Arc<Run>> {
        let rid = utils::longid();

        let run = store.runs().find(&rid);
        if run.is_ok() {
            return Err(StageflowError::Run(format!("run_id({rid}) is duplicated in running run list")));
        }

        let workflow = Workflow::from_model(model, config.limits.default_node_executions)?;

        let command_queue = Queue::new(COMMAND_QUEUE_SIZE);

        let ctx = Arc::new(RunContext::new(rid.to_owned(), user_input, config.limits.clone(), channel.clone()));

        // set env variables
        model.env.iter().for_each(|(k, v)| ctx.env().set(k.clone(), v.clone()));

        let dispatcher = Arc::new(Dispatcher::new(
            ctx.clone(),
            Arc::new(workflow),
            command_queue.clone(),
            runtime.clone(),
            functions,
            inference,
        ));

        Ok(Arc::new(Run {
            id: rid,
            wid: model.id.clone(),
            dispatcher,
            command_queue,
            channel,
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn wid(&self) -> &str {
        &self.wid
    }

    pub fn start(&self) {
        self.dispatcher.start();

        let dispatcher = self.dispatcher.clone();

        ChannelEvent::channel(self.channel.clone(), ChannelOptions::with_rid(self.id.to_owned())).on_event(move |event| {
            let dispatcher = dispatcher.clone();
            if let GraphEvent::Run(e) = &event.event {
                match e {
                    RunEvent::Succeeded | RunEvent::Failed(_) | RunEvent::Aborted(_) => {
                        dispatcher.stop();
                    }
                    _ => {}
                }
            }
        });

        // Send start command to the command queue
        let _ = self.command_queue.send(RunCommand::Start);
    }

    pub fn abort(&self) {
        let _ = self.command_queue.send(RunCommand::Abort);
    }

    /// Cancel one active loop without touching the rest of the run.
    pub fn stop_loop(
        &self,
        loop_id: LoopId,
    ) {
        let _ = self.command_queue.send(RunCommand::StopLoop(loop_id));
    }

    pub fn get_outputs(&self) -> Vars {
        self.dispatcher.outputs()
    }

    pub fn is_complete(&self) -> bool {
        self.dispatcher.is_complete()
    }
}
