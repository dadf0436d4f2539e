use std::sync::{Arc, RwLock};

use tokio::runtime::Runtime;

use crate::{
    ShareLock,
    common::{BroadcastQueue, Shutdown},
    events::{Event, Log, Message},
    runtime::RunId,
};

const EVENT_QUEUE_SIZE: usize = 2048;
const LOG_QUEUE_SIZE: usize = 4096;

pub type RunEventHandle = Arc<dyn Fn(&Event<Message>) + Send + Sync>;
pub type RunLogHandle = Arc<dyn Fn(&Event<Log>) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// glob pattern matched against the run id
    /// eg. rid1*
    pub rid: String,

    /// glob pattern matched against the node id
    /// eg. nid1*
    pub nid: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            rid: "*".to_string(),
            nid: "*".to_string(),
        }
    }
}

#[allow(unused)]
impl ChannelOptions {
    pub fn new(
        rid: String,
        nid: String,
    ) -> Self {
        Self {
            rid,
            nid,
        }
    }

    pub fn with_rid(rid: String) -> Self {
        Self {
            rid,
            nid: "*".to_string(),
        }
    }

    pub fn with_nid(nid: String) -> Self {
        Self {
            rid: "*".to_string(),
            nid,
        }
    }
}

/// Fan-out hub for run events and logs.
///
/// Producers push onto the broadcast queues; a single listener task invokes
/// every registered handler. Handlers must not block.
#[derive(Clone)]
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<Message>>>,
    log_queue: Arc<BroadcastQueue<Event<Log>>>,

    events: ShareLock<Vec<RunEventHandle>>,
    logs: ShareLock<Vec<RunLogHandle>>,

    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            event_queue: BroadcastQueue::new(EVENT_QUEUE_SIZE),
            log_queue: BroadcastQueue::new(LOG_QUEUE_SIZE),
            events: Arc::new(RwLock::new(Vec::new())),
            logs: Arc::new(RwLock::new(Vec::new())),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub(crate) fn event_queue(&self) -> Arc<BroadcastQueue<Event<Message>>> {
        self.event_queue.clone()
    }

    pub(crate) fn log_queue(&self) -> Arc<BroadcastQueue<Event<Log>>> {
        self.log_queue.clone()
    }

    pub(crate) fn listen(&self) {
        let mut event_queue = self.event_queue.subscribe();
        let mut log_queue = self.log_queue.subscribe();
        let events = self.events.clone();
        let logs = self.logs.clone();

        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Ok(event) = event_queue.recv() => {
                        let handlers = events.read().unwrap().clone();
                        for handle in handlers.iter() {
                            (handle)(&event);
                        }
                    }
                    Ok(log) = log_queue.recv() => {
                        let handlers = logs.read().unwrap().clone();
                        for handle in handlers.iter() {
                            (handle)(&log);
                        }
                    }
                }
            }
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// Filtered subscription handle over a [`Channel`].
#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,

    glob: (globset::GlobMatcher, globset::GlobMatcher),
}

#[allow(unused)]
impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Self {
        Self {
            channel,
            glob: (
                globset::Glob::new(&options.rid).unwrap().compile_matcher(),
                globset::Glob::new(&options.nid).unwrap().compile_matcher(),
            ),
        }
    }

    pub fn on_complete(
        &self,
        f: impl Fn(RunId) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if e.event.is_complete() && is_match(&glob, e) {
                f(e.rid.clone());
            }
        }));
    }

    pub fn on_error(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if e.event.is_error() && is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_log(
        &self,
        f: impl Fn(&Event<Log>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.logs.write().unwrap().push(Arc::new(move |e| {
            if is_match_log(&glob, e) {
                f(e);
            }
        }));
    }
}

fn is_match(
    glob: &(globset::GlobMatcher, globset::GlobMatcher),
    e: &Event<Message>,
) -> bool {
    let (pat_rid, pat_nid) = glob;
    pat_rid.is_match(&e.rid) && pat_nid.is_match(&e.nid)
}

fn is_match_log(
    glob: &(globset::GlobMatcher, globset::GlobMatcher),
    e: &Event<Log>,
) -> bool {
    let (pat_rid, pat_nid) = glob;
    pat_rid.is_match(&e.rid) && pat_nid.is_match(&e.nid)
}
