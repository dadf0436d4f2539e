use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::{
    events::{GraphEvent, NodeEvent, RunEvent},
    runtime::Channel,
    store::{Store, data},
    utils,
};

/// Background persistence of the event and log streams.
pub struct Monitor {
    store: Arc<Store>,
    channel: Arc<Channel>,

    runtime: Arc<Runtime>,
}

impl Monitor {
    pub fn new(
        store: Arc<Store>,
        channel: Arc<Channel>,
        runtime: Arc<Runtime>,
    ) -> Self {
        Self {
            store,
            channel,
            runtime,
        }
    }

    pub fn monitor(&self) {
        let store = self.store.clone();
        // Subscribe before spawning so no event beats the task to the queue
        let mut event_queue = self.channel.event_queue().subscribe();

        self.runtime.spawn(async move {
            while let Ok(event_msg) = event_queue.recv().await {
                let event = &event_msg;
                // 1. Persist raw event
                let _ = store.events().create(&data::Event {
                    id: utils::longid(),
                    rid: event.rid.clone(),
                    nid: event.nid.clone(),
                    name: match &event.event {
                        GraphEvent::Run(_) => "Run".to_string(),
                        GraphEvent::Node(n) => format!("{:?}", n),
                    },
                    message: format!("{:?}", event.event),
                    timestamp: utils::time::time_millis(),
                });

                // 2. Update entity state (Run / Node)
                match &event.event {
                    GraphEvent::Run(e) => {
                        // Batch-create node records in Pending state on run start
                        if let RunEvent::Start(start_event) = e {
                            let now = utils::time::time_millis();
                            for nid in &start_event.node_ids {
                                let node_data = data::Node {
                                    id: format!("{}-{}", event.rid, nid),
                                    rid: event.rid.clone(),
                                    nid: nid.clone(),
                                    state: "Pending".to_string(),
                                    err: None,
                                    start_time: 0,
                                    end_time: 0,
                                    timestamp: now,
                                };
                                let _ = store.nodes().create(&node_data);
                            }
                        }

                        // Update run state
                        if let Ok(mut run_data) = store.runs().find(&event.rid) {
                            run_data.state = e.str().to_string();
                            run_data.timestamp = utils::time::time_millis();

                            match e {
                                RunEvent::Succeeded | RunEvent::Failed(_) | RunEvent::Aborted(_) => {
                                    run_data.end_time = utils::time::time_millis();
                                }
                                _ => {}
                            }

                            if let RunEvent::Failed(f) = e {
                                run_data.err = Some(f.error.clone());
                            }
                            if let RunEvent::Aborted(a) = e {
                                run_data.err = Some(a.reason.clone());
                            }

                            let _ = store.runs().update(&run_data);
                        }
                    }
                    GraphEvent::Node(n) => {
                        let node_id = format!("{}-{}", event.rid, event.nid);
                        let now = utils::time::time_millis();

                        // Get or create the node record (a Running event can
                        // arrive before the Start event has been processed)
                        let mut node_data = match store.nodes().find(&node_id) {
                            Ok(data) => data,
                            Err(_) => {
                                let new_node = data::Node {
                                    id: node_id.clone(),
                                    rid: event.rid.clone(),
                                    nid: event.nid.clone(),
                                    state: "Pending".to_string(),
                                    err: None,
                                    start_time: 0,
                                    end_time: 0,
                                    timestamp: now,
                                };
                                let _ = store.nodes().create(&new_node);
                                new_node
                            }
                        };

                        node_data.state = n.str().to_string();
                        node_data.timestamp = now;

                        if let NodeEvent::Running(timestamp) = n {
                            node_data.start_time = *timestamp;
                        }

                        if let NodeEvent::Complete(timestamp) = n {
                            node_data.end_time = *timestamp;
                        }

                        if let NodeEvent::Stopped(timestamp) = n {
                            node_data.end_time = *timestamp;
                        }

                        if let NodeEvent::Error(e) = n {
                            node_data.err = Some(e.to_string());
                        }

                        if let NodeEvent::Skipped(reason) = n {
                            node_data.err = Some(reason.to_string());
                        }

                        let _ = store.nodes().update(&node_data);
                    }
                }
            }
        });

        let store = self.store.clone();
        let mut log_queue = self.channel.log_queue().subscribe();

        self.runtime.spawn(async move {
            while let Ok(log_msg) = log_queue.recv().await {
                let log = &log_msg;
                let _ = store.logs().create(&data::Log {
                    id: utils::longid(),
                    rid: log.rid.clone(),
                    nid: log.nid.clone(),
                    level: log.level.as_ref().to_string(),
                    content: log.content.clone(),
                    timestamp: log.timestamp,
                });
            }
        });
    }
}
