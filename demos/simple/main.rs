use stageflow::{ChannelEvent, ChannelOptions, EngineBuilder, WorkflowModel};

fn main() {
    let engine = EngineBuilder::new().build().unwrap();

    engine.launch();

    let text = include_str!("./workflow.json");

    let workflow_model = WorkflowModel::from_json(text).unwrap();

    engine.deploy(&workflow_model).unwrap();

    let run = engine.build_run_from_store(&workflow_model.id, "hello stageflow".to_string()).unwrap();
    let rid = run.id().to_string();

    ChannelEvent::channel(engine.channel(), ChannelOptions::with_rid(rid.to_owned())).on_complete(move |rid| {
        println!("Workflow completed, rid: {}", rid);
    });

    ChannelEvent::channel(engine.channel(), ChannelOptions::with_rid(rid.to_owned())).on_error(move |e| {
        println!("Workflow failed: {:?}", e);
    });

    ChannelEvent::channel(engine.channel(), ChannelOptions::with_rid(rid.to_owned())).on_log(move |log| {
        println!("[{}] {}: {}", log.level.as_ref(), log.nid, log.content);
    });

    engine.start_run(run.clone()).unwrap();

    loop {
        if run.is_complete() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    let outputs: serde_json::Value = run.get_outputs().into();
    println!("Outputs: {:#?}", outputs);
}
