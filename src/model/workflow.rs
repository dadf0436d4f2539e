use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    Result, StageflowError,
    model::{ConnectionModel, StageModel},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowModel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub stages: Vec<StageModel>,
    #[serde(default)]
    pub connections: Vec<ConnectionModel>,
}

impl WorkflowModel {
    pub fn from_json(s: &str) -> Result<Self> {
        let workflow = serde_json::from_str::<WorkflowModel>(s);
        match workflow {
            Ok(v) => Ok(v),
            Err(e) => Err(StageflowError::Workflow(format!("{}", e))),
        }
    }
}
