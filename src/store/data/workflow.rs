use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden, data::DbDocument};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub desc: String,
    /// full workflow model as JSON text
    pub data: String,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Workflow {
    fn iden() -> StoreIden {
        StoreIden::Workflows
    }
}

impl DbDocument for Workflow {
    fn id(&self) -> &str {
        &self.id
    }
}
