use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden, data::DbDocument};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Run {
    pub id: String,
    /// workflow the run was built from
    pub wid: String,

    pub state: String,
    pub start_time: i64,
    pub end_time: i64,
    pub err: Option<String>,
    pub timestamp: i64,
}

impl DbCollectionIden for Run {
    fn iden() -> StoreIden {
        StoreIden::Runs
    }
}

impl DbDocument for Run {
    fn id(&self) -> &str {
        &self.id
    }

    fn rid(&self) -> &str {
        &self.id
    }
}
