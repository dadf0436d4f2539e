use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden, data::DbDocument};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Node {
    /// record id, `{rid}-{nid}`
    pub id: String,
    pub rid: String,
    pub nid: String,

    pub state: String,
    pub err: Option<String>,
    pub start_time: i64,
    pub end_time: i64,
    pub timestamp: i64,
}

impl DbCollectionIden for Node {
    fn iden() -> StoreIden {
        StoreIden::Nodes
    }
}

impl DbDocument for Node {
    fn id(&self) -> &str {
        &self.id
    }

    fn rid(&self) -> &str {
        &self.rid
    }
}
