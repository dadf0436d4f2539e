use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden, data::DbDocument};

#[derive(Default, Deserialize, Serialize, Debug, Clone)]
pub struct Log {
    pub id: String,
    pub rid: String,
    pub nid: String,

    /// severity string form: info | running | success | error | warning
    pub level: String,
    pub content: String,
    pub timestamp: i64,
}

impl DbCollectionIden for Log {
    fn iden() -> StoreIden {
        StoreIden::Logs
    }
}

impl DbDocument for Log {
    fn id(&self) -> &str {
        &self.id
    }

    fn rid(&self) -> &str {
        &self.rid
    }
}
