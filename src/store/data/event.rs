use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden, data::DbDocument};

#[derive(Default, Deserialize, Serialize, Debug, Clone)]
pub struct Event {
    pub id: String,
    pub rid: String,
    pub nid: String,
    pub name: String,
    pub message: String,

    pub timestamp: i64,
}

impl DbCollectionIden for Event {
    fn iden() -> StoreIden {
        StoreIden::Events
    }
}

impl DbDocument for Event {
    fn id(&self) -> &str {
        &self.id
    }

    fn rid(&self) -> &str {
        &self.rid
    }
}
