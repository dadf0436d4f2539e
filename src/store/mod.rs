//! Storage layer for persisting workflows, runs, and events.
//!
//! Collections are registered behind [`DbCollection`] so alternative
//! backends can replace the in-memory one; the engine ships with
//! [`MemStore`].

pub mod data;
mod mem;
mod store;

use strum::{AsRefStr, EnumIter};

use crate::Result;

pub use mem::{Collect, MemStore};
pub use store::Store;

/// Identifiers for different storage collections.
#[derive(Debug, Clone, AsRefStr, PartialEq, Hash, Eq, EnumIter)]
pub enum StoreIden {
    /// Workflow definitions.
    #[strum(serialize = "workflows")]
    Workflows,
    /// Execution events.
    #[strum(serialize = "events")]
    Events,
    /// Run instances.
    #[strum(serialize = "runs")]
    Runs,
    /// Node execution records.
    #[strum(serialize = "nodes")]
    Nodes,
    /// Log entries.
    #[strum(serialize = "logs")]
    Logs,
}

/// Record filter for collection queries.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// only records belonging to this run
    pub rid: Option<String>,
    /// cap on the number of returned records
    pub limit: Option<usize>,
}

impl Query {
    pub fn by_rid(rid: impl Into<String>) -> Self {
        Self {
            rid: Some(rid.into()),
            limit: None,
        }
    }
}

/// Trait for types that can identify their storage collection.
pub trait DbCollectionIden {
    /// Returns the collection identifier for this type.
    fn iden() -> StoreIden;
}

/// Trait for database collection operations.
pub trait DbCollection: Send + Sync {
    /// The type of items stored in this collection.
    type Item;

    /// Checks if a record with the given ID exists.
    fn exists(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// Finds a record by ID.
    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item>;

    /// Queries records matching the filter, in insertion order.
    fn query(
        &self,
        query: &Query,
    ) -> Result<Vec<Self::Item>>;

    /// Creates a new record.
    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Updates an existing record.
    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Deletes a record by ID.
    fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;
}

/// Trait for database store initialization.
pub trait DbStore {
    /// Initializes the database and registers collections with the store.
    fn init(
        &self,
        s: &Store,
    );
}
