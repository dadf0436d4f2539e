//! In-memory storage backend.

use std::sync::{Arc, RwLock};

use crate::{
    Result, ShareLock, StageflowError,
    store::{DbCollection, DbStore, Query, Store, data::*},
};

/// One in-memory collection, kept in insertion order.
#[derive(Debug)]
pub struct Collect<T> {
    name: &'static str,
    rows: ShareLock<Vec<T>>,
}

impl<T> Collect<T>
where
    T: DbDocument + Clone + Send + Sync,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<T> DbCollection for Collect<T>
where
    T: DbDocument + Clone + Send + Sync,
{
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        let rows = self.rows.read().unwrap();
        Ok(rows.iter().any(|row| row.id() == id))
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<T> {
        let rows = self.rows.read().unwrap();
        rows.iter()
            .find(|row| row.id() == id)
            .cloned()
            .ok_or(StageflowError::Store(format!("cannot find {}({})", self.name, id)))
    }

    fn query(
        &self,
        query: &Query,
    ) -> Result<Vec<T>> {
        let rows = self.rows.read().unwrap();
        let matched = rows.iter().filter(|row| match &query.rid {
            Some(rid) => row.rid() == rid,
            None => true,
        });
        Ok(match query.limit {
            Some(limit) => matched.take(limit).cloned().collect(),
            None => matched.cloned().collect(),
        })
    }

    fn create(
        &self,
        data: &T,
    ) -> Result<bool> {
        let mut rows = self.rows.write().unwrap();
        if rows.iter().any(|row| row.id() == data.id()) {
            return Err(StageflowError::Store(format!("{}({}) already exists", self.name, data.id())));
        }
        rows.push(data.clone());
        Ok(true)
    }

    fn update(
        &self,
        data: &T,
    ) -> Result<bool> {
        let mut rows = self.rows.write().unwrap();
        match rows.iter_mut().find(|row| row.id() == data.id()) {
            Some(row) => {
                *row = data.clone();
                Ok(true)
            }
            None => Err(StageflowError::Store(format!("cannot find {}({})", self.name, data.id()))),
        }
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        let mut rows = self.rows.write().unwrap();
        let before = rows.len();
        rows.retain(|row| row.id() != id);
        Ok(rows.len() < before)
    }
}

#[derive(Clone)]
pub struct MemStore {
    workflows: Arc<Collect<Workflow>>,
    runs: Arc<Collect<Run>>,
    nodes: Arc<Collect<Node>>,
    logs: Arc<Collect<Log>>,
    events: Arc<Collect<Event>>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            workflows: Arc::new(Collect::new("workflows")),
            runs: Arc::new(Collect::new("runs")),
            nodes: Arc::new(Collect::new("nodes")),
            logs: Arc::new(Collect::new("logs")),
            events: Arc::new(Collect::new("events")),
        }
    }

    pub fn workflows(&self) -> Arc<dyn DbCollection<Item = Workflow> + Send + Sync> {
        self.workflows.clone()
    }

    pub fn runs(&self) -> Arc<dyn DbCollection<Item = Run> + Send + Sync> {
        self.runs.clone()
    }

    pub fn nodes(&self) -> Arc<dyn DbCollection<Item = Node> + Send + Sync> {
        self.nodes.clone()
    }

    pub fn logs(&self) -> Arc<dyn DbCollection<Item = Log> + Send + Sync> {
        self.logs.clone()
    }

    pub fn events(&self) -> Arc<dyn DbCollection<Item = Event> + Send + Sync> {
        self.events.clone()
    }
}

impl DbStore for MemStore {
    fn init(
        &self,
        s: &Store,
    ) {
        s.register(self.workflows());
        s.register(self.runs());
        s.register(self.nodes());
        s.register(self.logs());
        s.register(self.events());
    }
}
