//! In-memory entity source
//!
//! Serves a fixed entity graph instead of the live API, suitable for tests
//! and for replaying a hand-built fixture. Every batch it is asked for is
//! recorded so callers can check how the cache talks to it.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, PoisonError},
};

use crate::error::FetchError;

use super::{Entity, EntitySource};

#[derive(Debug, Default)]
pub struct MemorySource {
    entities: HashMap<String, Entity>,
    /// Ids whose lookup fails like a broken connection would.
    failing: HashSet<String>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, entity: Entity) -> Self {
        self.insert(entity);
        self
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    pub fn failing_on(mut self, id: impl Into<String>) -> Self {
        self.failing.insert(id.into());
        self
    }

    /// Every batch requested so far, in order.
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl EntitySource for MemorySource {
    async fn fetch_entities(&self, ids: &[String]) -> Result<Vec<Entity>, FetchError> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(ids.to_vec());
        if let Some(id) = ids.iter().find(|id| self.failing.contains(*id)) {
            return Err(FetchError::Status {
                url: format!("memory://{id}"),
                status: reqwest::StatusCode::BAD_GATEWAY,
            });
        }
        Ok(ids.iter().filter_map(|id| self.entities.get(id).cloned()).collect())
    }
}
