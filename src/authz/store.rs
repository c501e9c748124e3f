//! Durable tuple storage boundary.
//!
//! The engine only needs three individually atomic operations from a backend: load every
//! tuple at startup, insert one, and delete by pattern. `DbTupleStore` in
//! [`crate::storage`] is the relational backend; [`MemoryTupleStore`] keeps tuples in
//! process for tests and local development.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::authz::types::{Tuple, TuplePattern};

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("Database error: {0}")]
    #[diagnostic(code(permissions::store::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Corrupt tuple row: {0}")]
    #[diagnostic(
        code(permissions::store::corrupt),
        help("Persisted actions must be `read`/`write` and roles `owner`/`admin`/`member`")
    )]
    Corrupt(String),

    #[error("Refusing to delete with a pattern that matches every tuple")]
    #[diagnostic(code(permissions::store::unbounded_delete))]
    UnboundedDelete,

    #[error("Storage write did not finish: {0}")]
    #[diagnostic(code(permissions::store::interrupted))]
    Interrupted(String),
}

#[async_trait]
pub trait TupleStore: Send + Sync {
    /// Every persisted tuple, of both kinds.
    async fn load_all(&self) -> Result<Vec<Tuple>, StoreError>;

    /// Persist one tuple. Inserting a tuple that already exists is not an error.
    async fn insert(&self, tuple: &Tuple) -> Result<(), StoreError>;

    /// Delete every tuple matching `pattern`, returning how many rows went away.
    /// Unbounded patterns are rejected.
    async fn delete(&self, pattern: &TuplePattern) -> Result<u64, StoreError>;
}

/// Tuple store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTupleStore {
    tuples: RwLock<Vec<Tuple>>,
}

impl MemoryTupleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded store, as if the tuples had been persisted by an earlier process.
    pub fn with_tuples(tuples: impl IntoIterator<Item = Tuple>) -> Self {
        let mut seeded: Vec<Tuple> = Vec::new();
        for tuple in tuples {
            if !seeded.contains(&tuple) {
                seeded.push(tuple);
            }
        }
        Self {
            tuples: RwLock::new(seeded),
        }
    }

    pub async fn len(&self) -> usize {
        self.tuples.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tuples.read().await.is_empty()
    }
}

#[async_trait]
impl TupleStore for MemoryTupleStore {
    async fn load_all(&self) -> Result<Vec<Tuple>, StoreError> {
        Ok(self.tuples.read().await.clone())
    }

    async fn insert(&self, tuple: &Tuple) -> Result<(), StoreError> {
        let mut tuples = self.tuples.write().await;
        if !tuples.contains(tuple) {
            tuples.push(tuple.clone());
        }
        Ok(())
    }

    async fn delete(&self, pattern: &TuplePattern) -> Result<u64, StoreError> {
        if pattern.is_unbounded() {
            return Err(StoreError::UnboundedDelete);
        }
        let mut tuples = self.tuples.write().await;
        let before = tuples.len();
        tuples.retain(|t| !pattern.matches(t));
        Ok((before - tuples.len()) as u64)
    }
}
