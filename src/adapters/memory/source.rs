//! In-memory source feeds for tests and embedding

use crate::adapters::database::traits::SourceReader;
use crate::config::{DimensionConfig, FactConfig};
use crate::domain::{Result, SourceEntity, StarloadError, TransactionLine};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Source reader serving snapshots held in memory, keyed by dimension or fact name
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entities: Arc<RwLock<HashMap<String, Vec<SourceEntity>>>>,
    transactions: Arc<RwLock<HashMap<String, Vec<TransactionLine>>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the snapshot of a dimension
    pub async fn set_entities(&self, dimension: &str, entities: Vec<SourceEntity>) {
        self.entities
            .write()
            .await
            .insert(dimension.to_string(), entities);
    }

    /// Replaces the pending lines of a fact
    pub async fn set_transactions(&self, fact: &str, lines: Vec<TransactionLine>) {
        self.transactions
            .write()
            .await
            .insert(fact.to_string(), lines);
    }

    /// Simulates an unreachable source feed
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StarloadError::source_unavailable(
                "memory",
                "source feed marked unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn read_entities(&self, dimension: &DimensionConfig) -> Result<Vec<SourceEntity>> {
        self.check_available()?;
        Ok(self
            .entities
            .read()
            .await
            .get(&dimension.name)
            .cloned()
            .unwrap_or_default())
    }

    async fn read_pending_transactions(&self, fact: &FactConfig) -> Result<Vec<TransactionLine>> {
        self.check_available()?;
        Ok(self
            .transactions
            .read()
            .await
            .get(&fact.name)
            .cloned()
            .unwrap_or_default())
    }

    fn source_name(&self) -> &str {
        "memory"
    }
}
