use crate::store::{Error, Record, RecordStore};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// An in-memory record store.
///
/// Records live in a sharded [`DashMap`] owned by the store; clones share the
/// same map. Operations on different identities only contend when they hash
/// to the same shard, and never across an await point.
///
/// ### Note
///
/// Nothing is persisted. Records are lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<DashMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records physically held, including expired records the
    /// reclaimer has not reached yet.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl RecordStore for MemoryStore {
    async fn create_or_update(&self, id: &str, data: &[u8], ttl: Duration) -> Result<(), Error> {
        self.data.insert(id.to_owned(), Record::new(data.to_vec(), ttl));
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Record>, Error> {
        Ok(self.data.get(id).map(|record| record.value().clone()))
    }

    async fn delete(&self, id: &str) -> Result<(), Error> {
        self.data.remove(id);
        Ok(())
    }

    async fn delete_if_expired(&self, id: &str, now: OffsetDateTime) -> Result<bool, Error> {
        Ok(self
            .data
            .remove_if(id, |_, record| record.is_expired_at(now))
            .is_some())
    }

    async fn sweep(&self, now: OffsetDateTime) -> Result<u64, Error> {
        let mut removed = 0;
        self.data.retain(|_, record| {
            let keep = !record.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
