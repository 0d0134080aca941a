//! Expiring record storage.
//!
//! A [`RecordStore`] maps an identity to an expiry instant and an opaque byte
//! payload. Two backends ship with the crate:
//!
//! - [`memory::MemoryStore`], a sharded concurrent map living in the process.
//! - `sqlite::SqliteStore` (feature `sqlite-store`), a single SQL table.
//!
//! Both present the same observable behavior: a record whose expiry has been
//! reached is absent to readers even before the [`Reclaimer`] physically
//! removes it.

use std::future::Future;
use std::time::Duration;

use time::OffsetDateTime;

pub mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "sqlite-store")]
pub mod sqlite;

mod reclaimer;
pub use reclaimer::Reclaimer;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Encoding failed with: {0}")]
    Encode(String),

    #[error("Decoding failed with: {0}")]
    Decode(String),

    #[error("{0}")]
    Backend(String),

    #[cfg(feature = "sqlite-store")]
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// A stored payload together with the instant it stops being visible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub expires_at: OffsetDateTime,
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            expires_at: expires_after(OffsetDateTime::now_utc(), ttl),
            data,
        }
    }

    /// A record is expired once `now` has reached its expiry.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

/// Returns `now + ttl`, saturating at the largest representable instant.
pub fn expires_after(now: OffsetDateTime, ttl: Duration) -> OffsetDateTime {
    let ttl = time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX);
    now.saturating_add(ttl)
}

/// Backend contract shared by every store.
///
/// Identities are plain strings: either a generated [`Id`](crate::Id) or a key
/// supplied by the caller.
pub trait RecordStore: Clone + Send + Sync + 'static {
    /// Inserts or replaces the record at `id`, expiring `ttl` from now.
    fn create_or_update(
        &self,
        id: &str,
        data: &[u8],
        ttl: Duration,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Fetches the record at `id` as stored, expired or not.
    fn load(&self, id: &str) -> impl Future<Output = Result<Option<Record>, Error>> + Send;

    /// Removes the record at `id`. Removing an absent record is not an error.
    fn delete(&self, id: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes the record at `id` only if it is expired at `now`.
    ///
    /// Returns `true` if a record was removed. A record renewed concurrently is
    /// left untouched.
    fn delete_if_expired(
        &self,
        id: &str,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Removes every record expired at `now` and returns how many went.
    fn sweep(&self, now: OffsetDateTime) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Returns the payload at `id` if present and not expired.
    ///
    /// An expired record is also removed. That cleanup is best effort: a
    /// failure is logged and the read still reports the record as absent.
    fn read(&self, id: &str) -> impl Future<Output = Result<Option<Vec<u8>>, Error>> + Send {
        async move { Ok(self.read_record(id).await?.map(|record| record.data)) }
    }

    /// Like [`RecordStore::read`], keeping the expiry alongside the payload.
    fn read_record(&self, id: &str) -> impl Future<Output = Result<Option<Record>, Error>> + Send {
        async move {
            let Some(record) = self.load(id).await? else {
                return Ok(None);
            };

            let now = OffsetDateTime::now_utc();
            if record.is_expired_at(now) {
                tracing::debug!("record expired, removing lazily");
                if let Err(err) = self.delete_if_expired(id, now).await {
                    tracing::warn!(err = %err, "failed to remove expired record");
                }
                return Ok(None);
            }

            Ok(Some(record))
        }
    }
}
