use crate::store::{Error, Record, RecordStore, expires_after};
use sqlx::SqlitePool;
use std::time::Duration;
use time::OffsetDateTime;

/// A builder for creating a [`SqliteStore`].
///
/// Allows customizing the table that holds the records.
#[derive(Debug)]
pub struct SqliteStoreBuilder {
    pool: SqlitePool,
    table_name: String,
    create_table: bool,
}

impl SqliteStoreBuilder {
    /// Creates a new builder with a database pool and default settings.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table_name: "roost_records".to_string(),
            create_table: true,
        }
    }

    /// Sets a custom table name. Defaults to "roost_records".
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Whether `build` creates the table and its expiry index if missing.
    /// Defaults to `true`.
    pub fn create_table(mut self, create_table: bool) -> Self {
        self.create_table = create_table;
        self
    }

    /// Builds the `SqliteStore`, creating the table if configured to.
    pub async fn build(self) -> Result<SqliteStore, sqlx::Error> {
        let table_name = format!("\"{}\"", self.table_name.replace('"', "\"\""));

        if self.create_table {
            let index_name = format!("\"idx_{}_expires_at\"", self.table_name.replace('"', ""));
            sqlx::raw_sql(&format!(
                r#"
                create table if not exists {table_name} (
                    id text primary key,
                    expires_at integer not null,
                    data blob not null
                );
                create index if not exists {index_name} on {table_name}(expires_at);
                "#
            ))
            .execute(&self.pool)
            .await?;
        }

        Ok(SqliteStore {
            pool: self.pool,
            table_name,
        })
    }
}

/// A SQLite-backed record store.
///
/// Expiry instants are stored as Unix milliseconds so the sweep predicate is a
/// plain integer comparison served by the `expires_at` index.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    table_name: String,
}

impl SqliteStore {
    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_millis(instant: OffsetDateTime) -> i64 {
    (instant.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(millis: i64) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| Error::Backend(format!("invalid expiry in store: {e}")))
}

impl RecordStore for SqliteStore {
    async fn create_or_update(&self, id: &str, data: &[u8], ttl: Duration) -> Result<(), Error> {
        let expires_at = expires_after(OffsetDateTime::now_utc(), ttl);
        let query = format!(
            r#"
            insert into {table} (id, expires_at, data)
            values (?, ?, ?)
            on conflict (id) do update
            set expires_at = excluded.expires_at, data = excluded.data
            "#,
            table = self.table_name
        );

        sqlx::query(&query)
            .bind(id)
            .bind(to_millis(expires_at))
            .bind(data)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Record>, Error> {
        let query = format!(
            "select expires_at, data from {table} where id = ?",
            table = self.table_name
        );

        let row: Option<(i64, Vec<u8>)> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((expires_at, data)) => Ok(Some(Record {
                expires_at: from_millis(expires_at)?,
                data,
            })),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), Error> {
        let query = format!("delete from {table} where id = ?", table = self.table_name);
        sqlx::query(&query).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn delete_if_expired(&self, id: &str, now: OffsetDateTime) -> Result<bool, Error> {
        let query = format!(
            "delete from {table} where id = ? and expires_at <= ?",
            table = self.table_name
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(to_millis(now))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn sweep(&self, now: OffsetDateTime) -> Result<u64, Error> {
        let query = format!(
            "delete from {table} where expires_at <= ?",
            table = self.table_name
        );
        let result = sqlx::query(&query)
            .bind(to_millis(now))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
