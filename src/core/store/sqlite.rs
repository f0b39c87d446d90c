//! Diesel-backed `StateStore`, persisting checkpoints and dedupe rows to a
//! single SQLite file in WAL mode.

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use super::model::{CheckpointRow, ProcessedEventRow};
use super::schema::{checkpoints, processed_events};
use super::StateStore;
use crate::core::domain::{build_dedupe_key, EventKey};
use crate::error::{Error, Result};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug)]
struct WalMode;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for WalMode {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Creates a pooled connection to `database_url`, enabling WAL mode on every
/// connection and running embedded migrations once up front.
pub fn create_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(5)
        .connection_customizer(Box::new(WalMode))
        .build(manager)
        .map_err(|e| Error::Connection(e.to_string()))?;

    let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Migration(e.to_string()))?;

    Ok(pool)
}

/// A `StateStore` backed by a pooled SQLite connection.
pub struct SqliteStateStore {
    pool: DbPool,
}

impl SqliteStateStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>> {
        self.pool.get().map_err(|e| Error::Connection(e.to_string()))
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn checkpoint_get(&self, stream: &str) -> Result<Option<String>> {
        let stream = stream.to_string();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
            let row = checkpoints::table
                .find(&stream)
                .select(CheckpointRow::as_select())
                .first(&mut conn)
                .optional()?;
            Ok(row.map(|r| r.value))
        })
        .await
        .map_err(|e| Error::Execution(e.to_string()))?
    }

    async fn checkpoint_set(&self, stream: &str, value: &str) -> Result<()> {
        let row = CheckpointRow {
            stream_name: stream.to_string(),
            value: value.to_string(),
        };
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
            diesel::insert_into(checkpoints::table)
                .values(&row)
                .on_conflict(checkpoints::stream_name)
                .do_update()
                .set(checkpoints::value.eq(&row.value))
                .execute(&mut conn)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Execution(e.to_string()))?
    }

    async fn dedupe_mark_seen(&self, key: &EventKey) -> Result<bool> {
        let dedupe_key = build_dedupe_key(key).as_str().to_string();
        let row = ProcessedEventRow {
            dedupe_key,
            event_id: key.event_id.clone(),
            tx_hash: key.tx_hash.clone(),
            sequence: key.sequence.clone(),
            market_id: key.market_id.clone(),
            seen_at_unix: key.seen_at_unix,
        };
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<bool> {
            let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
            let inserted = diesel::insert_or_ignore_into(processed_events::table)
                .values(&row)
                .execute(&mut conn)?;
            Ok(inserted == 1)
        })
        .await
        .map_err(|e| Error::Execution(e.to_string()))?
    }

    async fn dedupe_already_seen(&self, key: &EventKey) -> Result<bool> {
        let dedupe_key = build_dedupe_key(key).as_str().to_string();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<bool> {
            let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
            let row = processed_events::table
                .find(&dedupe_key)
                .select(ProcessedEventRow::as_select())
                .first(&mut conn)
                .optional()?;
            Ok(row.is_some())
        })
        .await
        .map_err(|e| Error::Execution(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SqliteStateStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("coinbot.db");
        let pool = create_pool(db_path.to_str().unwrap()).expect("sqlite pool");
        (dir, SqliteStateStore::new(pool))
    }

    #[tokio::test]
    async fn checkpoint_roundtrips() {
        let (_dir, store) = store();
        assert_eq!(store.checkpoint_get("source_activity").await.unwrap(), None);
        store.checkpoint_set("source_activity", "evt-1").await.unwrap();
        assert_eq!(
            store.checkpoint_get("source_activity").await.unwrap(),
            Some("evt-1".to_string())
        );
        store.checkpoint_set("source_activity", "evt-2").await.unwrap();
        assert_eq!(
            store.checkpoint_get("source_activity").await.unwrap(),
            Some("evt-2".to_string())
        );
    }

    #[tokio::test]
    async fn dedupe_mark_seen_is_insert_if_absent() {
        let (_dir, store) = store();
        let key = EventKey {
            event_id: "evt-1".into(),
            market_id: "m1".into(),
            seen_at_unix: 1,
            ..EventKey::default()
        };
        assert!(store.dedupe_mark_seen(&key).await.unwrap());
        assert!(!store.dedupe_mark_seen(&key).await.unwrap());
        assert!(store.dedupe_already_seen(&key).await.unwrap());
    }
}
