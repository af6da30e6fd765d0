use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

use super::connection::DbConnection;
use crate::error::{EngineError, EngineResult};
use crate::reinforcement::state::{StateKey, ValueKey};
use crate::reinforcement::value_store::{ValueEntry, ValueStore, ValueUpdate};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS q_values (
    state_key   TEXT NOT NULL,
    action      TEXT NOT NULL,
    value       REAL NOT NULL,
    last_state  TEXT,
    last_reward REAL NOT NULL DEFAULT 0,
    last_query  TEXT NOT NULL DEFAULT '',
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (state_key, action)
);
CREATE INDEX IF NOT EXISTS idx_q_values_updated_at ON q_values(updated_at);
";

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Value store backed by a SQLite table
///
/// The table has no link to the graph: keys of nodes that disappeared after a
/// rebuild simply stop being read.
#[derive(Debug, Clone)]
pub struct SqliteValueStore {
    db: DbConnection,
}

impl SqliteValueStore {
    /// Open (and create if needed) the value table in a database file
    pub fn open(path: &Path) -> EngineResult<Self> {
        info!("Opening value store at {}", path.display());
        Self::with_connection(DbConnection::open(Some(path))?)
    }

    /// Value table in a private in-memory database
    pub fn open_in_memory() -> EngineResult<Self> {
        Self::with_connection(DbConnection::open(None::<&Path>)?)
    }

    pub fn with_connection(db: DbConnection) -> EngineResult<Self> {
        db.execute_batch(SCHEMA)?;
        Ok(Self { db })
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<ValueEntry> {
        let updated_at: String = row.get(6)?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(ValueEntry {
            key: ValueKey::new(StateKey::from_raw(row.get::<_, String>(0)?), row.get::<_, String>(1)?),
            value: row.get(2)?,
            last_state: row.get(3)?,
            last_reward: row.get(4)?,
            last_query: row.get(5)?,
            updated_at,
        })
    }
}

impl ValueStore for SqliteValueStore {
    fn get_value(&self, key: &ValueKey) -> EngineResult<Option<f64>> {
        let conn = self.db.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM q_values WHERE state_key = ?1 AND action = ?2",
                params![key.state.as_str(), key.action],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn get_best_value(&self, state: &StateKey) -> EngineResult<Option<(String, f64)>> {
        let conn = self.db.lock()?;
        // The upsert keeps the rowid, so rowid order is first-written order
        let best = conn
            .query_row(
                "SELECT action, value FROM q_values WHERE state_key = ?1
                 ORDER BY value DESC, rowid ASC LIMIT 1",
                params![state.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )
            .optional()?;
        Ok(best)
    }

    fn set_value(&self, update: ValueUpdate<'_>) -> EngineResult<()> {
        let entry = update.to_entry()?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO q_values
                (state_key, action, value, last_state, last_reward, last_query, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(state_key, action) DO UPDATE SET
                value = excluded.value,
                last_state = excluded.last_state,
                last_reward = excluded.last_reward,
                last_query = excluded.last_query,
                updated_at = excluded.updated_at",
            params![
                entry.key.state.as_str(),
                entry.key.action,
                entry.value,
                entry.last_state,
                entry.last_reward,
                entry.last_query,
                timestamp(entry.updated_at),
            ],
        )?;
        Ok(())
    }

    fn entry(&self, key: &ValueKey) -> EngineResult<Option<ValueEntry>> {
        let conn = self.db.lock()?;
        let entry = conn
            .query_row(
                "SELECT state_key, action, value, last_state, last_reward, last_query, updated_at
                 FROM q_values WHERE state_key = ?1 AND action = ?2",
                params![key.state.as_str(), key.action],
                Self::row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn len(&self) -> EngineResult<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM q_values", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|e| EngineError::persistence(e.to_string()))
    }

    fn clear(&self) -> EngineResult<()> {
        let conn = self.db.lock()?;
        let removed = conn.execute("DELETE FROM q_values", [])?;
        info!("Cleared {} stored values", removed);
        Ok(())
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> EngineResult<usize> {
        let conn = self.db.lock()?;
        // Fixed-width UTC timestamps sort chronologically
        let removed = conn.execute(
            "DELETE FROM q_values WHERE updated_at < ?1",
            params![timestamp(cutoff)],
        )?;
        debug!("Purged {} values older than {}", removed, cutoff);
        Ok(removed)
    }
}
