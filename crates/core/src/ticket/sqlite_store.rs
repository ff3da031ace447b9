//! SQLite-backed intent store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};

use super::{TicketBuyer, TicketEntry, TicketError, TicketStore};

/// SQLite-backed intent store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite intent store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = Connection::open(path).map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite intent store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ticket_entries (
                hash TEXT PRIMARY KEY,
                project_id INTEGER NOT NULL,
                sku_id INTEGER NOT NULL,
                screen_id INTEGER NOT NULL,
                sale_start INTEGER NOT NULL,
                sale_expire INTEGER NOT NULL,
                buyer TEXT NOT NULL,
                project_name TEXT NOT NULL DEFAULT '',
                sku_name TEXT NOT NULL DEFAULT '',
                screen_name TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ticket_entries_expire ON ticket_entries(sale_expire);
            CREATE INDEX IF NOT EXISTS idx_ticket_entries_start ON ticket_entries(sale_start);
            "#,
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TicketError> {
        self.conn
            .lock()
            .map_err(|_| TicketError::Database("connection mutex poisoned".to_string()))
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<(String, RawEntry)> {
        Ok((
            row.get(0)?,
            RawEntry {
                project_id: row.get(1)?,
                sku_id: row.get(2)?,
                screen_id: row.get(3)?,
                sale_start: row.get(4)?,
                sale_expire: row.get(5)?,
                buyer_json: row.get(6)?,
                project_name: row.get(7)?,
                sku_name: row.get(8)?,
                screen_name: row.get(9)?,
            },
        ))
    }
}

/// Row as stored, before JSON and timestamp decoding.
struct RawEntry {
    project_id: i64,
    sku_id: i64,
    screen_id: i64,
    sale_start: i64,
    sale_expire: i64,
    buyer_json: String,
    project_name: String,
    sku_name: String,
    screen_name: String,
}

impl RawEntry {
    fn decode(self, hash: &str) -> Result<TicketEntry, TicketError> {
        let corrupt = |reason: String| TicketError::Corrupt {
            hash: hash.to_string(),
            reason,
        };
        let buyer: TicketBuyer =
            serde_json::from_str(&self.buyer_json).map_err(|e| corrupt(e.to_string()))?;
        let sale_start = millis_to_datetime(self.sale_start)
            .ok_or_else(|| corrupt(format!("invalid sale_start {}", self.sale_start)))?;
        let sale_expire = millis_to_datetime(self.sale_expire)
            .ok_or_else(|| corrupt(format!("invalid sale_expire {}", self.sale_expire)))?;

        Ok(TicketEntry {
            project_id: self.project_id,
            sku_id: self.sku_id,
            screen_id: self.screen_id,
            sale_start,
            sale_expire,
            buyer,
            project_name: self.project_name,
            sku_name: self.sku_name,
            screen_name: self.screen_name,
        })
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

const SELECT_COLUMNS: &str = "hash, project_id, sku_id, screen_id, sale_start, sale_expire, \
     buyer, project_name, sku_name, screen_name";

impl TicketStore for SqliteTicketStore {
    fn add(&self, entry: &TicketEntry) -> Result<bool, TicketError> {
        let buyer_json = serde_json::to_string(&entry.buyer)
            .map_err(|e| TicketError::Database(format!("Failed to serialize buyer: {}", e)))?;
        let hash = entry.content_hash();

        let conn = self.lock()?;
        let inserted = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO ticket_entries
                    (hash, project_id, sku_id, screen_id, sale_start, sale_expire, buyer,
                     project_name, sku_name, screen_name, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    hash,
                    entry.project_id,
                    entry.sku_id,
                    entry.screen_id,
                    entry.sale_start.timestamp_millis(),
                    entry.sale_expire.timestamp_millis(),
                    buyer_json,
                    entry.project_name,
                    entry.sku_name,
                    entry.screen_name,
                    Utc::now().timestamp_millis(),
                ],
            )
            .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(inserted == 1)
    }

    fn get(&self, hash: &str) -> Result<Option<TicketEntry>, TicketError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM ticket_entries WHERE hash = ?1",
            SELECT_COLUMNS
        );
        let result = conn.query_row(&sql, params![hash], Self::row_to_entry);

        match result {
            Ok((hash, raw)) => raw.decode(&hash).map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TicketError::Database(e.to_string())),
        }
    }

    fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<TicketEntry>, TicketError> {
        let conn = self.lock()?;
        let now_ms = now.timestamp_millis();

        let pruned = conn
            .execute(
                "DELETE FROM ticket_entries WHERE sale_expire <= ?1",
                params![now_ms],
            )
            .map_err(|e| TicketError::Database(e.to_string()))?;
        if pruned > 0 {
            tracing::info!(pruned, "Pruned expired ticket entries");
        }

        let sql = format!(
            "SELECT {} FROM ticket_entries ORDER BY sale_start ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TicketError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_entry)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let (hash, raw) = row.map_err(|e| TicketError::Database(e.to_string()))?;
            match raw.decode(&hash) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(hash = %hash, error = %e, "Skipping corrupt ticket entry"),
            }
        }

        Ok(entries)
    }

    fn remove(&self, hash: &str) -> Result<bool, TicketError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM ticket_entries WHERE hash = ?1", params![hash])
            .map_err(|e| TicketError::Database(e.to_string()))?;
        Ok(deleted > 0)
    }

    fn count(&self) -> Result<i64, TicketError> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM ticket_entries", [], |row| row.get(0))
            .map_err(|e| TicketError::Database(e.to_string()))
    }
}
