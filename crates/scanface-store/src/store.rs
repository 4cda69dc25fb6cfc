use crate::error::StoreResult;
use crate::rows::DAY_FORMAT;
use chrono::NaiveDate;
use rusqlite::params;
use std::path::Path;
use tokio_rusqlite::Connection;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS identities (
        id TEXT PRIMARY KEY,
        external_id TEXT UNIQUE,
        first_name TEXT,
        last_name TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS face_encodings (
        identity_id TEXT PRIMARY KEY REFERENCES identities(id) ON DELETE CASCADE,
        dim INTEGER NOT NULL,
        vector BLOB NOT NULL
    );

    CREATE TABLE IF NOT EXISTS attendance_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity_id TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
        class_name TEXT NOT NULL,
        civil_day TEXT NOT NULL,
        entered_at TEXT NOT NULL,
        exited_at TEXT,
        image_ref TEXT,
        status TEXT NOT NULL CHECK (status IN ('entered', 'exited')),
        UNIQUE (identity_id, class_name, civil_day)
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_day ON attendance_sessions(civil_day);
";

/// Handle to the attendance database. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open (or create) the database file and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).await?;
        let store = Self { conn };
        store.init(true).await?;
        tracing::info!(path = %path.display(), "attendance database opened");
        Ok(store)
    }

    /// Open a private in-memory database.
    pub async fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init(false).await?;
        Ok(store)
    }

    async fn init(&self, on_disk: bool) -> StoreResult<()> {
        self.conn
            .call(move |conn| {
                if on_disk {
                    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
                }
                conn.execute_batch("PRAGMA foreign_keys=ON;")?;
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Number of enrolled identities.
    pub async fn count_identities(&self) -> StoreResult<i64> {
        let n: i64 = self
            .conn
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?)
            })
            .await?;
        Ok(n)
    }

    /// Number of sessions opened on `day`.
    pub async fn count_sessions_on(&self, day: NaiveDate) -> StoreResult<i64> {
        let day = day.format(DAY_FORMAT).to_string();
        let n: i64 = self
            .conn
            .call(move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM attendance_sessions WHERE civil_day = ?1",
                    params![day],
                    |row| row.get(0),
                )?)
            })
            .await?;
        Ok(n)
    }
}
