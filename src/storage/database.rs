//! clipkeep - History persistence module
//!
//! Uses SQLite to persist whole-history snapshots across daemon restarts

use std::fs;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::clipboard::models::{Selection, Target};
use crate::history::store::HistorySnapshot;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const TIER_EPHEMERAL: &str = "ephemeral";
const TIER_IMPORTANT: &str = "important";
const TIER_LAST: &str = "last";

/// SQLite-backed snapshot storage.
///
/// Every save replaces the previous snapshot in one transaction, so a
/// missed save only loses recency, never corrupts the history.
pub struct HistoryDb {
    conn: Mutex<Connection>,
}

impl HistoryDb {
    /// Open the history database, creating file and schema if needed
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        log::info!("opening history database at {}", path.display());

        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS selections (
                tier TEXT NOT NULL,
                pos INTEGER NOT NULL,
                target TEXT NOT NULL,
                content BLOB NOT NULL,
                PRIMARY KEY (tier, pos)
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Load the persisted snapshot; a fresh database yields an empty one
    pub fn load(&self) -> Result<HistorySnapshot, DatabaseError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT tier, target, content FROM selections ORDER BY pos ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut snapshot = HistorySnapshot::default();
        for row in rows {
            let (tier, target, content) = row?;
            let selection = Selection::new(content, Target::from(target.as_str()));
            match tier.as_str() {
                TIER_EPHEMERAL => snapshot.ephemeral.push(selection),
                TIER_IMPORTANT => snapshot.important.push(selection),
                TIER_LAST => snapshot.last = Some(selection),
                other => log::warn!("ignoring history row with unknown tier {:?}", other),
            }
        }
        Ok(snapshot)
    }

    /// Replace the persisted snapshot
    pub fn save(&self, snapshot: &HistorySnapshot) -> Result<(), DatabaseError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM selections", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO selections (tier, pos, target, content) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (pos, sel) in snapshot.ephemeral.iter().enumerate() {
                stmt.execute(params![
                    TIER_EPHEMERAL,
                    pos as i64,
                    sel.target.as_str(),
                    &sel.content
                ])?;
            }
            for (pos, sel) in snapshot.important.iter().enumerate() {
                stmt.execute(params![
                    TIER_IMPORTANT,
                    pos as i64,
                    sel.target.as_str(),
                    &sel.content
                ])?;
            }
            if let Some(last) = &snapshot.last {
                stmt.execute(params![TIER_LAST, 0i64, last.target.as_str(), &last.content])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
