//! SQLite-backed primitive store.
//!
//! Every write appends a row to `documents` and demotes the previous head
//! of the same id, so one SQLite file keeps the full version history while
//! readers only see current heads. The `referrers` table indexes which
//! document version names which id.

use std::{
    fmt,
    path::Path,
    sync::{Mutex, MutexGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use rusqlite::{Connection, params};

use crate::{Document, PrimitiveId, VersionToken, generate_id};

use super::{BatchOp, PrimitiveStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    version INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    timestamp INTEGER,
    deleted INTEGER NOT NULL DEFAULT 0,
    head INTEGER NOT NULL DEFAULT 1,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS documents_by_id ON documents (id, head);
CREATE TABLE IF NOT EXISTS referrers (
    target TEXT NOT NULL,
    version INTEGER NOT NULL REFERENCES documents (version)
);
CREATE INDEX IF NOT EXISTS referrers_by_target ON referrers (target);
";

const SELECT_DOCUMENT: &str = "SELECT version, id, timestamp, deleted, body FROM documents";

/// Persistent [`PrimitiveStore`] over a single SQLite database.
pub struct SqlitePrimitiveStore {
    connection: Mutex<Connection>,
}

impl fmt::Debug for SqlitePrimitiveStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlitePrimitiveStore").finish_non_exhaustive()
    }
}

impl SqlitePrimitiveStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let connection = Connection::open(path.as_ref()).map_err(backend("open"))?;
        Self::with_connection(connection)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(backend("open"))?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self, StoreError> {
        connection
            .execute_batch(SCHEMA)
            .map_err(backend("migrate"))?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Unavailable {
                message: "SQLite connection lock poisoned".to_owned(),
            })
    }
}

fn backend(operation: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |source| StoreError::backend(operation, source)
}

struct RawDocument {
    version: i64,
    id: String,
    timestamp: Option<i64>,
    deleted: bool,
    body: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDocument> {
    Ok(RawDocument {
        version: row.get(0)?,
        id: row.get(1)?,
        timestamp: row.get(2)?,
        deleted: row.get(3)?,
        body: row.get(4)?,
    })
}

fn decode(raw: RawDocument) -> Result<Document, StoreError> {
    let version = VersionToken::new(raw.version.to_string());
    let primitive = serde_json::from_str(&raw.body).map_err(|source| StoreError::Decode {
        version: version.clone(),
        source,
    })?;
    let timestamp = raw
        .timestamp
        .map(u64::try_from)
        .transpose()
        .map_err(|source| StoreError::backend("decode timestamp", source))?;
    Ok(Document {
        id: raw.id,
        version,
        timestamp,
        deleted: raw.deleted,
        primitive,
    })
}

fn now_millis() -> Option<i64> {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(elapsed.as_millis()).ok()
}

fn load_versions(connection: &Connection, id: &str) -> Result<Vec<Document>, StoreError> {
    let mut statement = connection
        .prepare(&format!(
            "{SELECT_DOCUMENT} WHERE id = ?1 AND head = 1 ORDER BY version"
        ))
        .map_err(backend("get_versions"))?;
    let rows = statement
        .query_map(params![id], read_row)
        .map_err(backend("get_versions"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(backend("get_versions"))?;
    rows.into_iter().map(decode).collect()
}

fn load_version(
    connection: &Connection,
    version: &VersionToken,
) -> Result<Option<Document>, StoreError> {
    let Ok(rowid) = version.as_str().parse::<i64>() else {
        return Ok(None);
    };
    let mut statement = connection
        .prepare(&format!("{SELECT_DOCUMENT} WHERE version = ?1"))
        .map_err(backend("get_by_version"))?;
    let mut rows = statement
        .query_map(params![rowid], read_row)
        .map_err(backend("get_by_version"))?;
    rows.next()
        .transpose()
        .map_err(backend("get_by_version"))?
        .map(decode)
        .transpose()
}

fn load_referrers(connection: &Connection, id: &str) -> Result<Vec<VersionToken>, StoreError> {
    let mut statement = connection
        .prepare(
            "SELECT DISTINCT r.version FROM referrers r \
             JOIN documents d ON d.version = r.version \
             WHERE r.target = ?1 AND d.head = 1 ORDER BY r.version",
        )
        .map_err(backend("get_referrers"))?;
    let versions = statement
        .query_map(params![id], |row| row.get::<_, i64>(0))
        .map_err(backend("get_referrers"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(backend("get_referrers"))?;
    Ok(versions
        .into_iter()
        .map(|version| VersionToken::new(version.to_string()))
        .collect())
}

fn write_ops(
    connection: &mut Connection,
    ops: Vec<BatchOp>,
) -> Result<Vec<VersionToken>, StoreError> {
    let map = backend("write_batch");
    let tx = connection.transaction().map_err(&map)?;
    let timestamp = now_millis();
    let mut written = Vec::with_capacity(ops.len());
    for op in ops {
        let BatchOp::Put { id, value } = op;
        let id = id.unwrap_or_else(generate_id);
        let body = serde_json::to_string(&value)
            .map_err(|source| StoreError::backend("encode", source))?;
        tx.execute("UPDATE documents SET head = 0 WHERE id = ?1", params![id])
            .map_err(&map)?;
        tx.execute(
            "INSERT INTO documents (id, timestamp, deleted, body) VALUES (?1, ?2, 0, ?3)",
            params![id, timestamp, body],
        )
        .map_err(&map)?;
        let version = tx.last_insert_rowid();
        for target in value.element.references() {
            tx.execute(
                "INSERT INTO referrers (target, version) VALUES (?1, ?2)",
                params![target, version],
            )
            .map_err(&map)?;
        }
        written.push(VersionToken::new(version.to_string()));
    }
    tx.commit().map_err(&map)?;
    Ok(written)
}

fn load_ids(connection: &Connection) -> Result<Vec<PrimitiveId>, StoreError> {
    let mut statement = connection
        .prepare("SELECT DISTINCT id FROM documents WHERE head = 1 ORDER BY id")
        .map_err(backend("list_ids"))?;
    statement
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(backend("list_ids"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(backend("list_ids"))
}

#[async_trait]
impl PrimitiveStore for SqlitePrimitiveStore {
    async fn get_versions(&self, id: &str) -> Result<Vec<Document>, StoreError> {
        let connection = self.lock()?;
        load_versions(&connection, id)
    }

    async fn get_by_version(
        &self,
        version: &VersionToken,
    ) -> Result<Option<Document>, StoreError> {
        let connection = self.lock()?;
        load_version(&connection, version)
    }

    async fn get_referrers(&self, id: &str) -> Result<Vec<VersionToken>, StoreError> {
        let connection = self.lock()?;
        load_referrers(&connection, id)
    }

    async fn write_batch(&self, ops: Vec<BatchOp>) -> Result<Vec<VersionToken>, StoreError> {
        let mut connection = self.lock()?;
        let written = write_ops(&mut connection, ops)?;
        log::debug!("wrote {} primitive(s) to SQLite", written.len());
        Ok(written)
    }

    async fn list_ids(&self) -> Result<Vec<PrimitiveId>, StoreError> {
        let connection = self.lock()?;
        load_ids(&connection)
    }
}
