//! Record persistence.
//!
//! Records are only ever inserted and read; scan order is enrollment order.

use async_trait::async_trait;
use rollcall_core::{Descriptor, RoleFields, UserRecord};
use rusqlite::{params, ErrorCode};
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("user '{0}' already exists")]
    Duplicate(String),
    #[error("corrupt record '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}

#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the id exists.
    async fn insert(&self, record: UserRecord) -> Result<(), StoreError>;

    async fn exists(&self, id: &str) -> Result<bool, StoreError>;

    /// All records in enrollment order.
    async fn all(&self) -> Result<Vec<UserRecord>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY NOT NULL,
    name        TEXT NOT NULL,
    role        TEXT NOT NULL,
    dob         TEXT,
    usn         TEXT,
    cgpa        TEXT,
    department  TEXT,
    designation TEXT,
    descriptor  BLOB NOT NULL,
    created_at  TEXT NOT NULL
)";

/// Flat row shape shared by reads and writes.
struct UserRow {
    id: String,
    name: String,
    role: String,
    dob: Option<String>,
    usn: Option<String>,
    cgpa: Option<String>,
    department: Option<String>,
    designation: Option<String>,
    descriptor: Vec<u8>,
    created_at: String,
}

impl From<UserRecord> for UserRow {
    fn from(r: UserRecord) -> Self {
        let role = r.role().to_string();
        let (dob, usn, cgpa, department, designation) = match r.fields {
            RoleFields::Student { dob, usn, cgpa } => (Some(dob), Some(usn), Some(cgpa), None, None),
            RoleFields::Staff { department, designation } => {
                (None, None, None, Some(department), Some(designation))
            }
        };
        Self {
            descriptor: r.descriptor.to_le_bytes(),
            id: r.id,
            name: r.name,
            role,
            dob,
            usn,
            cgpa,
            department,
            designation,
            created_at: r.created_at,
        }
    }
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            id: row.id.clone(),
            reason: reason.to_string(),
        };

        let fields = match row.role.as_str() {
            "student" => match (row.dob.clone(), row.usn.clone(), row.cgpa.clone()) {
                (Some(dob), Some(usn), Some(cgpa)) => RoleFields::Student { dob, usn, cgpa },
                _ => return Err(corrupt("incomplete student fields")),
            },
            "staff" => match (row.department.clone(), row.designation.clone()) {
                (Some(department), Some(designation)) => RoleFields::Staff { department, designation },
                _ => return Err(corrupt("incomplete staff fields")),
            },
            _ => return Err(corrupt("unknown role")),
        };
        let descriptor =
            Descriptor::from_le_bytes(&row.descriptor).ok_or_else(|| corrupt("bad descriptor length"))?;

        Ok(UserRecord {
            id: row.id,
            name: row.name,
            fields,
            descriptor,
            created_at: row.created_at,
        })
    }
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = tokio_rusqlite::Connection::open(path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: tokio_rusqlite::Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        let id = record.id.clone();
        let row = UserRow::from(record);

        let inserted = self
            .conn
            .call(move |conn| {
                let result = conn.execute(
                    "INSERT INTO users
                     (id, name, role, dob, usn, cgpa, department, designation, descriptor, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        row.id,
                        row.name,
                        row.role,
                        row.dob,
                        row.usn,
                        row.cgpa,
                        row.department,
                        row.designation,
                        row.descriptor,
                        row.created_at,
                    ],
                );
                match result {
                    Ok(_) => Ok(true),
                    Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                        Ok(false)
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        if !inserted {
            return Err(StoreError::Duplicate(id));
        }
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        let found = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached("SELECT 1 FROM users WHERE id = ?1")?;
                Ok(stmt.exists([&id])?)
            })
            .await?;
        Ok(found)
    }

    async fn all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT id, name, role, dob, usn, cgpa, department, designation, descriptor, created_at
                     FROM users ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            role: row.get(2)?,
                            dob: row.get(3)?,
                            usn: row.get(4)?,
                            cgpa: row.get(5)?,
                            department: row.get(6)?,
                            designation: row.get(7)?,
                            descriptor: row.get(8)?,
                            created_at: row.get(9)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(UserRecord::try_from).collect()
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let n = self
            .conn
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get::<_, i64>(0))?))
            .await?;
        Ok(n as usize)
    }
}

/// In-process store, used by tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Duplicate(record.id));
        }
        records.push(record);
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.read().await.iter().any(|r| r.id == id))
    }

    async fn all(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.records.read().await.clone())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }
}
