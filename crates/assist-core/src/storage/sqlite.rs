//! SqliteStore - identities and query history in one SQLite database

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::fmt;
use tracing::{debug, info};

use super::{ExchangeRepository, IdentityRepository};
use crate::auth::{Identity, Role};
use crate::config::StoreLocation;
use crate::history::{ExchangeRecord, NewExchange};
use crate::prompt::DirectiveKind;
use crate::{AssistError, Result};

const IDENTITY_COLUMNS: &str =
    "id, username, password_hash, role, email, full_name, department, created_at_ms, last_login_ms";

const EXCHANGE_COLUMNS: &str = "id, username, question, response, directive, created_at_ms";

/// SQLite WAL store shared by the whole process
pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: StoreLocation,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database and run migrations
    pub fn open(location: &StoreLocation) -> Result<Self> {
        let conn = match location {
            StoreLocation::Memory => Connection::open_in_memory()?,
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path)?
            }
        };

        // WAL: concurrent readers, serialized writers
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        let store = Self {
            conn: Mutex::new(conn),
            location: location.clone(),
        };
        store.migrate()?;
        info!(location = ?store.location, "Store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(&StoreLocation::Memory)
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Idempotent DDL
    fn migrate(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                username       TEXT NOT NULL UNIQUE,
                password_hash  TEXT NOT NULL,
                role           TEXT NOT NULL DEFAULT 'user',
                email          TEXT,
                full_name      TEXT,
                department     TEXT,
                created_at_ms  INTEGER NOT NULL,
                last_login_ms  INTEGER
            );

            CREATE TABLE IF NOT EXISTS query_history (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                username       TEXT NOT NULL,
                question       TEXT NOT NULL,
                response       TEXT NOT NULL,
                directive      TEXT NOT NULL DEFAULT 'default',
                created_at_ms  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_username
                ON query_history(username, id DESC);
            ",
        )?;
        debug!("Store schema up to date");
        Ok(())
    }
}

impl IdentityRepository for SqliteStore {
    fn insert_identity(&self, identity: Identity) -> Result<Identity> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO users
             (username, password_hash, role, email, full_name, department, created_at_ms, last_login_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                identity.username,
                identity.password_hash,
                identity.role.as_str(),
                identity.email,
                identity.full_name,
                identity.department,
                identity.created_at.timestamp_millis(),
                identity.last_login.map(|t| t.timestamp_millis()),
            ],
        );

        match inserted {
            Ok(_) => Ok(Identity {
                id: conn.last_insert_rowid(),
                ..identity
            }),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(AssistError::DuplicateUser(identity.username))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_identity(&self, username: &str) -> Result<Option<Identity>> {
        let conn = self.conn.lock();
        let identity = conn
            .query_row(
                &format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                identity_from_row,
            )
            .optional()?;
        Ok(identity)
    }

    fn touch_last_login(&self, username: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn.lock().execute(
            "UPDATE users SET last_login_ms = ?1 WHERE username = ?2",
            params![at.timestamp_millis(), username],
        )?;
        Ok(())
    }

    fn list_identities(&self) -> Result<Vec<Identity>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM users ORDER BY username"
        ))?;
        let rows = stmt.query_map([], identity_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl ExchangeRepository for SqliteStore {
    fn append_exchange(&self, exchange: &NewExchange) -> Result<ExchangeRecord> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO query_history (username, question, response, directive, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                exchange.username,
                exchange.question,
                exchange.response,
                exchange.directive.as_str(),
                exchange.created_at.timestamp_millis(),
            ],
        )?;

        Ok(ExchangeRecord {
            id: conn.last_insert_rowid(),
            username: exchange.username.clone(),
            question: exchange.question.clone(),
            response: exchange.response.clone(),
            directive: exchange.directive,
            created_at: exchange.created_at,
        })
    }

    fn list_exchanges(&self, limit: Option<usize>) -> Result<Vec<ExchangeRecord>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EXCHANGE_COLUMNS} FROM query_history ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], exchange_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn count_exchanges(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM query_history", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<Identity> {
    let role: String = row.get(3)?;
    let last_login: Option<i64> = row.get(8)?;
    Ok(Identity {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: if role == Role::Admin.as_str() { Role::Admin } else { Role::User },
        email: row.get(4)?,
        full_name: row.get(5)?,
        department: row.get(6)?,
        created_at: from_millis(row.get(7)?),
        last_login: last_login.map(from_millis),
    })
}

fn exchange_from_row(row: &Row<'_>) -> rusqlite::Result<ExchangeRecord> {
    let directive: String = row.get(4)?;
    Ok(ExchangeRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        question: row.get(2)?,
        response: row.get(3)?,
        directive: DirectiveKind::from_name(&directive),
        created_at: from_millis(row.get(5)?),
    })
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}
