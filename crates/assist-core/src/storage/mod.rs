//! Persistent storage: SQLite WAL
//!
//! Callers depend on the narrow repository traits; [`SqliteStore`] is the only
//! implementation and is opened once per process.
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │              SqliteStore              │
//! ├───────────────────┬───────────────────┤
//! │       users       │   query_history   │
//! │ (unique username) │  (append-only)    │
//! └───────────────────┴───────────────────┘
//!      ↓ WAL mode, one connection behind a mutex
//! ```
//!
//! ```no_run
//! use assist_core::config::StoreLocation;
//! use assist_core::storage::{ExchangeRepository, SqliteStore};
//!
//! let store = SqliteStore::open(&StoreLocation::parse("sqlite:///app.db")?)?;
//! println!("{} exchanges", store.count_exchanges()?);
//! # Ok::<(), assist_core::AssistError>(())
//! ```

pub mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::auth::Identity;
use crate::history::{ExchangeRecord, NewExchange};
use crate::Result;

/// Account storage
pub trait IdentityRepository: Send + Sync {
    /// Insert an account; the returned identity carries its assigned id.
    /// A taken username is [`AssistError::DuplicateUser`](crate::AssistError::DuplicateUser).
    fn insert_identity(&self, identity: Identity) -> Result<Identity>;

    fn find_identity(&self, username: &str) -> Result<Option<Identity>>;

    fn touch_last_login(&self, username: &str, at: DateTime<Utc>) -> Result<()>;

    /// All accounts ordered by username
    fn list_identities(&self) -> Result<Vec<Identity>>;
}

/// Append-only exchange log
pub trait ExchangeRepository: Send + Sync {
    fn append_exchange(&self, exchange: &NewExchange) -> Result<ExchangeRecord>;

    /// Newest first
    fn list_exchanges(&self, limit: Option<usize>) -> Result<Vec<ExchangeRecord>>;

    fn count_exchanges(&self) -> Result<u64>;
}
