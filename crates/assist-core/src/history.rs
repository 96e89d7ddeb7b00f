//! Exchange history recorder
//!
//! The recorder is the only writer of exchanges. Records are append-only.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::prompt::DirectiveKind;
use crate::storage::ExchangeRepository;
use crate::{Result, TIMESTAMP_FORMAT};

/// Exchange about to be stored
#[derive(Debug, Clone)]
pub struct NewExchange {
    pub username: String,
    pub question: String,
    pub response: String,
    pub directive: DirectiveKind,
    pub created_at: DateTime<Utc>,
}

/// A stored question/answer cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRecord {
    pub id: i64,
    pub username: String,
    pub question: String,
    pub response: String,
    pub directive: DirectiveKind,
    pub created_at: DateTime<Utc>,
}

impl ExchangeRecord {
    /// Creation time as `YYYY-MM-DD HH:MM:SS`, local time
    pub fn timestamp(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}

/// Appends exchanges with the current time
#[derive(Clone)]
pub struct HistoryRecorder {
    repo: Arc<dyn ExchangeRepository>,
}

impl fmt::Debug for HistoryRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryRecorder").finish_non_exhaustive()
    }
}

impl HistoryRecorder {
    pub fn new(repo: Arc<dyn ExchangeRepository>) -> Self {
        Self { repo }
    }

    /// Store one exchange tagged with the default directive
    pub fn record(&self, username: &str, question: &str, response: &str) -> Result<ExchangeRecord> {
        self.record_with_directive(username, question, response, DirectiveKind::Default)
    }

    pub fn record_with_directive(
        &self,
        username: &str,
        question: &str,
        response: &str,
        directive: DirectiveKind,
    ) -> Result<ExchangeRecord> {
        let record = self.repo.append_exchange(&NewExchange {
            username: username.to_string(),
            question: question.to_string(),
            response: response.to_string(),
            directive,
            created_at: Utc::now(),
        })?;
        debug!(id = record.id, username, directive = %directive, "Exchange recorded");
        Ok(record)
    }

    /// Newest first
    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<ExchangeRecord>> {
        self.repo.list_exchanges(limit)
    }

    pub fn count(&self) -> Result<u64> {
        self.repo.count_exchanges()
    }
}
