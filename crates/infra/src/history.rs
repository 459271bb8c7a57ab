//! Append-only history of committed withdrawals.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockroom_core::RecordId;
use stockroom_inventory::{HistoryDraft, HistoryRecord};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("history storage unavailable: {0}")]
    Unavailable(String),
}

/// Append-only record store. Ids are assigned by `append`, from 1 upward,
/// with no gaps.
pub trait HistoryLog: Send + Sync {
    fn append(&self, draft: HistoryDraft, committed_at: DateTime<Utc>) -> Result<HistoryRecord, HistoryError>;

    fn get(&self, id: RecordId) -> Result<Option<HistoryRecord>, HistoryError>;

    /// Every record, oldest first.
    fn list(&self) -> Result<Vec<HistoryRecord>, HistoryError>;

    /// The latest `limit` records, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>, HistoryError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> HistoryLog for Arc<S>
where
    S: HistoryLog + ?Sized,
{
    fn append(&self, draft: HistoryDraft, committed_at: DateTime<Utc>) -> Result<HistoryRecord, HistoryError> {
        (**self).append(draft, committed_at)
    }

    fn get(&self, id: RecordId) -> Result<Option<HistoryRecord>, HistoryError> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        (**self).list()
    }

    fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>, HistoryError> {
        (**self).recent(limit)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// In-memory history log for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryHistoryLog {
    records: RwLock<Vec<HistoryRecord>>,
}

impl InMemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> HistoryError {
    HistoryError::Unavailable("lock poisoned".to_string())
}

impl HistoryLog for InMemoryHistoryLog {
    fn append(&self, draft: HistoryDraft, committed_at: DateTime<Utc>) -> Result<HistoryRecord, HistoryError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let id = RecordId(records.len() as u64 + 1);
        let record = draft.commit(id, committed_at);
        records.push(record.clone());
        Ok(record)
    }

    fn get(&self, id: RecordId) -> Result<Option<HistoryRecord>, HistoryError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let idx = id.value().checked_sub(1).map(|i| i as usize);
        Ok(idx.and_then(|i| records.get(i)).cloned())
    }

    fn list(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        Ok(self.records.read().map_err(|_| poisoned())?.clone())
    }

    fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>, HistoryError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }
}
