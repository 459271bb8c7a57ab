//! Stock ledger: the single source of truth for available quantities.
//!
//! Each material is a row behind its own async mutex. Readers take the row
//! lock briefly; writers go through [`LedgerTxn`], which holds the locks of
//! every row it touches, stages changes and applies them all at once on
//! [`LedgerTxn::commit`]. Dropping a transaction discards staged changes.
//!
//! Row locks are always acquired in `MaterialId` order under a single
//! deadline, so overlapping transactions cannot deadlock and a transaction
//! that cannot get all of its rows in time fails with `Busy`.

mod txn;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;

use stockroom_core::{Entity, MaterialId};
use stockroom_inventory::Material;

pub use txn::{DebitOutcome, LedgerTxn, LevelChange};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("material not found: {0}")]
    NotFound(MaterialId),

    #[error("material already exists: {0}")]
    AlreadyExists(MaterialId),

    #[error("could not lock {rows} row(s) within {waited_ms} ms")]
    Busy { rows: usize, waited_ms: u64 },

    #[error("ledger index lock poisoned")]
    Poisoned,
}

#[derive(Debug)]
pub(crate) struct Row {
    pub(crate) material: Material,
    /// Set when the material is deleted; holders of a stale handle see NotFound.
    pub(crate) retired: bool,
}

type RowHandle = Arc<Mutex<Row>>;

/// In-memory stock ledger with per-row locking.
#[derive(Debug, Default)]
pub struct StockLedger {
    rows: RwLock<BTreeMap<MaterialId, RowHandle>>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new row. Only the reservation engine calls this.
    pub(crate) fn insert(&self, material: Material) -> Result<(), LedgerError> {
        let mut rows = self.rows.write().map_err(|_| LedgerError::Poisoned)?;
        let id = Entity::id(&material).clone();
        if rows.contains_key(&id) {
            return Err(LedgerError::AlreadyExists(id));
        }
        rows.insert(
            id,
            Arc::new(Mutex::new(Row {
                material,
                retired: false,
            })),
        );
        Ok(())
    }

    /// Drop a retired row from the index.
    pub(crate) fn forget(&self, id: &MaterialId) {
        if let Ok(mut rows) = self.rows.write() {
            rows.remove(id);
        }
    }

    pub fn contains(&self, id: &MaterialId) -> bool {
        self.rows.read().map(|r| r.contains_key(id)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, id: &MaterialId) -> Result<RowHandle, LedgerError> {
        let rows = self.rows.read().map_err(|_| LedgerError::Poisoned)?;
        rows.get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    /// Current state of one material.
    pub async fn get(&self, id: &MaterialId) -> Result<Material, LedgerError> {
        let handle = self.handle(id)?;
        let row = handle.lock().await;
        if row.retired {
            return Err(LedgerError::NotFound(id.clone()));
        }
        Ok(row.material.clone())
    }

    /// All materials, ordered by id.
    pub async fn list(&self) -> Vec<Material> {
        let handles: Vec<RowHandle> = match self.rows.read() {
            Ok(rows) => rows.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };

        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            let row = handle.lock().await;
            if !row.retired {
                out.push(row.material.clone());
            }
        }
        out
    }

    /// Lock every row in `ids` (any order, duplicates allowed) for one transaction.
    ///
    /// Rows are locked in ascending id order. The whole acquisition shares one
    /// deadline of `timeout`; on expiry every lock taken so far is released.
    pub async fn lock(&self, ids: &[MaterialId], timeout: Duration) -> Result<LedgerTxn, LedgerError> {
        let mut ordered: Vec<MaterialId> = ids.to_vec();
        ordered.sort();
        ordered.dedup();

        let handles = ordered
            .iter()
            .map(|id| self.handle(id).map(|h| (id.clone(), h)))
            .collect::<Result<Vec<_>, _>>()?;

        let started = Instant::now();
        let acquire = async {
            let mut guards = BTreeMap::new();
            for (id, handle) in handles {
                let guard = handle.lock_owned().await;
                guards.insert(id, guard);
            }
            guards
        };

        let guards = tokio::time::timeout(timeout, acquire)
            .await
            .map_err(|_| LedgerError::Busy {
                rows: ordered.len(),
                waited_ms: started.elapsed().as_millis() as u64,
            })?;

        if let Some((id, _)) = guards.iter().find(|(_, g)| g.retired) {
            return Err(LedgerError::NotFound(id.clone()));
        }

        Ok(LedgerTxn::new(guards))
    }
}
