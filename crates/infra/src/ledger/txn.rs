use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::error;

use stockroom_core::{DomainResult, MaterialId};
use stockroom_inventory::{Material, MaterialPatch, StockLevel};

use super::{LedgerError, Row};

/// Result of staging a debit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Staged; `remaining` is what the row will hold after commit.
    Committed { remaining: u64 },
    /// Not enough stock; nothing was staged.
    Insufficient { available: u64 },
}

/// Quantity/level of one row after a committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelChange {
    pub material_id: MaterialId,
    pub name: String,
    pub quantity: u64,
    pub from: StockLevel,
    pub to: StockLevel,
}

impl LevelChange {
    pub fn crossed(&self) -> bool {
        self.from != self.to
    }
}

/// Exclusive hold on a set of ledger rows.
///
/// Quantity changes are staged and applied together by [`commit`](Self::commit).
/// Dropping the transaction releases the rows and discards staged changes.
#[derive(Debug)]
pub struct LedgerTxn {
    guards: BTreeMap<MaterialId, OwnedMutexGuard<Row>>,
    staged: BTreeMap<MaterialId, u64>,
}

impl LedgerTxn {
    pub(super) fn new(guards: BTreeMap<MaterialId, OwnedMutexGuard<Row>>) -> Self {
        Self {
            guards,
            staged: BTreeMap::new(),
        }
    }

    /// Committed state of a locked row (staged changes not included).
    pub fn get(&self, id: &MaterialId) -> Option<&Material> {
        self.guards.get(id).map(|g| &g.material)
    }

    /// Quantity the row would hold if committed now.
    pub fn available(&self, id: &MaterialId) -> Result<u64, LedgerError> {
        if let Some(q) = self.staged.get(id) {
            return Ok(*q);
        }
        self.get(id)
            .map(Material::quantity)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    /// Stage a debit of `amount` units. Never takes a row below zero.
    pub fn try_debit(&mut self, id: &MaterialId, amount: u64) -> Result<DebitOutcome, LedgerError> {
        let available = self.available(id)?;
        match available.checked_sub(amount) {
            Some(remaining) => {
                self.staged.insert(id.clone(), remaining);
                Ok(DebitOutcome::Committed { remaining })
            }
            None => Ok(DebitOutcome::Insufficient { available }),
        }
    }

    /// Stage a restock of `amount` units.
    pub fn credit(&mut self, id: &MaterialId, amount: u64) -> Result<u64, LedgerError> {
        let available = self.available(id)?;
        let next = available.saturating_add(amount);
        self.staged.insert(id.clone(), next);
        Ok(next)
    }

    /// Apply a descriptive patch immediately (quantity untouched).
    pub fn patch(&mut self, id: &MaterialId, patch: &MaterialPatch) -> Result<DomainResult<LevelChange>, LedgerError> {
        let guard = self
            .guards
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;
        let from = guard.material.level();
        Ok(guard.material.apply_patch(patch).map(|()| LevelChange {
            material_id: id.clone(),
            name: guard.material.name().to_string(),
            quantity: guard.material.quantity(),
            from,
            to: guard.material.level(),
        }))
    }

    /// Mark a row deleted. Effective immediately for anyone holding a stale handle.
    pub fn retire(&mut self, id: &MaterialId) -> Result<Material, LedgerError> {
        let guard = self
            .guards
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;
        guard.retired = true;
        self.staged.remove(id);
        Ok(guard.material.clone())
    }

    /// Apply every staged quantity and release the rows.
    pub fn commit(mut self) -> Vec<LevelChange> {
        let staged = std::mem::take(&mut self.staged);
        let mut changes = Vec::with_capacity(staged.len());

        for (id, target) in staged {
            let Some(guard) = self.guards.get_mut(&id) else {
                continue;
            };
            let material = &mut guard.material;
            let from = material.level();
            let current = material.quantity();

            let applied = if target < current {
                material.withdraw(current - target)
            } else if target > current {
                material.restock(target - current)
            } else {
                Ok(())
            };
            if let Err(e) = applied {
                // Unreachable while rows are held: staging checked the same bounds.
                error!(material = %id, error = %e, "staged quantity rejected at commit");
                continue;
            }

            changes.push(LevelChange {
                material_id: id,
                name: material.name().to_string(),
                quantity: material.quantity(),
                from,
                to: material.level(),
            });
        }

        changes
    }
}
