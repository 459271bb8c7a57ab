//! Reservation engine: the only writer of stock quantities and history.
//!
//! A submission is validated, locks every referenced row in id order under
//! one deadline, checks every line, appends one history record and applies
//! all debits together. Notifications go out after the row locks are
//! released, so a slow subscriber can never hold up a commit.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use stockroom_core::{DomainError, MaterialId, PersonId};
use stockroom_events::{EventBus, EventEnvelope, NotificationDraft, NotificationHub, NotificationKind};
use stockroom_inventory::{
    HistoryDraft, HistoryLine, HistoryRecord, Material, MaterialPatch, NewMaterial, WithdrawalRequest,
};

use crate::config::EngineConfig;
use crate::history::{HistoryError, HistoryLog};
use crate::ledger::{DebitOutcome, LedgerError, LevelChange, StockLedger};

/// Stream name of committed history envelopes on the history bus.
pub const HISTORY_STREAM: &str = "inventory.history";

/// Envelope type carried by the history bus.
pub type HistoryEnvelope = EventEnvelope<JsonValue>;

/// Why a ledger operation was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// Malformed request; a caller bug.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("unknown material: {0}")]
    UnknownMaterial(MaterialId),

    #[error("unknown participant: {0}")]
    UnknownParticipant(PersonId),

    /// Expected business outcome. Nothing was debited.
    #[error("insufficient stock for {material}: requested {requested}, available {available} (short by {shortfall})")]
    InsufficientStock {
        material: MaterialId,
        requested: u64,
        available: u64,
        shortfall: u64,
    },

    /// Row locks could not be acquired in time. Safe to retry.
    #[error("stock ledger busy (waited {waited_ms} ms)")]
    Busy { waited_ms: u64 },

    #[error("material already exists: {0}")]
    Duplicate(MaterialId),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl ReservationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReservationError::Busy { .. })
    }
}

impl From<LedgerError> for ReservationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(id) => ReservationError::UnknownMaterial(id),
            LedgerError::AlreadyExists(id) => ReservationError::Duplicate(id),
            LedgerError::Busy { waited_ms, .. } => ReservationError::Busy { waited_ms },
            LedgerError::Poisoned => ReservationError::Storage(err.to_string()),
        }
    }
}

impl From<HistoryError> for ReservationError {
    fn from(err: HistoryError) -> Self {
        ReservationError::Storage(err.to_string())
    }
}

impl From<DomainError> for ReservationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => ReservationError::Validation(msg),
        }
    }
}

/// Server-owned atomic commit path for withdrawals and stock administration.
pub struct ReservationEngine<H, B> {
    ledger: Arc<StockLedger>,
    history: H,
    bus: B,
    hub: NotificationHub,
    config: EngineConfig,
    /// Serializes history append + bus publish so bus order == record id order.
    commit_gate: Mutex<()>,
}

impl<H, B> ReservationEngine<H, B>
where
    H: HistoryLog,
    B: EventBus<HistoryEnvelope>,
{
    pub fn new(ledger: Arc<StockLedger>, history: H, bus: B, hub: NotificationHub, config: EngineConfig) -> Self {
        Self {
            ledger,
            history,
            bus,
            hub,
            config,
            commit_gate: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &Arc<StockLedger> {
        &self.ledger
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Commit a withdrawal request, all or nothing.
    ///
    /// Insufficient stock names the first failing line in request order.
    pub async fn submit(&self, request: WithdrawalRequest) -> Result<HistoryRecord, ReservationError> {
        request.validate()?;
        if let Some(line) = request.lines().iter().find(|l| !self.ledger.contains(&l.material_id)) {
            return Err(ReservationError::UnknownMaterial(line.material_id.clone()));
        }

        let mut txn = self
            .ledger
            .lock(&request.lock_order(), self.config.lock_timeout)
            .await
            .inspect_err(|e| {
                if let LedgerError::Busy { rows, waited_ms } = e {
                    warn!(rows, waited_ms, "submit timed out waiting for row locks");
                }
            })?;

        let mut lines = Vec::with_capacity(request.lines().len());
        for line in request.lines() {
            match txn.try_debit(&line.material_id, line.quantity)? {
                DebitOutcome::Committed { .. } => {}
                DebitOutcome::Insufficient { available } => {
                    debug!(material = %line.material_id, requested = line.quantity, available, "request rejected");
                    return Err(ReservationError::InsufficientStock {
                        material: line.material_id.clone(),
                        requested: line.quantity,
                        available,
                        shortfall: line.quantity - available,
                    });
                }
            }
            let material = txn
                .get(&line.material_id)
                .ok_or_else(|| ReservationError::UnknownMaterial(line.material_id.clone()))?;
            lines.push(HistoryLine::priced(material, line.quantity));
        }

        let draft = HistoryDraft::new(&request, lines)?;
        let record = self.append_history(draft)?;
        let changes = txn.commit();

        info!(
            record = %record.id,
            materials = record.lines.len(),
            total_value = record.total_value,
            "withdrawal committed"
        );

        for change in changes.iter().filter(|c| c.crossed()) {
            self.hub.publish(crossing_notification(change));
        }
        self.hub.publish(
            NotificationDraft::new(
                NotificationKind::Success,
                format!("Request #{} committed ({} material(s))", record.id, record.lines.len()),
            )
            .with_payload(json!({
                "record_id": record.id,
                "total_value": record.total_value,
                "materials": record.quantities(),
            })),
        );

        Ok(record)
    }

    /// Append under the commit gate and hand the record to the history bus.
    fn append_history(&self, draft: HistoryDraft) -> Result<HistoryRecord, ReservationError> {
        let _gate = self
            .commit_gate
            .lock()
            .map_err(|_| ReservationError::Storage("commit gate poisoned".to_string()))?;

        let record = self.history.append(draft, Utc::now())?;

        match HistoryEnvelope::encode(HISTORY_STREAM, record.id.value(), &record) {
            Ok(envelope) => match self.bus.publish(envelope) {
                Ok(0) => debug!(record = %record.id, "no history consumers subscribed"),
                Ok(_) => {}
                Err(e) => warn!(record = %record.id, error = ?e, "history bus publish failed"),
            },
            Err(e) => warn!(record = %record.id, error = %e, "failed to encode history envelope"),
        }

        Ok(record)
    }

    /// Add a material to the ledger.
    pub async fn register_material(&self, new: NewMaterial) -> Result<Material, ReservationError> {
        let material = new.into_material(Utc::now())?;
        self.ledger.insert(material.clone())?;

        info!(material = %material.material_id(), quantity = material.quantity(), "material registered");
        self.hub.publish(
            NotificationDraft::new(NotificationKind::Info, format!("Material {} added", material.name()))
                .with_payload(material_payload(&material)),
        );
        Ok(material)
    }

    /// Add `amount` units to a material through the locked commit path.
    pub async fn restock(&self, id: &MaterialId, amount: u64) -> Result<Material, ReservationError> {
        if amount == 0 {
            return Err(ReservationError::Validation("restock amount must be positive".to_string()));
        }

        let mut txn = self.ledger.lock(std::slice::from_ref(id), self.config.lock_timeout).await?;
        if txn.available(id)?.checked_add(amount).is_none() {
            return Err(ReservationError::Validation("restock would overflow the stock quantity".to_string()));
        }
        txn.credit(id, amount)?;
        let changes = txn.commit();

        info!(material = %id, amount, "material restocked");
        for change in changes.iter().filter(|c| c.crossed()) {
            self.hub.publish(crossing_notification(change));
        }

        Ok(self.ledger.get(id).await?)
    }

    /// Update descriptive fields and thresholds. Quantity is untouched.
    pub async fn update_material(&self, id: &MaterialId, patch: &MaterialPatch) -> Result<Material, ReservationError> {
        let mut txn = self.ledger.lock(std::slice::from_ref(id), self.config.lock_timeout).await?;
        let change = txn.patch(id, patch)??;
        let updated = txn
            .get(id)
            .cloned()
            .ok_or_else(|| ReservationError::UnknownMaterial(id.clone()))?;
        drop(txn);

        if change.crossed() {
            self.hub.publish(crossing_notification(&change));
        }
        Ok(updated)
    }

    /// Delete a material. Later references see `UnknownMaterial`.
    pub async fn remove_material(&self, id: &MaterialId) -> Result<Material, ReservationError> {
        let mut txn = self.ledger.lock(std::slice::from_ref(id), self.config.lock_timeout).await?;
        let removed = txn.retire(id)?;
        drop(txn);
        self.ledger.forget(id);

        info!(material = %id, "material removed");
        self.hub.publish(
            NotificationDraft::new(NotificationKind::Info, format!("Material {} removed", removed.name()))
                .with_payload(json!({ "material_id": id })),
        );
        Ok(removed)
    }
}

fn material_payload(material: &Material) -> JsonValue {
    json!({
        "material_id": material.material_id(),
        "name": material.name(),
        "quantity": material.quantity(),
        "level": material.level(),
    })
}

fn crossing_notification(change: &LevelChange) -> NotificationDraft {
    let kind = if change.to > change.from {
        match change.to {
            stockroom_inventory::StockLevel::Critique => NotificationKind::Error,
            _ => NotificationKind::Warning,
        }
    } else {
        NotificationKind::Info
    };

    NotificationDraft::new(
        kind,
        format!(
            "{} is now {} ({} left, was {})",
            change.name, change.to, change.quantity, change.from
        ),
    )
    .with_payload(json!({
        "material_id": change.material_id,
        "name": change.name,
        "quantity": change.quantity,
        "from": change.from,
        "to": change.to,
    }))
}
