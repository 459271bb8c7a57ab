use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, MaterialId, RecordId};
use stockroom_events::Event;

use crate::material::Material;
use crate::request::{Requester, WithdrawalRequest};

/// One debited material, priced at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLine {
    pub material_id: MaterialId,
    pub material_name: String,
    pub quantity: u64,
    pub unit_price: u64,
}

impl HistoryLine {
    pub fn priced(material: &Material, quantity: u64) -> Self {
        Self {
            material_id: material.material_id().clone(),
            material_name: material.name().to_string(),
            quantity,
            unit_price: material.unit_price(),
        }
    }

    fn value(&self) -> Option<u64> {
        self.quantity.checked_mul(self.unit_price)
    }
}

/// A history record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryDraft {
    requester: Requester,
    lines: Vec<HistoryLine>,
    note: Option<String>,
    submitted_at: DateTime<Utc>,
    total_value: u64,
}

impl HistoryDraft {
    /// Price the debited lines of `request`. Lines keep request order.
    pub fn new(request: &WithdrawalRequest, lines: Vec<HistoryLine>) -> DomainResult<Self> {
        let total_value = lines.iter().try_fold(0u64, |acc, line| {
            line.value().and_then(|v| acc.checked_add(v))
        });
        let total_value =
            total_value.ok_or_else(|| DomainError::validation("request total value overflows"))?;

        Ok(Self {
            requester: request.requester().clone(),
            lines,
            note: request.note().map(str::to_string),
            submitted_at: request.submitted_at(),
            total_value,
        })
    }

    pub fn total_value(&self) -> u64 {
        self.total_value
    }

    pub fn lines(&self) -> &[HistoryLine] {
        &self.lines
    }

    /// Seal the draft at commit time.
    pub fn commit(self, id: RecordId, committed_at: DateTime<Utc>) -> HistoryRecord {
        HistoryRecord {
            id,
            committed_at,
            submitted_at: self.submitted_at,
            requester: self.requester,
            lines: self.lines,
            note: self.note,
            total_value: self.total_value,
        }
    }
}

/// Append-only record of a committed withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: RecordId,
    pub committed_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub requester: Requester,
    pub lines: Vec<HistoryLine>,
    pub note: Option<String>,
    /// Σ quantity × unit_price at commit time, minor currency units.
    pub total_value: u64,
}

impl HistoryRecord {
    /// Material → debited quantity.
    pub fn quantities(&self) -> BTreeMap<MaterialId, u64> {
        self.lines
            .iter()
            .map(|l| (l.material_id.clone(), l.quantity))
            .collect()
    }

    /// Calendar month bucket (`YYYY-MM`, UTC) of the commit.
    pub fn month_key(&self) -> String {
        self.committed_at.format("%Y-%m").to_string()
    }
}

impl Event for HistoryRecord {
    fn event_type(&self) -> &'static str {
        "inventory.request.committed"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.committed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::NewMaterial;
    use crate::request::PersonRef;
    use chrono::TimeZone;
    use stockroom_core::PersonId;

    fn requester() -> Requester {
        let p = |n: &str| PersonRef::new(PersonId::new(), n, n);
        Requester::new(p("s"), p("a"), p("b"))
    }

    fn material(id: &str, price: u64) -> Material {
        NewMaterial::new(id, 100)
            .with_id(id.parse().unwrap())
            .with_unit_price(price)
            .into_material(Utc::now())
            .unwrap()
    }

    #[test]
    fn total_value_sums_priced_lines() {
        let a = material("a", 250);
        let b = material("b", 1_000);
        let req = WithdrawalRequest::new(
            requester(),
            [(a.material_id().clone(), 4), (b.material_id().clone(), 2)],
            Some("night shift".into()),
            Utc::now(),
        );
        let draft = HistoryDraft::new(
            &req,
            vec![HistoryLine::priced(&a, 4), HistoryLine::priced(&b, 2)],
        )
        .unwrap();
        assert_eq!(draft.total_value(), 3_000);

        let committed_at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let record = draft.commit(RecordId(7), committed_at);
        assert_eq!(record.id, RecordId(7));
        assert_eq!(record.month_key(), "2024-03");
        assert_eq!(record.note.as_deref(), Some("night shift"));
        assert_eq!(record.quantities().get(a.material_id()), Some(&4));
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let a = material("a", u64::MAX);
        let req = WithdrawalRequest::new(requester(), [(a.material_id().clone(), 2)], None, Utc::now());
        assert!(HistoryDraft::new(&req, vec![HistoryLine::priced(&a, 2)]).is_err());
    }

    #[test]
    fn record_round_trips_as_json_event() {
        let a = material("a", 1);
        let req = WithdrawalRequest::new(requester(), [(a.material_id().clone(), 1)], None, Utc::now());
        let record = HistoryDraft::new(&req, vec![HistoryLine::priced(&a, 1)])
            .unwrap()
            .commit(RecordId(1), Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        let back: HistoryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.event_type(), "inventory.request.committed");
    }
}
