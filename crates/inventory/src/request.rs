use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, MaterialId, PersonId};

/// Maximum length of the free-text note.
pub const MAX_NOTE_LEN: usize = 1_000;

/// Snapshot of a staff member as referenced by a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: PersonId,
    pub name: String,
    /// Badge / registration number.
    pub badge: String,
}

impl PersonRef {
    pub fn new(id: PersonId, name: impl Into<String>, badge: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            badge: badge.into(),
        }
    }

    fn is_missing(&self) -> bool {
        self.id.is_nil() || self.name.trim().is_empty()
    }
}

/// Who asked for the withdrawal: one supervisor and two agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub supervisor: PersonRef,
    pub agent1: PersonRef,
    pub agent2: PersonRef,
}

impl Requester {
    pub fn new(supervisor: PersonRef, agent1: PersonRef, agent2: PersonRef) -> Self {
        Self {
            supervisor,
            agent1,
            agent2,
        }
    }

    fn validate(&self) -> DomainResult<()> {
        for (role, person) in [
            ("supervisor", &self.supervisor),
            ("agent1", &self.agent1),
            ("agent2", &self.agent2),
        ] {
            if person.is_missing() {
                return Err(DomainError::validation(format!("missing required participant: {role}")));
            }
        }
        Ok(())
    }
}

/// One requested material and amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLine {
    pub material_id: MaterialId,
    pub quantity: u64,
}

/// A withdrawal request.
///
/// Immutable once built; the reservation engine consumes it exactly once.
/// Lines keep the caller's order, which decides which shortfall is reported
/// first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    requester: Requester,
    lines: Vec<RequestLine>,
    note: Option<String>,
    submitted_at: DateTime<Utc>,
}

impl WithdrawalRequest {
    pub fn new(
        requester: Requester,
        lines: impl IntoIterator<Item = (MaterialId, u64)>,
        note: Option<String>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            requester,
            lines: lines
                .into_iter()
                .map(|(material_id, quantity)| RequestLine { material_id, quantity })
                .collect(),
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            submitted_at,
        }
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    pub fn lines(&self) -> &[RequestLine] {
        &self.lines
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Material ids in lock order (sorted, unique).
    pub fn lock_order(&self) -> Vec<MaterialId> {
        self.lines
            .iter()
            .map(|l| l.material_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Structural validation: participants present, at least one line, every
    /// quantity positive, no material listed twice, bounded note.
    pub fn validate(&self) -> DomainResult<()> {
        self.requester.validate()?;

        if self.lines.is_empty() {
            return Err(DomainError::validation("request must reference at least one material"));
        }

        let mut seen = BTreeSet::new();
        for line in &self.lines {
            if line.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "quantity for {} must be positive",
                    line.material_id
                )));
            }
            if !seen.insert(&line.material_id) {
                return Err(DomainError::validation(format!(
                    "material {} listed more than once",
                    line.material_id
                )));
            }
        }

        if self.note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
            return Err(DomainError::validation(format!(
                "note exceeds {MAX_NOTE_LEN} characters"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str) -> PersonRef {
        PersonRef::new(PersonId::new(), name, format!("M-{name}"))
    }

    fn requester() -> Requester {
        Requester::new(person("sup"), person("a1"), person("a2"))
    }

    fn mid(s: &str) -> MaterialId {
        s.parse().unwrap()
    }

    #[test]
    fn valid_request_passes() {
        let req = WithdrawalRequest::new(requester(), [(mid("b"), 2), (mid("a"), 1)], None, Utc::now());
        req.validate().unwrap();
        assert_eq!(req.lock_order(), vec![mid("a"), mid("b")]);
        assert_eq!(req.lines()[0].material_id, mid("b"));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let req = WithdrawalRequest::new(requester(), [(mid("a"), 0)], None, Utc::now());
        assert!(matches!(req.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn empty_request_is_rejected() {
        let req = WithdrawalRequest::new(requester(), Vec::new(), None, Utc::now());
        assert!(req.validate().is_err());
    }

    #[test]
    fn duplicate_lines_are_rejected() {
        let req = WithdrawalRequest::new(requester(), [(mid("a"), 1), (mid("a"), 2)], None, Utc::now());
        assert!(req.validate().is_err());
    }

    #[test]
    fn missing_participant_is_rejected() {
        let mut r = requester();
        r.agent2 = PersonRef::new(PersonId::from_uuid(Default::default()), "ghost", "");
        let req = WithdrawalRequest::new(r, [(mid("a"), 1)], None, Utc::now());
        let err = req.validate().unwrap_err();
        assert_eq!(err, DomainError::validation("missing required participant: agent2"));
    }

    #[test]
    fn blank_note_is_dropped() {
        let req = WithdrawalRequest::new(requester(), [(mid("a"), 1)], Some("   ".into()), Utc::now());
        assert_eq!(req.note(), None);
    }
}
