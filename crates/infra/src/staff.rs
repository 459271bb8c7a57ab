//! Staff directory: agents, supervisors and section chiefs.
//!
//! Withdrawal submissions reference staff by id; the directory turns those
//! ids into the `PersonRef` snapshots stored on history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use stockroom_core::PersonId;
use stockroom_inventory::{PersonRef, Requester};

use crate::read_model::KeyValueStore;
use crate::reservation::ReservationError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Agent,
    Supervisor,
    SectionChief,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Agent => "agent",
            StaffRole::Supervisor => "supervisor",
            StaffRole::SectionChief => "section_chief",
        }
    }

    /// Roles allowed to sign off a withdrawal as supervisor.
    pub fn can_supervise(&self) -> bool {
        matches!(self, StaffRole::Supervisor | StaffRole::SectionChief)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: PersonId,
    pub name: String,
    /// Badge / registration number.
    pub badge: String,
    pub role: StaffRole,
    pub created_at: DateTime<Utc>,
}

impl StaffMember {
    pub fn person_ref(&self) -> PersonRef {
        PersonRef::new(self.id, self.name.clone(), self.badge.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStaffMember {
    pub name: String,
    #[serde(default)]
    pub badge: String,
    pub role: StaffRole,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StaffError {
    #[error("invalid staff member: {0}")]
    Validation(String),

    #[error("unknown staff member: {0}")]
    UnknownPerson(PersonId),

    #[error("{id} is not a {expected}")]
    WrongRole { id: PersonId, expected: &'static str },

    #[error("badge {0} already registered")]
    DuplicateBadge(String),
}

impl From<StaffError> for ReservationError {
    fn from(err: StaffError) -> Self {
        match err {
            StaffError::UnknownPerson(id) => ReservationError::UnknownParticipant(id),
            other => ReservationError::Validation(other.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct StaffDirectory<S> {
    store: S,
}

impl<S> StaffDirectory<S>
where
    S: KeyValueStore<PersonId, StaffMember>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn register(&self, new: NewStaffMember) -> Result<StaffMember, StaffError> {
        let (name, badge) = validated(&new)?;
        let member = StaffMember {
            id: PersonId::new(),
            name,
            badge,
            role: new.role,
            created_at: Utc::now(),
        };
        self.store_unique(member.clone())?;
        info!(person = %member.id, role = member.role.as_str(), "staff member registered");
        Ok(member)
    }

    /// Replace name, badge and role of an existing member.
    pub fn update(&self, id: PersonId, changes: NewStaffMember) -> Result<StaffMember, StaffError> {
        let (name, badge) = validated(&changes)?;
        let current = self.get(id)?;
        let member = StaffMember {
            name,
            badge,
            role: changes.role,
            ..current
        };
        if self.store_unique(member.clone())?.is_none() {
            // Removed while we were updating it.
            self.store.remove(&id);
            return Err(StaffError::UnknownPerson(id));
        }
        info!(person = %id, role = member.role.as_str(), "staff member updated");
        Ok(member)
    }

    /// Store `member`, rejecting a badge already held by someone else.
    fn store_unique(&self, member: StaffMember) -> Result<Option<StaffMember>, StaffError> {
        let (id, badge) = (member.id, member.badge.clone());
        self.store
            .upsert_unless(id, member, &|other_id, other| {
                *other_id != id && !badge.is_empty() && other.badge == badge
            })
            .map_err(|existing| StaffError::DuplicateBadge(existing.badge))
    }

    pub fn get(&self, id: PersonId) -> Result<StaffMember, StaffError> {
        self.store.get(&id).ok_or(StaffError::UnknownPerson(id))
    }

    /// Members, optionally filtered by role, ordered by name.
    pub fn list(&self, role: Option<StaffRole>) -> Vec<StaffMember> {
        let mut members: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|m| role.is_none_or(|r| m.role == r))
            .collect();
        members.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        members
    }

    pub fn remove(&self, id: PersonId) -> Result<StaffMember, StaffError> {
        self.store.remove(&id).ok_or(StaffError::UnknownPerson(id))
    }

    /// Resolve the three participants of a withdrawal.
    pub fn resolve_requester(
        &self,
        supervisor: PersonId,
        agent1: PersonId,
        agent2: PersonId,
    ) -> Result<Requester, StaffError> {
        if agent1 == agent2 {
            return Err(StaffError::Validation("the two agents must be different people".to_string()));
        }

        let sup = self.get(supervisor)?;
        if !sup.role.can_supervise() {
            return Err(StaffError::WrongRole {
                id: supervisor,
                expected: "supervisor",
            });
        }
        let a1 = self.agent(agent1)?;
        let a2 = self.agent(agent2)?;

        Ok(Requester::new(sup.person_ref(), a1.person_ref(), a2.person_ref()))
    }

    fn agent(&self, id: PersonId) -> Result<StaffMember, StaffError> {
        let member = self.get(id)?;
        if member.role != StaffRole::Agent {
            return Err(StaffError::WrongRole { id, expected: "agent" });
        }
        Ok(member)
    }
}

fn validated(new: &NewStaffMember) -> Result<(String, String), StaffError> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(StaffError::Validation("name must not be empty".to_string()));
    }
    Ok((name.to_string(), new.badge.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryStore;

    fn directory() -> StaffDirectory<InMemoryStore<PersonId, StaffMember>> {
        StaffDirectory::new(InMemoryStore::new())
    }

    fn add(dir: &StaffDirectory<InMemoryStore<PersonId, StaffMember>>, name: &str, badge: &str, role: StaffRole) -> StaffMember {
        dir.register(NewStaffMember {
            name: name.to_string(),
            badge: badge.to_string(),
            role,
        })
        .unwrap()
    }

    #[test]
    fn resolves_requester_snapshots() {
        let dir = directory();
        let chief = add(&dir, "Chief", "C-1", StaffRole::SectionChief);
        let a = add(&dir, "Amina", "A-1", StaffRole::Agent);
        let b = add(&dir, "Bilal", "A-2", StaffRole::Agent);

        let req = dir.resolve_requester(chief.id, a.id, b.id).unwrap();
        assert_eq!(req.supervisor.badge, "C-1");
        assert_eq!(req.agent2.name, "Bilal");
    }

    #[test]
    fn unknown_and_misassigned_people_are_rejected() {
        let dir = directory();
        let sup = add(&dir, "Sup", "S-1", StaffRole::Supervisor);
        let a = add(&dir, "Amina", "A-1", StaffRole::Agent);
        let ghost = PersonId::new();

        assert_eq!(
            dir.resolve_requester(sup.id, a.id, ghost).unwrap_err(),
            StaffError::UnknownPerson(ghost)
        );
        assert!(matches!(
            dir.resolve_requester(sup.id, a.id, a.id),
            Err(StaffError::Validation(_))
        ));
        assert!(matches!(
            dir.resolve_requester(sup.id, a.id, sup.id),
            Err(StaffError::WrongRole { expected: "agent", .. })
        ));
        assert!(matches!(
            dir.resolve_requester(a.id, sup.id, a.id),
            Err(StaffError::WrongRole { expected: "supervisor", .. })
        ));
        assert_eq!(
            ReservationError::from(StaffError::UnknownPerson(ghost)),
            ReservationError::UnknownParticipant(ghost)
        );
    }

    #[test]
    fn list_filters_by_role_and_badges_are_unique() {
        let dir = directory();
        add(&dir, "Zed", "A-9", StaffRole::Agent);
        add(&dir, "Amy", "A-1", StaffRole::Agent);
        add(&dir, "Sam", "S-1", StaffRole::Supervisor);

        let agents: Vec<String> = dir.list(Some(StaffRole::Agent)).into_iter().map(|m| m.name).collect();
        assert_eq!(agents, vec!["Amy", "Zed"]);
        assert_eq!(dir.list(None).len(), 3);

        let dup = dir.register(NewStaffMember {
            name: "Other".into(),
            badge: "A-1".into(),
            role: StaffRole::Agent,
        });
        assert_eq!(dup.unwrap_err(), StaffError::DuplicateBadge("A-1".into()));
        assert!(matches!(
            dir.register(NewStaffMember { name: " ".into(), badge: String::new(), role: StaffRole::Agent }),
            Err(StaffError::Validation(_))
        ));
    }

    #[test]
    fn update_keeps_identity_and_checks_badges() {
        let dir = directory();
        let a = add(&dir, "Amina", "A-1", StaffRole::Agent);
        add(&dir, "Bilal", "A-2", StaffRole::Agent);

        let updated = dir
            .update(a.id, NewStaffMember { name: " Amina K ".into(), badge: "A-1".into(), role: StaffRole::Supervisor })
            .unwrap();
        assert_eq!(updated.id, a.id);
        assert_eq!(updated.created_at, a.created_at);
        assert_eq!(updated.name, "Amina K");
        assert_eq!(dir.get(a.id).unwrap(), updated);

        assert_eq!(
            dir.update(a.id, NewStaffMember { name: "Amina".into(), badge: "A-2".into(), role: StaffRole::Agent })
                .unwrap_err(),
            StaffError::DuplicateBadge("A-2".into())
        );
        assert!(matches!(
            dir.update(a.id, NewStaffMember { name: "".into(), badge: String::new(), role: StaffRole::Agent }),
            Err(StaffError::Validation(_))
        ));

        let ghost = PersonId::new();
        assert_eq!(
            dir.update(ghost, NewStaffMember { name: "X".into(), badge: String::new(), role: StaffRole::Agent })
                .unwrap_err(),
            StaffError::UnknownPerson(ghost)
        );
        assert_eq!(dir.list(None).len(), 2);
    }

    #[test]
    fn concurrent_registrations_cannot_share_a_badge() {
        let dir = std::sync::Arc::new(directory());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let dir = dir.clone();
                std::thread::spawn(move || {
                    dir.register(NewStaffMember {
                        name: format!("Agent {i}"),
                        badge: "A-7".into(),
                        role: StaffRole::Agent,
                    })
                    .is_ok()
                })
            })
            .collect();

        let accepted = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(accepted, 1);
        assert_eq!(dir.list(None).len(), 1);
    }
}
