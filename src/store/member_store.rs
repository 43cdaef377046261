//! Member store
//!
//! Holds one record per phone number and is the only shared mutable resource
//! contended across concurrent ledger operations. Every mutation of a member
//! row runs under that row's entry lock, so a balance update is an atomic
//! `balance = balance + delta` at the store level and never a
//! read-modify-write of a cached value.

use crate::types::{LedgerError, Member};
use dashmap::{DashMap, Entry};

/// Concurrent map of phone numbers to member records
pub struct MemberStore {
    members: DashMap<String, Member>,
}

impl MemberStore {
    /// Create an empty store
    pub fn new() -> Self {
        MemberStore {
            members: DashMap::new(),
        }
    }

    /// Insert a new member row
    ///
    /// Phone uniqueness is enforced by the entry itself, so two concurrent
    /// inserts of the same phone cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateMember` if a row already exists for the phone.
    pub fn insert(&self, member: Member) -> Result<(), LedgerError> {
        match self.members.entry(member.phone.clone()) {
            Entry::Occupied(_) => Err(LedgerError::duplicate_member(&member.phone)),
            Entry::Vacant(vacant) => {
                vacant.insert(member);
                Ok(())
            }
        }
    }

    /// Insert a member row only if the phone is still unknown
    ///
    /// Returns `true` when a row was created. Used by the import pipeline's
    /// auto-provisioning step, where losing the race to another writer is
    /// not an error.
    pub fn insert_if_absent(&self, member: Member) -> bool {
        match self.members.entry(member.phone.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(member);
                true
            }
        }
    }

    /// Whether a row exists for the phone
    pub fn contains(&self, phone: &str) -> bool {
        self.members.contains_key(phone)
    }

    /// Snapshot of the member row for a phone
    pub fn get(&self, phone: &str) -> Option<Member> {
        self.members.get(phone).map(|entry| entry.value().clone())
    }

    /// Mutate a member row under its entry lock
    ///
    /// The closure runs while the row is exclusively held, which is what
    /// makes the reconciler's balance increment atomic with respect to
    /// concurrent movements on the same member.
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if the phone has no row.
    pub fn update<R>(
        &self,
        phone: &str,
        f: impl FnOnce(&mut Member) -> R,
    ) -> Result<R, LedgerError> {
        match self.members.get_mut(phone) {
            Some(mut entry) => Ok(f(entry.value_mut())),
            None => Err(LedgerError::member_not_found(phone)),
        }
    }

    /// All members sorted by phone for deterministic output
    pub fn all_members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .members
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        members.sort_by(|a, b| a.phone.cmp(&b.phone));
        members
    }

    /// Members sponsored by a mentor, ordered by lastname then firstname
    pub fn list_group(&self, mentor_phone: &str) -> Vec<Member> {
        let mut group: Vec<Member> = self
            .members
            .iter()
            .filter(|entry| entry.value().mentor == mentor_phone)
            .map(|entry| entry.value().clone())
            .collect();
        group.sort_by(|a, b| {
            a.lastname
                .cmp(&b.lastname)
                .then_with(|| a.firstname.cmp(&b.firstname))
        });
        group
    }

    /// Number of member rows
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the store has no rows
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Default for MemberStore {
    fn default() -> Self {
        Self::new()
    }
}
