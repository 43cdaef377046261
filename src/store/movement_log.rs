//! Movement log
//!
//! Append-mostly ledger of debit/credit entries. The log owns reference
//! uniqueness: an insert claims the reference (and the payment id, when the
//! richer schema supplies one) through an insert-if-absent entry, so duplicate
//! detection stays correct even when two imports race on the same row. The
//! advisory pre-check callers run first is necessary for counting but not
//! sufficient on its own.
//!
//! Aside from the explicit admin correction and deletion paths, rows are
//! immutable once inserted.

use crate::types::{LedgerError, Movement, MovementId, NewMovement};
use dashmap::{DashMap, Entry};
use std::sync::atomic::{AtomicU64, Ordering};

/// Concurrent movement ledger keyed by id, with unique-reference enforcement
pub struct MovementLog {
    movements: DashMap<MovementId, Movement>,
    /// reference -> movement id, the dedup index
    references: DashMap<String, MovementId>,
    /// payment_id -> movement id, only populated by the richer import schema
    payment_ids: DashMap<String, MovementId>,
    next_id: AtomicU64,
}

impl MovementLog {
    /// Create an empty log
    pub fn new() -> Self {
        MovementLog {
            movements: DashMap::new(),
            references: DashMap::new(),
            payment_ids: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Append a movement, enforcing dedup-key uniqueness
    ///
    /// # Errors
    ///
    /// Returns `DuplicateReference` if the reference, or the payment id when
    /// present, is already claimed by an earlier movement. Nothing is
    /// inserted in that case.
    pub fn insert(&self, new: NewMovement) -> Result<MovementId, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        match self.references.entry(new.reference.clone()) {
            Entry::Occupied(_) => return Err(LedgerError::duplicate_reference(&new.reference)),
            Entry::Vacant(vacant) => {
                vacant.insert(id);
            }
        }

        if let Some(payment_id) = new.payment_id.clone() {
            match self.payment_ids.entry(payment_id.clone()) {
                Entry::Occupied(_) => {
                    // Release the reference claimed above
                    self.references.remove(&new.reference);
                    return Err(LedgerError::duplicate_reference(&payment_id));
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(id);
                }
            }
        }

        self.movements.insert(id, new.into_movement(id));
        Ok(id)
    }

    /// Whether a dedup key (reference or payment id) is already in the log
    pub fn contains_dedup_key(&self, key: &str) -> bool {
        self.references.contains_key(key) || self.payment_ids.contains_key(key)
    }

    /// Snapshot of a movement row
    pub fn get(&self, id: MovementId) -> Option<Movement> {
        self.movements.get(&id).map(|entry| entry.value().clone())
    }

    /// Remove a movement and release its dedup keys
    ///
    /// Used by the transfer rollback path and the admin deletion screen.
    pub fn remove(&self, id: MovementId) -> Option<Movement> {
        let (_, movement) = self.movements.remove(&id)?;
        self.references.remove(&movement.reference);
        if let Some(payment_id) = &movement.payment_id {
            self.payment_ids.remove(payment_id);
        }
        Some(movement)
    }

    /// Re-key a movement to a new reference
    ///
    /// Part of the admin correction path. A no-op when the reference is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns `MovementNotFound` for an unknown id and `DuplicateReference`
    /// when the new reference is already claimed by another movement.
    pub fn reassign_reference(
        &self,
        id: MovementId,
        new_reference: &str,
    ) -> Result<(), LedgerError> {
        let old_reference = self
            .movements
            .get(&id)
            .map(|entry| entry.value().reference.clone())
            .ok_or_else(|| LedgerError::movement_not_found(id))?;

        if old_reference == new_reference {
            return Ok(());
        }

        match self.references.entry(new_reference.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::duplicate_reference(new_reference)),
            Entry::Vacant(vacant) => {
                vacant.insert(id);
                self.references.remove(&old_reference);
                Ok(())
            }
        }
    }

    /// Update a movement row in place
    ///
    /// # Errors
    ///
    /// Returns `MovementNotFound` for an unknown id.
    pub fn update<R>(
        &self,
        id: MovementId,
        f: impl FnOnce(&mut Movement) -> R,
    ) -> Result<R, LedgerError> {
        match self.movements.get_mut(&id) {
            Some(mut entry) => Ok(f(entry.value_mut())),
            None => Err(LedgerError::movement_not_found(id)),
        }
    }

    /// Movements for one phone, or all of them, ordered by date desc then
    /// id desc
    pub fn list(&self, phone: Option<&str>) -> Vec<Movement> {
        let mut rows: Vec<Movement> = self
            .movements
            .iter()
            .filter(|entry| phone.is_none_or(|p| entry.value().phone == p))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| b.mvt_date.cmp(&a.mvt_date).then_with(|| b.id.cmp(&a.id)));
        rows
    }

    /// Number of movement rows
    pub fn len(&self) -> usize {
        self.movements.len()
    }

    /// Whether the log has no rows
    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }
}

impl Default for MovementLog {
    fn default() -> Self {
        Self::new()
    }
}
