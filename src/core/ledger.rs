//! Ledger facade
//!
//! Entry point consumed by the out-of-scope web handlers. It owns the member
//! store, the movement log, and the death register, and exposes the ledger
//! contract: balance queries, direct movement application, the transfer
//! protocol, admin corrections, and read-only projections. Role checks happen
//! at the caller's boundary; the ledger itself never inspects roles.

use crate::core::reconciler;
use crate::store::{MemberStore, MovementLog};
use crate::types::{
    DeathDeclaration, Direction, LedgerError, Member, Movement, MovementId, NewMovement,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Mutex;
use uuid::Uuid;

/// Outcome of a successful transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    /// Base reference shared by the two legs (`<base>-D` / `<base>-C`)
    pub reference: String,
    pub debit_id: MovementId,
    pub credit_id: MovementId,
    /// Sender balance after the debit leg
    pub sender_balance: Decimal,
}

/// Replacement values for an admin movement correction
#[derive(Debug, Clone)]
pub struct MovementCorrection {
    pub mvt_date: NaiveDate,
    pub amount: Decimal,
    pub direction: Direction,
    pub reference: String,
    pub libelle: String,
}

/// Contribution ledger for one association
///
/// Shared by reference across request handlers; every operation executes
/// within the scope of one call and serializes on the affected store entries.
pub struct Ledger {
    pub(crate) members: MemberStore,
    pub(crate) movements: MovementLog,
    deaths: Mutex<Vec<DeathDeclaration>>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Ledger {
            members: MemberStore::new(),
            movements: MovementLog::new(),
            deaths: Mutex::new(Vec::new()),
        }
    }

    /// Register a pre-existing member row (roster load)
    ///
    /// # Errors
    ///
    /// Returns `DuplicateMember` when the phone is already registered.
    pub fn register_member(&self, member: Member) -> Result<(), LedgerError> {
        self.members.insert(member)
    }

    /// Mentor-delegated member creation
    ///
    /// The new member starts as an ordinary `membre` in `probatoire` status
    /// with the creating user recorded as mentor. The caller is responsible
    /// for having checked `MemberType::can_create_members` on the creator.
    #[allow(clippy::too_many_arguments)]
    pub fn create_member(
        &self,
        phone: &str,
        lastname: &str,
        firstname: &str,
        birthdate: NaiveDate,
        id_type: &str,
        password_hash: &str,
        created_by: &str,
    ) -> Result<Member, LedgerError> {
        let member = Member::sponsored(
            phone,
            lastname,
            firstname,
            birthdate,
            id_type,
            password_hash,
            created_by,
        );
        self.members.insert(member.clone())?;
        Ok(member)
    }

    /// Current balance of a member
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` for an unknown phone.
    pub fn member_balance(&self, phone: &str) -> Result<Decimal, LedgerError> {
        self.members
            .get(phone)
            .map(|member| member.balance)
            .ok_or_else(|| LedgerError::member_not_found(phone))
    }

    /// Snapshot of a member row
    pub fn member(&self, phone: &str) -> Option<Member> {
        self.members.get(phone)
    }

    /// All members, sorted by phone
    pub fn members(&self) -> Vec<Member> {
        self.members.all_members()
    }

    /// Members sponsored by a mentor, ordered by lastname then firstname
    pub fn list_group(&self, mentor_phone: &str) -> Vec<Member> {
        self.members.list_group(mentor_phone)
    }

    /// Movements for one phone, or the whole log, by date desc then id desc
    pub fn list_movements(&self, phone: Option<&str>) -> Vec<Movement> {
        self.movements.list(phone)
    }

    /// Run the bulk cotisation import over raw CSV text
    ///
    /// See [`crate::core::import`] for the pipeline's row semantics. The
    /// caller is responsible for having checked `MemberType::can_import` on
    /// the acting user.
    pub fn import(&self, content: &str, actor: &str) -> Result<crate::core::ImportStats, LedgerError> {
        crate::core::import::run(self, content, actor)
    }

    /// Apply a single movement to a member
    ///
    /// Inserts the movement row and adjusts the balance through the
    /// reconciler; both effects happen within this call or not at all. The
    /// member must already exist — unlike the import pipeline this operation
    /// never auto-provisions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a non-positive amount, `MemberNotFound`
    /// for an unknown phone, and `DuplicateReference` when the reference is
    /// already in the log (the second application of a reference is a no-op
    /// on the balance).
    pub fn apply_movement(
        &self,
        phone: &str,
        amount: Decimal,
        direction: Direction,
        reference: &str,
        mvt_date: NaiveDate,
        libelle: &str,
        updated_by: &str,
    ) -> Result<MovementId, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(amount));
        }
        let amount = amount.round_dp(2);
        let member = self
            .members
            .get(phone)
            .ok_or_else(|| LedgerError::member_not_found(phone))?;

        let id = self.movements.insert(NewMovement {
            phone: phone.to_string(),
            firstname: member.firstname.clone(),
            lastname: member.lastname.clone(),
            mvt_date,
            amount,
            direction,
            reference: reference.to_string(),
            payment_id: None,
            libelle: libelle.to_string(),
            updated_by: updated_by.to_string(),
        })?;

        match reconciler::apply_movement(&self.members, phone, amount, direction, updated_by) {
            Ok(_) => Ok(id),
            Err(e) => {
                // Member row vanished between the lookup and the increment;
                // keep movement and balance consistent by dropping the row
                self.movements.remove(id);
                Err(e)
            }
        }
    }

    /// Transfer a positive amount from one member to another
    ///
    /// Preconditions are checked in order and the first failure wins with no
    /// side effect: amount must be positive, the beneficiary must exist, and
    /// the sender's balance must cover the amount. The balance check is
    /// advisory (read-then-check); racing transfers from the same sender can
    /// overdraw, which the store-level atomic increment keeps arithmetically
    /// consistent even if commercially unfortunate.
    ///
    /// Both legs are inserted before either balance moves; any failure rolls
    /// back whatever was already done and surfaces as `TransferFailed`.
    pub fn transfer(
        &self,
        from_phone: &str,
        to_phone: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(amount));
        }
        let receiver = self
            .members
            .get(to_phone)
            .ok_or_else(|| LedgerError::beneficiary_not_found(to_phone))?;
        let sender = self
            .members
            .get(from_phone)
            .ok_or_else(|| LedgerError::member_not_found(from_phone))?;
        if sender.balance < amount {
            return Err(LedgerError::insufficient_funds(
                from_phone,
                sender.balance,
                amount,
            ));
        }

        let amount = amount.round_dp(2);
        let base = short_reference("TR");
        let today = chrono::Local::now().date_naive();

        let debit_id = self
            .movements
            .insert(NewMovement {
                phone: from_phone.to_string(),
                firstname: sender.firstname.clone(),
                lastname: sender.lastname.clone(),
                mvt_date: today,
                amount,
                direction: Direction::Debit,
                reference: format!("{}-D", base),
                payment_id: None,
                libelle: format!("Transfert vers {}", to_phone),
                updated_by: from_phone.to_string(),
            })
            .map_err(|e| LedgerError::transfer_failed(e.to_string()))?;

        let credit_id = match self.movements.insert(NewMovement {
            phone: to_phone.to_string(),
            firstname: receiver.firstname.clone(),
            lastname: receiver.lastname.clone(),
            mvt_date: today,
            amount,
            direction: Direction::Credit,
            reference: format!("{}-C", base),
            payment_id: None,
            libelle: format!("Transfert de {}", from_phone),
            updated_by: from_phone.to_string(),
        }) {
            Ok(id) => id,
            Err(e) => {
                self.movements.remove(debit_id);
                return Err(LedgerError::transfer_failed(e.to_string()));
            }
        };

        let debited = match reconciler::apply_movement(
            &self.members,
            from_phone,
            amount,
            Direction::Debit,
            from_phone,
        ) {
            Ok(applied) => applied,
            Err(e) => {
                self.movements.remove(debit_id);
                self.movements.remove(credit_id);
                return Err(LedgerError::transfer_failed(e.to_string()));
            }
        };

        if let Err(e) = reconciler::apply_movement(
            &self.members,
            to_phone,
            amount,
            Direction::Credit,
            from_phone,
        ) {
            // Undo the debit leg before surfacing the failure
            self.movements.remove(debit_id);
            self.movements.remove(credit_id);
            let _ = reconciler::apply_movement(
                &self.members,
                from_phone,
                amount,
                Direction::Credit,
                from_phone,
            );
            return Err(LedgerError::transfer_failed(e.to_string()));
        }

        Ok(TransferReceipt {
            reference: base,
            debit_id,
            credit_id,
            sender_balance: debited.balance,
        })
    }

    /// Admin correction of a movement row
    ///
    /// Unlike the raw-edit screen it replaces, the correction is
    /// balance-consistent: the old movement's effect is reversed and the new
    /// effect applied as one combined delta, so the member's balance never
    /// drifts from the ledger's own sum. The status rule is not re-evaluated
    /// here — it belongs to movement application, not to data repair.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount`, `MovementNotFound`, `DuplicateReference`
    /// (new reference already claimed), or `MemberNotFound` when the owning
    /// member row no longer exists.
    pub fn correct_movement(
        &self,
        id: MovementId,
        correction: MovementCorrection,
        updated_by: &str,
    ) -> Result<(), LedgerError> {
        if correction.amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(correction.amount));
        }
        let old = self
            .movements
            .get(id)
            .ok_or_else(|| LedgerError::movement_not_found(id))?;

        self.movements.reassign_reference(id, &correction.reference)?;

        let amount = correction.amount.round_dp(2);
        let delta = correction.direction.signed_delta(amount)
            - old.direction.signed_delta(old.amount);
        let today = chrono::Local::now().date_naive();

        if let Err(e) = self.members.update(&old.phone, |member| {
            member.balance += delta;
            member.updatedate = today;
            member.updateuser = updated_by.to_string();
        }) {
            // Put the dedup key back the way it was
            let _ = self.movements.reassign_reference(id, &old.reference);
            return Err(e);
        }

        self.movements.update(id, |movement| {
            movement.mvt_date = correction.mvt_date;
            movement.amount = amount;
            movement.direction = correction.direction;
            movement.reference = correction.reference.clone();
            movement.libelle = correction.libelle.clone();
            movement.updatedate = today;
            movement.updated_by = updated_by.to_string();
        })
    }

    /// Admin deletion of a movement row
    ///
    /// Reverses the movement's balance effect on the owning member (when the
    /// member still exists) and releases the reference for reuse.
    pub fn delete_movement(
        &self,
        id: MovementId,
        updated_by: &str,
    ) -> Result<Movement, LedgerError> {
        let movement = self
            .movements
            .remove(id)
            .ok_or_else(|| LedgerError::movement_not_found(id))?;

        let delta = -movement.direction.signed_delta(movement.amount);
        let today = chrono::Local::now().date_naive();
        // An orphaned movement (member already purged) has nothing to reverse
        let _ = self.members.update(&movement.phone, |member| {
            member.balance += delta;
            member.updatedate = today;
            member.updateuser = updated_by.to_string();
        });

        Ok(movement)
    }

    /// Record a death declaration
    ///
    /// Informational only: no balance or status effect.
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` for an unknown phone.
    pub fn declare_death(
        &self,
        phone: &str,
        date_deces: NaiveDate,
        declared_by: &str,
    ) -> Result<DeathDeclaration, LedgerError> {
        if !self.members.contains(phone) {
            return Err(LedgerError::member_not_found(phone));
        }
        let declaration = DeathDeclaration {
            phone: phone.to_string(),
            date_deces,
            declared_by: declared_by.to_string(),
            reference: short_reference("DC"),
        };
        self.deaths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(declaration.clone());
        Ok(declaration)
    }

    /// All recorded death declarations
    pub fn death_declarations(&self) -> Vec<DeathDeclaration> {
        self.deaths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Self-promotion of a member to mentor
    ///
    /// Deliberately ungated, matching the association's current policy of
    /// accepting mentor applications without an approval step.
    pub fn promote_to_mentor(&self, phone: &str) -> Result<(), LedgerError> {
        let today = chrono::Local::now().date_naive();
        self.members.update(phone, |member| {
            member.membertype = crate::types::MemberType::Mentor;
            member.updatedate = today;
            member.updateuser = phone.to_string();
        })
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// Short random correlation reference, e.g. `TR-1f9c2ab04d`
fn short_reference(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &hex[..10])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemberStatus, MemberType};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    fn ledger_with(phone: &str, balance: &str) -> Ledger {
        let ledger = Ledger::new();
        let mut member = Member::provisioned(phone, "Jane", "Doe", "test");
        member.balance = dec(balance);
        ledger.register_member(member).unwrap();
        ledger
    }

    #[test]
    fn test_member_balance() {
        let ledger = ledger_with("555", "12.00");
        assert_eq!(ledger.member_balance("555").unwrap(), dec("12.00"));
        assert!(matches!(
            ledger.member_balance("999").unwrap_err(),
            LedgerError::MemberNotFound { .. }
        ));
    }

    #[test]
    fn test_apply_movement_inserts_and_reconciles() {
        let ledger = ledger_with("555", "0.00");

        let id = ledger
            .apply_movement(
                "555",
                dec("10.00"),
                Direction::Credit,
                "REF1",
                day(2),
                "cotisation",
                "admin",
            )
            .unwrap();

        assert_eq!(ledger.member_balance("555").unwrap(), dec("10.00"));
        let movement = ledger.movements.get(id).unwrap();
        assert_eq!(movement.reference, "REF1");
        assert_eq!(movement.firstname, "Jane");
    }

    #[test]
    fn test_apply_movement_duplicate_reference_is_noop() {
        let ledger = ledger_with("555", "0.00");

        ledger
            .apply_movement(
                "555",
                dec("10.00"),
                Direction::Credit,
                "REF1",
                day(2),
                "",
                "admin",
            )
            .unwrap();
        let result = ledger.apply_movement(
            "555",
            dec("10.00"),
            Direction::Credit,
            "REF1",
            day(3),
            "",
            "admin",
        );

        assert!(matches!(
            result.unwrap_err(),
            LedgerError::DuplicateReference { .. }
        ));
        assert_eq!(ledger.member_balance("555").unwrap(), dec("10.00"));
        assert_eq!(ledger.list_movements(Some("555")).len(), 1);
    }

    #[test]
    fn test_apply_movement_rejects_bad_amounts() {
        let ledger = ledger_with("555", "0.00");
        for amount in ["0", "-5.00"] {
            let result = ledger.apply_movement(
                "555",
                dec(amount),
                Direction::Credit,
                "REF1",
                day(2),
                "",
                "admin",
            );
            assert!(matches!(
                result.unwrap_err(),
                LedgerError::InvalidAmount { .. }
            ));
        }
        assert!(ledger.list_movements(None).is_empty());
    }

    #[test]
    fn test_apply_movement_unknown_member_fails() {
        let ledger = Ledger::new();
        let result = ledger.apply_movement(
            "999",
            dec("10.00"),
            Direction::Credit,
            "REF1",
            day(2),
            "",
            "admin",
        );
        assert!(matches!(
            result.unwrap_err(),
            LedgerError::MemberNotFound { .. }
        ));
    }

    #[test]
    fn test_transfer_full_balance_succeeds() {
        let ledger = ledger_with("111", "50.00");
        ledger
            .register_member(Member::provisioned("222", "John", "Roe", "test"))
            .unwrap();

        let receipt = ledger.transfer("111", "222", dec("50.00")).unwrap();

        assert_eq!(receipt.sender_balance, Decimal::ZERO);
        assert_eq!(ledger.member_balance("111").unwrap(), Decimal::ZERO);
        assert_eq!(ledger.member_balance("222").unwrap(), dec("50.00"));

        let debit = ledger.movements.get(receipt.debit_id).unwrap();
        let credit = ledger.movements.get(receipt.credit_id).unwrap();
        assert_eq!(debit.reference, format!("{}-D", receipt.reference));
        assert_eq!(credit.reference, format!("{}-C", receipt.reference));
        assert_eq!(debit.direction, Direction::Debit);
        assert_eq!(credit.direction, Direction::Credit);
    }

    #[test]
    fn test_transfer_sender_stays_actif_at_zero() {
        let ledger = ledger_with("111", "50.00");
        ledger
            .register_member(Member::provisioned("222", "John", "Roe", "test"))
            .unwrap();

        ledger.transfer("111", "222", dec("50.00")).unwrap();

        assert_eq!(
            ledger.member("111").unwrap().currentstatute,
            MemberStatus::Actif
        );
    }

    #[test]
    fn test_transfer_insufficient_funds_has_no_side_effect() {
        let ledger = ledger_with("111", "10.00");
        ledger
            .register_member(Member::provisioned("222", "John", "Roe", "test"))
            .unwrap();

        let result = ledger.transfer("111", "222", dec("10.01"));

        assert!(matches!(
            result.unwrap_err(),
            LedgerError::InsufficientFunds { .. }
        ));
        assert_eq!(ledger.member_balance("111").unwrap(), dec("10.00"));
        assert_eq!(ledger.member_balance("222").unwrap(), Decimal::ZERO);
        assert!(ledger.list_movements(None).is_empty());
    }

    #[test]
    fn test_transfer_precondition_order() {
        let ledger = ledger_with("111", "0.00");

        // Invalid amount wins over everything
        assert!(matches!(
            ledger.transfer("111", "999", dec("0")).unwrap_err(),
            LedgerError::InvalidAmount { .. }
        ));
        // Then the beneficiary check, even though funds are also insufficient
        assert!(matches!(
            ledger.transfer("111", "999", dec("5.00")).unwrap_err(),
            LedgerError::BeneficiaryNotFound { .. }
        ));
    }

    #[test]
    fn test_correct_movement_is_balance_consistent() {
        let ledger = ledger_with("555", "0.00");
        let id = ledger
            .apply_movement(
                "555",
                dec("10.00"),
                Direction::Credit,
                "REF1",
                day(2),
                "",
                "admin",
            )
            .unwrap();

        // Rewrite the credit of 10 into a debit of 4
        ledger
            .correct_movement(
                id,
                MovementCorrection {
                    mvt_date: day(3),
                    amount: dec("4.00"),
                    direction: Direction::Debit,
                    reference: "REF1-FIX".to_string(),
                    libelle: "correction".to_string(),
                },
                "admin",
            )
            .unwrap();

        assert_eq!(ledger.member_balance("555").unwrap(), dec("-4.00"));
        let movement = ledger.movements.get(id).unwrap();
        assert_eq!(movement.reference, "REF1-FIX");
        assert_eq!(movement.direction, Direction::Debit);
        assert_eq!(movement.amount, dec("4.00"));
        // The old reference is free again, the new one is claimed
        assert!(!ledger.movements.contains_dedup_key("REF1"));
        assert!(ledger.movements.contains_dedup_key("REF1-FIX"));
    }

    #[test]
    fn test_correct_movement_rejects_taken_reference() {
        let ledger = ledger_with("555", "0.00");
        let id = ledger
            .apply_movement(
                "555",
                dec("10.00"),
                Direction::Credit,
                "REF1",
                day(2),
                "",
                "admin",
            )
            .unwrap();
        ledger
            .apply_movement(
                "555",
                dec("5.00"),
                Direction::Credit,
                "REF2",
                day(2),
                "",
                "admin",
            )
            .unwrap();

        let result = ledger.correct_movement(
            id,
            MovementCorrection {
                mvt_date: day(2),
                amount: dec("10.00"),
                direction: Direction::Credit,
                reference: "REF2".to_string(),
                libelle: String::new(),
            },
            "admin",
        );

        assert!(matches!(
            result.unwrap_err(),
            LedgerError::DuplicateReference { .. }
        ));
        // Balance untouched by the failed correction
        assert_eq!(ledger.member_balance("555").unwrap(), dec("15.00"));
    }

    #[test]
    fn test_delete_movement_reverses_effect() {
        let ledger = ledger_with("555", "0.00");
        let id = ledger
            .apply_movement(
                "555",
                dec("10.00"),
                Direction::Credit,
                "REF1",
                day(2),
                "",
                "admin",
            )
            .unwrap();

        let removed = ledger.delete_movement(id, "admin").unwrap();

        assert_eq!(removed.reference, "REF1");
        assert_eq!(ledger.member_balance("555").unwrap(), Decimal::ZERO);
        assert!(ledger.list_movements(None).is_empty());
        // Reference is reusable after deletion
        assert!(ledger
            .apply_movement(
                "555",
                dec("1.00"),
                Direction::Credit,
                "REF1",
                day(3),
                "",
                "admin",
            )
            .is_ok());
    }

    #[test]
    fn test_declare_death_requires_member() {
        let ledger = ledger_with("555", "0.00");

        let declaration = ledger
            .declare_death("555", day(4), "admin")
            .unwrap();
        assert!(declaration.reference.starts_with("DC-"));
        assert_eq!(ledger.death_declarations().len(), 1);
        // No balance or status effect
        assert_eq!(ledger.member_balance("555").unwrap(), Decimal::ZERO);

        assert!(matches!(
            ledger.declare_death("999", day(4), "admin").unwrap_err(),
            LedgerError::MemberNotFound { .. }
        ));
    }

    #[test]
    fn test_promote_to_mentor() {
        let ledger = ledger_with("555", "0.00");

        ledger.promote_to_mentor("555").unwrap();

        let member = ledger.member("555").unwrap();
        assert_eq!(member.membertype, MemberType::Mentor);
        assert_eq!(member.updateuser, "555");
    }

    #[test]
    fn test_create_member_duplicate_phone() {
        let ledger = ledger_with("555", "0.00");
        let result = ledger.create_member(
            "555",
            "Doe",
            "Jane",
            day(1),
            "CNI",
            "hash",
            "mentor-1",
        );
        assert!(matches!(
            result.unwrap_err(),
            LedgerError::DuplicateMember { .. }
        ));
    }
}
