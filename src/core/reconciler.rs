//! Balance reconciler
//!
//! The sole authority for mutating member balances and deriving the status
//! side effect. Given a phone, an amount, and a direction it applies the
//! signed delta to the stored balance inside the member row's entry lock and
//! evaluates the inactivity rule in the same critical section, so no observer
//! can see the balance change without the matching status decision.

use crate::store::MemberStore;
use crate::types::{Direction, LedgerError, MemberStatus};
use rust_decimal::Decimal;

/// Result of applying one movement to a member's balance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Applied {
    /// Balance after the increment
    pub balance: Decimal,
    /// Whether this application flipped the member from `actif` to `inactif`
    pub flagged_inactive: bool,
}

/// Apply a movement's effect to a member's stored balance
///
/// The amount must already be validated as strictly positive by the caller;
/// the pipeline and the transfer protocol both reject bad amounts before any
/// movement reaches this point.
///
/// Status rule: when the post-update balance is strictly below zero and the
/// member's status was exactly `actif`, the member becomes `inactif`. The
/// transition is one-directional and is never re-evaluated retroactively; a
/// balance returning to zero or above does not reactivate anyone, and a
/// balance of exactly zero never triggers it.
///
/// # Errors
///
/// Returns `MemberNotFound` if the phone has no member row. Callers resolve
/// that either by auto-provisioning (import) or by rejecting the operation
/// (transfer, direct application).
pub fn apply_movement(
    store: &MemberStore,
    phone: &str,
    amount: Decimal,
    direction: Direction,
    updated_by: &str,
) -> Result<Applied, LedgerError> {
    let delta = direction.signed_delta(amount);
    let today = chrono::Local::now().date_naive();

    store.update(phone, |member| {
        member.balance += delta;
        let flagged_inactive =
            member.balance < Decimal::ZERO && member.currentstatute == MemberStatus::Actif;
        if flagged_inactive {
            member.currentstatute = MemberStatus::Inactif;
        }
        member.updatedate = today;
        member.updateuser = updated_by.to_string();
        Applied {
            balance: member.balance,
            flagged_inactive,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Member;
    use rstest::rstest;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn store_with(phone: &str, balance: &str, status: MemberStatus) -> MemberStore {
        let store = MemberStore::new();
        let mut member = Member::provisioned(phone, "Jane", "Doe", "test");
        member.balance = dec(balance);
        member.currentstatute = status;
        store.insert(member).unwrap();
        store
    }

    #[test]
    fn test_credit_increases_balance() {
        let store = store_with("555", "0.00", MemberStatus::Actif);

        let applied =
            apply_movement(&store, "555", dec("10.00"), Direction::Credit, "test").unwrap();

        assert_eq!(applied.balance, dec("10.00"));
        assert!(!applied.flagged_inactive);
        assert_eq!(store.get("555").unwrap().balance, dec("10.00"));
    }

    #[test]
    fn test_debit_decreases_balance() {
        let store = store_with("555", "25.00", MemberStatus::Actif);

        let applied =
            apply_movement(&store, "555", dec("10.00"), Direction::Debit, "test").unwrap();

        assert_eq!(applied.balance, dec("15.00"));
        assert!(!applied.flagged_inactive);
    }

    #[test]
    fn test_actif_member_driven_one_cent_negative_is_flagged() {
        let store = store_with("555", "0.00", MemberStatus::Actif);

        let applied =
            apply_movement(&store, "555", dec("0.01"), Direction::Debit, "test").unwrap();

        assert_eq!(applied.balance, dec("-0.01"));
        assert!(applied.flagged_inactive);
        assert_eq!(
            store.get("555").unwrap().currentstatute,
            MemberStatus::Inactif
        );
    }

    #[test]
    fn test_balance_of_exactly_zero_keeps_status() {
        let store = store_with("555", "10.00", MemberStatus::Actif);

        let applied =
            apply_movement(&store, "555", dec("10.00"), Direction::Debit, "test").unwrap();

        assert_eq!(applied.balance, Decimal::ZERO);
        assert!(!applied.flagged_inactive);
        assert_eq!(
            store.get("555").unwrap().currentstatute,
            MemberStatus::Actif
        );
    }

    #[rstest]
    #[case(MemberStatus::Suspendu)]
    #[case(MemberStatus::Radie)]
    #[case(MemberStatus::Probatoire)]
    #[case(MemberStatus::Inactif)]
    fn test_only_actif_members_transition(#[case] status: MemberStatus) {
        let store = store_with("555", "0.00", status);

        let applied =
            apply_movement(&store, "555", dec("5.00"), Direction::Debit, "test").unwrap();

        assert_eq!(applied.balance, dec("-5.00"));
        assert!(!applied.flagged_inactive);
        assert_eq!(store.get("555").unwrap().currentstatute, status);
    }

    #[test]
    fn test_no_automatic_reactivation() {
        let store = store_with("555", "0.00", MemberStatus::Actif);

        apply_movement(&store, "555", dec("1.00"), Direction::Debit, "test").unwrap();
        let applied =
            apply_movement(&store, "555", dec("50.00"), Direction::Credit, "test").unwrap();

        assert_eq!(applied.balance, dec("49.00"));
        assert_eq!(
            store.get("555").unwrap().currentstatute,
            MemberStatus::Inactif
        );
    }

    #[test]
    fn test_missing_member_fails() {
        let store = MemberStore::new();
        let result = apply_movement(&store, "999", dec("1.00"), Direction::Credit, "test");
        assert!(matches!(
            result.unwrap_err(),
            LedgerError::MemberNotFound { .. }
        ));
    }

    #[test]
    fn test_audit_fields_updated() {
        let store = store_with("555", "0.00", MemberStatus::Actif);

        apply_movement(&store, "555", dec("1.00"), Direction::Credit, "importer").unwrap();

        let member = store.get("555").unwrap();
        assert_eq!(member.updateuser, "importer");
        assert_eq!(member.updatedate, chrono::Local::now().date_naive());
    }
}
