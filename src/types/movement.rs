//! Movement-related types for the cotisation ledger
//!
//! A movement is one debit or credit ledger entry against a member's balance.
//! The `reference` is the unique external key used for duplicate detection;
//! the richer import schema additionally carries a `payment_id` dedup key.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Movement identifier assigned by the movement log
pub type MovementId = u64;

/// Direction of a movement
///
/// Credit increases the member's balance, Debit decreases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "D")]
    Debit,
    #[serde(rename = "C")]
    Credit,
}

impl Direction {
    /// Normalize a raw debit/credit marker
    ///
    /// Accepts the single-letter codes plus the long forms seen in payment
    /// exports: `C`/`CREDIT`/`CR`/`+` and `D`/`DEBIT`/`DR`/`-`, in any case.
    pub fn parse(raw: &str) -> Option<Direction> {
        match raw.trim().to_uppercase().as_str() {
            "C" | "CREDIT" | "CR" | "+" => Some(Direction::Credit),
            "D" | "DEBIT" | "DR" | "-" => Some(Direction::Debit),
            _ => None,
        }
    }

    /// Single-letter code used in persisted rows and CSV output
    pub fn code(self) -> &'static str {
        match self {
            Direction::Debit => "D",
            Direction::Credit => "C",
        }
    }

    /// Signed balance delta of a movement of `amount` in this direction
    pub fn signed_delta(self, amount: Decimal) -> Decimal {
        match self {
            Direction::Debit => -amount,
            Direction::Credit => amount,
        }
    }
}

/// Persisted movement row
///
/// Immutable once inserted, except through the explicit admin correction
/// path. The first/last names are a denormalized snapshot at time of
/// movement and are never re-synced with the member record.
#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    pub id: MovementId,
    /// Owning member's phone
    pub phone: String,
    pub firstname: String,
    pub lastname: String,
    pub mvt_date: NaiveDate,
    /// Always positive; the direction carries the sign
    pub amount: Decimal,
    pub direction: Direction,
    /// Unique external reference (dedup key)
    pub reference: String,
    /// Optional dedup key from the richer payment-export schema
    pub payment_id: Option<String>,
    /// Free-text label
    pub libelle: String,
    pub updatedate: NaiveDate,
    pub updated_by: String,
}

/// Movement data as produced by the import pipeline or the transfer protocol,
/// before the log assigns an id.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub phone: String,
    pub firstname: String,
    pub lastname: String,
    pub mvt_date: NaiveDate,
    pub amount: Decimal,
    pub direction: Direction,
    pub reference: String,
    pub payment_id: Option<String>,
    pub libelle: String,
    pub updated_by: String,
}

impl NewMovement {
    /// Materialize a movement row with the id assigned by the log
    pub(crate) fn into_movement(self, id: MovementId) -> Movement {
        Movement {
            id,
            phone: self.phone,
            firstname: self.firstname,
            lastname: self.lastname,
            mvt_date: self.mvt_date,
            amount: self.amount,
            direction: self.direction,
            reference: self.reference,
            payment_id: self.payment_id,
            libelle: self.libelle,
            updatedate: chrono::Local::now().date_naive(),
            updated_by: self.updated_by,
        }
    }
}
