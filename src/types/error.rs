//! Error types for the cotisation ledger
//!
//! Errors fall into three groups:
//!
//! - **File-level errors**: unreadable input, missing required columns. These
//!   fail an import before any row is processed.
//! - **Operation errors**: missing members, duplicate references,
//!   insufficient funds. These reject a single ledger operation with no side
//!   effect.
//! - **Per-row import problems** are deliberately NOT errors: the pipeline
//!   converts them to skip outcomes so one bad row never aborts a batch.

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the ledger core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// The input file is structurally unusable (not the case of a bad row)
    #[error("Bad input: {message}")]
    BadInput {
        /// Description of the file-level problem
        message: String,
    },

    /// Required CSV columns are absent from the header
    #[error("Missing required columns: {columns}")]
    MissingColumns {
        /// Comma-separated list of the absent columns
        columns: String,
    },

    /// I/O error while reading or writing files
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },

    /// The phone does not resolve to a member row
    ///
    /// During import the caller resolves this by auto-provisioning; during a
    /// transfer or a direct movement application it is a hard failure.
    #[error("Member not found: {phone}")]
    MemberNotFound {
        /// Phone that did not resolve
        phone: String,
    },

    /// Transfer beneficiary does not resolve to a member row
    #[error("Beneficiary not found: {phone}")]
    BeneficiaryNotFound {
        /// Phone of the missing beneficiary
        phone: String,
    },

    /// A member row already exists for this phone
    #[error("Member already exists: {phone}")]
    DuplicateMember {
        /// Phone that is already registered
        phone: String,
    },

    /// The movement reference (or payment id) is already in the log
    ///
    /// Reference uniqueness is the sole duplicate-prevention mechanism, so
    /// the second application of a reference is always a no-op.
    #[error("Duplicate reference: {reference}")]
    DuplicateReference {
        /// The colliding dedup key
        reference: String,
    },

    /// Amount is zero, negative, or otherwise unusable
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The offending amount as supplied
        amount: String,
    },

    /// Sender balance is below the requested transfer amount
    #[error("Insufficient funds for {phone}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Sender's phone
        phone: String,
        /// Balance at the time of the check
        available: Decimal,
        /// Requested transfer amount
        requested: Decimal,
    },

    /// No movement row with this id
    #[error("Movement {id} not found")]
    MovementNotFound {
        /// Movement id that did not resolve
        id: u64,
    },

    /// A transfer failed after validation; both legs have been rolled back
    #[error("Transfer failed: {message}")]
    TransferFailed {
        /// Underlying cause
        message: String,
    },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        LedgerError::BadInput {
            message: error.to_string(),
        }
    }
}

// Helper constructors, mirroring the call sites' needs

impl LedgerError {
    pub fn bad_input(message: impl Into<String>) -> Self {
        LedgerError::BadInput {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        LedgerError::Io {
            message: message.into(),
        }
    }

    pub fn missing_columns(columns: &[&str]) -> Self {
        LedgerError::MissingColumns {
            columns: columns.join(", "),
        }
    }

    pub fn member_not_found(phone: &str) -> Self {
        LedgerError::MemberNotFound {
            phone: phone.to_string(),
        }
    }

    pub fn beneficiary_not_found(phone: &str) -> Self {
        LedgerError::BeneficiaryNotFound {
            phone: phone.to_string(),
        }
    }

    pub fn duplicate_member(phone: &str) -> Self {
        LedgerError::DuplicateMember {
            phone: phone.to_string(),
        }
    }

    pub fn duplicate_reference(reference: &str) -> Self {
        LedgerError::DuplicateReference {
            reference: reference.to_string(),
        }
    }

    pub fn invalid_amount(amount: impl ToString) -> Self {
        LedgerError::InvalidAmount {
            amount: amount.to_string(),
        }
    }

    pub fn insufficient_funds(phone: &str, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            phone: phone.to_string(),
            available,
            requested,
        }
    }

    pub fn movement_not_found(id: u64) -> Self {
        LedgerError::MovementNotFound { id }
    }

    pub fn transfer_failed(message: impl Into<String>) -> Self {
        LedgerError::TransferFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case::bad_input(
        LedgerError::bad_input("empty file"),
        "Bad input: empty file"
    )]
    #[case::missing_columns(
        LedgerError::missing_columns(&["phone", "amount"]),
        "Missing required columns: phone, amount"
    )]
    #[case::member_not_found(
        LedgerError::member_not_found("555"),
        "Member not found: 555"
    )]
    #[case::beneficiary_not_found(
        LedgerError::beneficiary_not_found("666"),
        "Beneficiary not found: 666"
    )]
    #[case::duplicate_member(
        LedgerError::duplicate_member("555"),
        "Member already exists: 555"
    )]
    #[case::duplicate_reference(
        LedgerError::duplicate_reference("REF1"),
        "Duplicate reference: REF1"
    )]
    #[case::invalid_amount(
        LedgerError::invalid_amount("-3"),
        "Invalid amount: -3"
    )]
    #[case::insufficient_funds(
        LedgerError::insufficient_funds(
            "555",
            Decimal::from_str("5.00").unwrap(),
            Decimal::from_str("10.00").unwrap(),
        ),
        "Insufficient funds for 555: available 5.00, requested 10.00"
    )]
    #[case::movement_not_found(
        LedgerError::movement_not_found(42),
        "Movement 42 not found"
    )]
    #[case::transfer_failed(
        LedgerError::transfer_failed("receiver vanished"),
        "Transfer failed: receiver vanished"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: LedgerError = io_error.into();
        assert!(matches!(error, LedgerError::Io { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
