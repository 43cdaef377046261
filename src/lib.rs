//! Cotisation Ledger Library
//! # Overview
//!
//! Membership and contribution ledger for a mutual-aid association: member
//! records, debit/credit movements against a running balance, peer-to-peer
//! transfers, and a bulk CSV import of cotisation payments.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Member, Movement, roles, errors)
//! - [`cli`] - CLI argument parsing
//! - [`store`] - Passive concurrent state:
//!   - [`store::member_store`] - Member rows keyed by phone
//!   - [`store::movement_log`] - Movement rows with unique-reference enforcement
//! - [`core`] - Business logic components:
//!   - [`core::reconciler`] - Balance mutation and the inactivity status rule
//!   - [`core::import`] - Row-by-row payment import pipeline
//!   - [`core::ledger`] - Operation facade (movements, transfers, corrections)
//! - [`io`] - CSV parsing and roster output
//!
//! # Ledger Rules
//!
//! - A movement is a positive amount plus a direction; Credit increases the
//!   member's balance, Debit decreases it.
//! - The movement reference is unique across the log and is the duplicate
//!   detection key for imports.
//! - A movement driving an `actif` member's balance strictly below zero flips
//!   the member to `inactif`; the transition is never reversed automatically.
//! - Transfers write one Debit and one Credit leg sharing a `TR-` reference
//!   base; both commit or neither does.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod store;
pub mod types;

pub use core::{ImportStats, Ledger, MovementCorrection, TransferReceipt};
pub use io::csv_format::{read_members_csv, write_members_csv};
pub use types::{
    Direction, LedgerError, Member, MemberStatus, MemberType, Movement, MovementId,
};
