//! Core data types for the cotisation ledger
//!
//! This module contains member records, movement entries, and error types
//! used throughout the system.

pub mod error;
pub mod member;
pub mod movement;

pub use error::LedgerError;
pub use member::{DeathDeclaration, Member, MemberStatus, MemberType, NO_LOGIN_MARKER};
pub use movement::{Direction, Movement, MovementId, NewMovement};
