//! Persisted-state layer: member store and movement log
//!
//! Both stores are passive concurrent maps; all ledger semantics live in
//! [`crate::core`]. Per-entry locking is what stands in for the backing
//! database's transaction isolation.

pub mod member_store;
pub mod movement_log;

pub use member_store::MemberStore;
pub use movement_log::MovementLog;
