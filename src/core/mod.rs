//! Ledger core: reconciler, import pipeline, and the operation facade

pub mod import;
pub mod ledger;
pub mod reconciler;

pub use import::ImportStats;
pub use ledger::{Ledger, MovementCorrection, TransferReceipt};
pub use reconciler::Applied;
