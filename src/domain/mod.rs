//! Domain types and the ledger port.
//!
//! Nothing in here performs I/O. The [`ports::LedgerClient`] trait is the
//! seam between the purchase logic and whatever ledger backs it.

pub mod failure;
pub mod ports;
pub mod purchase;
pub mod token;
pub mod track;
pub mod transaction;
