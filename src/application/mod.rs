//! Application layer: the purchase flow and its supporting services.
//!
//! [`session::Session`] holds the explicit ledger context for a connected
//! account. [`coordinator::PurchaseCoordinator`] runs the purchase state
//! machine against it and hands submitted operations to
//! [`watcher::TransactionWatcher`], which polls for their receipts.

pub mod coordinator;
pub mod session;
pub mod watcher;
