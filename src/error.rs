use crate::domain::purchase::PurchaseStatus;
use thiserror::Error;

/// A normalized error description coming back from the ledger.
///
/// Providers report failures in many shapes (RPC error codes, revert reasons,
/// free-form messages). Every adapter flattens them into this one struct so
/// that classification happens in a single place, see
/// [`crate::domain::failure::classify`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Default)]
#[error("{message}")]
pub struct LedgerError {
    pub code: Option<i64>,
    pub reason: Option<String>,
    pub message: String,
}

impl LedgerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn reverted(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            code: None,
            message: format!("execution reverted: {reason}"),
            reason: Some(reason),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

#[derive(Error, Debug)]
pub enum VendError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Purchase attempt is in state {0}, reset before starting another")]
    AttemptNotReset(PurchaseStatus),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Unknown track: {0}")]
    UnknownTrack(u64),
    #[error("No account connected")]
    NotConnected,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, VendError>;
