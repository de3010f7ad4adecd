use super::token::TokenAmount;
use super::track::TrackId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Identifier of a submitted ledger operation (a transaction hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A mined operation as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub operation_id: OperationId,
    pub block_number: u64,
    pub success: bool,
    /// Whether the vend emitted a lottery reward event.
    #[serde(default)]
    pub reward_earned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        self != TxStatus::Pending
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        };
        f.write_str(tag)
    }
}

/// What the caller knows about an operation at the time it is handed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WatchMeta {
    pub track_id: Option<TrackId>,
    pub amount: Option<TokenAmount>,
}

/// The watcher's record for one submitted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatus {
    pub operation_id: OperationId,
    pub status: TxStatus,
    pub submitted_at: SystemTime,
    pub track_id: Option<TrackId>,
    pub amount: Option<TokenAmount>,
    pub reward_earned: Option<bool>,
    /// Set when the operation was given up on after the attempt ceiling.
    pub timed_out: bool,
    pub attempts: u32,
}

impl TransactionStatus {
    pub fn pending(operation_id: OperationId, meta: WatchMeta) -> Self {
        Self {
            operation_id,
            status: TxStatus::Pending,
            submitted_at: SystemTime::now(),
            track_id: meta.track_id,
            amount: meta.amount,
            reward_earned: None,
            timed_out: false,
            attempts: 0,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == TxStatus::Confirmed
    }

    /// Folds a receipt into the record.
    pub fn resolve(&mut self, receipt: &Receipt) {
        if receipt.success {
            self.status = TxStatus::Confirmed;
            self.reward_earned = Some(receipt.reward_earned);
        } else {
            self.status = TxStatus::Failed;
        }
    }

    pub fn time_out(&mut self) {
        self.status = TxStatus::Failed;
        self.timed_out = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(success: bool, reward_earned: bool) -> Receipt {
        Receipt {
            operation_id: OperationId::new("0x01"),
            block_number: 7,
            success,
            reward_earned,
        }
    }

    #[test]
    fn test_resolve_success_records_reward() {
        let mut status = TransactionStatus::pending(
            OperationId::new("0x01"),
            WatchMeta {
                track_id: Some(3),
                amount: Some(TokenAmount::new(1000)),
            },
        );
        status.resolve(&receipt(true, true));
        assert_eq!(status.status, TxStatus::Confirmed);
        assert_eq!(status.reward_earned, Some(true));
        assert_eq!(status.track_id, Some(3));
        assert!(!status.timed_out);
    }

    #[test]
    fn test_resolve_reverted() {
        let mut status = TransactionStatus::pending(OperationId::new("0x01"), WatchMeta::default());
        status.resolve(&receipt(false, false));
        assert_eq!(status.status, TxStatus::Failed);
        assert_eq!(status.reward_earned, None);
        assert!(!status.timed_out);
    }

    #[test]
    fn test_time_out() {
        let mut status = TransactionStatus::pending(OperationId::new("0x01"), WatchMeta::default());
        status.time_out();
        assert!(status.status.is_terminal());
        assert!(status.timed_out);
    }
}
