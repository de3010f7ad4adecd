use super::failure::PurchaseFailure;
use super::token::PaymentInstrument;
use super::track::Track;
use super::transaction::OperationId;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PurchaseStatus {
    #[default]
    Idle,
    CheckingAllowance,
    Approving,
    Purchasing,
    Success,
    Error,
}

impl PurchaseStatus {
    /// Legal forward edges of the purchase state machine.
    ///
    /// Going back to `Idle` is only possible through an explicit reset, which
    /// does not go through this check.
    pub fn can_transition_to(self, next: PurchaseStatus) -> bool {
        use PurchaseStatus::*;
        matches!(
            (self, next),
            (Idle, CheckingAllowance)
                | (Idle, Error)
                | (CheckingAllowance, Approving)
                | (CheckingAllowance, Purchasing)
                | (CheckingAllowance, Error)
                | (Approving, Purchasing)
                | (Approving, Error)
                | (Purchasing, Success)
                | (Purchasing, Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PurchaseStatus::Success | PurchaseStatus::Error)
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            PurchaseStatus::Idle => "idle",
            PurchaseStatus::CheckingAllowance => "checking-allowance",
            PurchaseStatus::Approving => "approving",
            PurchaseStatus::Purchasing => "purchasing",
            PurchaseStatus::Success => "success",
            PurchaseStatus::Error => "error",
        };
        f.write_str(tag)
    }
}

/// Snapshot of the coordinator's single purchase attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PurchaseState {
    pub track: Option<Track>,
    pub instrument: Option<PaymentInstrument>,
    pub status: PurchaseStatus,
    /// Set once an approval or purchase operation has been submitted.
    pub operation_id: Option<OperationId>,
    pub error: Option<PurchaseFailure>,
}

impl PurchaseState {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}
