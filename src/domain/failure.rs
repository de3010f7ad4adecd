//! Failure taxonomy for purchase attempts.
//!
//! Ledger providers report errors as loosely shaped payloads. [`classify`] is
//! the only place that inspects codes and strings; everything downstream works
//! with [`FailureKind`].

use crate::error::LedgerError;
use std::fmt;

/// EIP-1193 "user rejected request" provider error code.
pub const USER_REJECTED_CODE: i64 = 4001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    InsufficientStock,
    TokenNotAccepted,
    PriceNotSet,
    InsufficientBalance,
    InvalidTrack,
    UserRejectedSignature,
    NetworkUnreachable,
    GasEstimationFailed,
    ReceiptTimeout,
    Unknown,
}

impl FailureKind {
    /// Whether the same track and payment token may be retried after a reset.
    ///
    /// Non-recoverable kinds mean the caller must pick a different track or
    /// payment token.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            FailureKind::InsufficientStock
                | FailureKind::TokenNotAccepted
                | FailureKind::PriceNotSet
                | FailureKind::InvalidTrack
        )
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FailureKind::InsufficientStock => "Insufficient stock for this track",
            FailureKind::TokenNotAccepted => "This payment token is not accepted",
            FailureKind::PriceNotSet => "No price is set for this track and token",
            FailureKind::InsufficientBalance => "Insufficient token balance",
            FailureKind::InvalidTrack => "This track is not available",
            FailureKind::UserRejectedSignature => "The signature request was rejected",
            FailureKind::NetworkUnreachable => "The network could not be reached",
            FailureKind::GasEstimationFailed => "Fee estimation failed",
            FailureKind::ReceiptTimeout => "Timed out waiting for confirmation",
            FailureKind::Unknown => "Unexpected error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            FailureKind::InsufficientStock => "insufficient-stock",
            FailureKind::TokenNotAccepted => "token-not-accepted",
            FailureKind::PriceNotSet => "price-not-set",
            FailureKind::InsufficientBalance => "insufficient-balance",
            FailureKind::InvalidTrack => "invalid-track",
            FailureKind::UserRejectedSignature => "user-rejected-signature",
            FailureKind::NetworkUnreachable => "network-unreachable",
            FailureKind::GasEstimationFailed => "gas-estimation-failed",
            FailureKind::ReceiptTimeout => "receipt-timeout",
            FailureKind::Unknown => "unknown",
        };
        f.write_str(tag)
    }
}

/// The error carried by a purchase attempt that ended in the error state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl PurchaseFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A failure whose message is the stock description of its kind.
    pub fn of_kind(kind: FailureKind) -> Self {
        Self::new(kind, kind.describe())
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }
}

impl From<&LedgerError> for PurchaseFailure {
    fn from(error: &LedgerError) -> Self {
        let kind = classify(error);
        let message = match kind {
            FailureKind::Unknown => error.reason.clone().unwrap_or_else(|| error.message.clone()),
            _ => kind.describe().to_string(),
        };
        Self { kind, message }
    }
}

impl From<LedgerError> for PurchaseFailure {
    fn from(error: LedgerError) -> Self {
        Self::from(&error)
    }
}

impl fmt::Display for PurchaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

const PATTERNS: &[(&[&str], FailureKind)] = &[
    (
        &["user rejected", "user denied", "rejected the request"],
        FailureKind::UserRejectedSignature,
    ),
    (&["insufficient stock", "out of stock"], FailureKind::InsufficientStock),
    (&["token not accepted"], FailureKind::TokenNotAccepted),
    (&["price not set"], FailureKind::PriceNotSet),
    (&["invalid track", "track does not exist"], FailureKind::InvalidTrack),
    (
        &["insufficient balance", "exceeds balance", "insufficient allowance"],
        FailureKind::InsufficientBalance,
    ),
    (&["gas", "estimate"], FailureKind::GasEstimationFailed),
    (
        &["network", "timeout", "timed out", "connection", "unreachable"],
        FailureKind::NetworkUnreachable,
    ),
];

fn match_text(text: &str) -> Option<FailureKind> {
    let text = text.to_ascii_lowercase();
    PATTERNS
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| text.contains(needle)))
        .map(|(_, kind)| *kind)
}

/// Maps a normalized ledger error onto the failure taxonomy.
///
/// The revert reason wins over the message: a revert surfaced during fee
/// estimation mentions "gas" in its message but the reason names the cause.
pub fn classify(error: &LedgerError) -> FailureKind {
    if error.code == Some(USER_REJECTED_CODE) {
        return FailureKind::UserRejectedSignature;
    }
    error
        .reason
        .as_deref()
        .and_then(match_text)
        .or_else(|| match_text(&error.message))
        .unwrap_or(FailureKind::Unknown)
}
