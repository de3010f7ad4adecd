use super::token::TokenAmount;
use serde::{Deserialize, Serialize};

pub type TrackId = u64;

/// A purchasable vending slot as reported by the vending contract.
///
/// Tracks are never mutated locally, the session replaces them wholesale on
/// every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    /// Unit price in the smallest unit of the payment token.
    pub price: TokenAmount,
    pub stock: u64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Track {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
