use super::token::{Address, TokenAmount};
use super::track::{Track, TrackId};
use super::transaction::{OperationId, Receipt};
use crate::error::LedgerError;
use async_trait::async_trait;
use std::sync::Arc;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// The external ledger: the vending contract, the token contracts it accepts
/// and the signer acting for the connected account.
///
/// Writes return as soon as the operation is broadcast. Confirmation is
/// observed separately through [`LedgerClient::get_transaction_receipt`].
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn get_all_tracks(&self) -> LedgerResult<Vec<Track>>;
    async fn get_accepted_tokens(&self) -> LedgerResult<Vec<Address>>;
    async fn token_symbol(&self, token: &Address) -> LedgerResult<String>;
    async fn token_decimals(&self, token: &Address) -> LedgerResult<u8>;
    async fn allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> LedgerResult<TokenAmount>;
    async fn balance_of(&self, token: &Address, owner: &Address) -> LedgerResult<TokenAmount>;
    async fn approve(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: TokenAmount,
    ) -> LedgerResult<OperationId>;
    async fn vend_from_track(
        &self,
        track_id: TrackId,
        token: &Address,
        recipient: &Address,
    ) -> LedgerResult<OperationId>;
    async fn get_transaction_receipt(&self, id: &OperationId) -> LedgerResult<Option<Receipt>>;
}

pub type LedgerClientRef = Arc<dyn LedgerClient>;
