use crate::domain::failure::USER_REJECTED_CODE;
use crate::domain::ports::{LedgerClient, LedgerResult};
use crate::domain::token::{Address, TokenAmount};
use crate::domain::track::{Track, TrackId};
use crate::domain::transaction::{OperationId, Receipt};
use crate::error::LedgerError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A write accepted by the ledger, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Approve {
        id: OperationId,
        token: Address,
        owner: Address,
        spender: Address,
        amount: TokenAmount,
    },
    Vend {
        id: OperationId,
        track_id: TrackId,
        token: Address,
        recipient: Address,
    },
}

impl Submission {
    pub fn id(&self) -> &OperationId {
        match self {
            Submission::Approve { id, .. } | Submission::Vend { id, .. } => id,
        }
    }
}

#[derive(Default)]
struct TokenState {
    symbol: String,
    decimals: u8,
    accepted: bool,
    balances: HashMap<Address, TokenAmount>,
    allowances: HashMap<(Address, Address), TokenAmount>,
}

impl TokenState {
    fn balance(&self, owner: &Address) -> TokenAmount {
        self.balances.get(owner).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> TokenAmount {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or_default()
    }
}

struct PendingReceipt {
    receipt: Receipt,
    remaining_polls: u32,
}

#[derive(Default)]
struct LedgerState {
    tracks: BTreeMap<TrackId, Track>,
    tokens: BTreeMap<Address, TokenState>,
    operations: HashMap<OperationId, PendingReceipt>,
    submissions: Vec<Submission>,
    next_operation: u64,
    block_number: u64,
    vend_count: u64,
    reward_every: Option<u64>,
    receipt_delay: u32,
    failing_polls: u32,
    reject_next_signature: bool,
    revert_next_operation: bool,
    unreachable: bool,
    calls: usize,
}

impl LedgerState {
    fn enter(&mut self) -> LedgerResult<()> {
        self.calls += 1;
        if self.unreachable {
            return Err(LedgerError::new("could not detect network"));
        }
        Ok(())
    }

    fn token(&self, token: &Address) -> LedgerResult<&TokenState> {
        self.tokens
            .get(token)
            .ok_or_else(|| LedgerError::new(format!("call to non-contract address {token}")))
    }

    fn sign(&mut self) -> LedgerResult<()> {
        if std::mem::take(&mut self.reject_next_signature) {
            return Err(LedgerError::new("User rejected the request.").with_code(USER_REJECTED_CODE));
        }
        Ok(())
    }

    /// Records a broadcast operation. Returns `false` when the operation is
    /// going to revert on-chain, in which case its effects must not apply.
    fn broadcast(&mut self, reward_earned: bool) -> (OperationId, bool) {
        self.next_operation += 1;
        self.block_number += 1;
        let id = OperationId::new(format!("0x{:064x}", self.next_operation));
        let success = !std::mem::take(&mut self.revert_next_operation);
        let receipt = Receipt {
            operation_id: id.clone(),
            block_number: self.block_number,
            success,
            reward_earned: success && reward_earned,
        };
        self.operations.insert(
            id.clone(),
            PendingReceipt {
                receipt,
                remaining_polls: self.receipt_delay,
            },
        );
        (id, success)
    }
}

/// A simulated vending contract with its ERC-20 style payment tokens.
///
/// Writes take effect immediately, their receipts become visible after a
/// configurable number of polls. Fault injection hooks let tests reproduce
/// signature rejections, flaky receipt polling, reverted operations and an
/// unreachable network.
pub struct InMemoryLedger {
    vending_contract: Address,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(vending_contract: Address) -> Self {
        Self {
            vending_contract,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn vending_contract(&self) -> &Address {
        &self.vending_contract
    }

    pub fn add_track(&self, track: Track) {
        self.state().tracks.insert(track.id, track);
    }

    /// Deploys a token. Tokens are not accepted for payment until
    /// [`InMemoryLedger::accept_token`] is called.
    pub fn add_token(&self, address: Address, symbol: impl Into<String>, decimals: u8) {
        self.state().tokens.insert(
            address,
            TokenState {
                symbol: symbol.into(),
                decimals,
                ..TokenState::default()
            },
        );
    }

    pub fn accept_token(&self, address: &Address) {
        if let Some(token) = self.state().tokens.get_mut(address) {
            token.accepted = true;
        }
    }

    pub fn set_balance(&self, token: &Address, owner: &Address, amount: TokenAmount) {
        if let Some(token) = self.state().tokens.get_mut(token) {
            token.balances.insert(owner.clone(), amount);
        }
    }

    pub fn set_allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: TokenAmount,
    ) {
        if let Some(token) = self.state().tokens.get_mut(token) {
            token
                .allowances
                .insert((owner.clone(), spender.clone()), amount);
        }
    }

    /// Every `n`th successful vend earns a lottery reward.
    pub fn set_reward_every(&self, n: u64) {
        self.state().reward_every = (n > 0).then_some(n);
    }

    /// Number of empty polls each operation submitted from now on sees
    /// before its receipt appears. `u32::MAX` means it effectively never does.
    pub fn set_receipt_delay(&self, polls: u32) {
        self.state().receipt_delay = polls;
    }

    /// The next `polls` receipt queries fail with a network error.
    pub fn fail_next_polls(&self, polls: u32) {
        self.state().failing_polls = polls;
    }

    pub fn reject_next_signature(&self) {
        self.state().reject_next_signature = true;
    }

    /// The next submitted operation is mined with a failed receipt.
    pub fn revert_next_operation(&self) {
        self.state().revert_next_operation = true;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    /// Number of ledger calls made so far, reads and writes alike.
    pub fn call_count(&self) -> usize {
        self.state().calls
    }

    pub fn balance(&self, token: &Address, owner: &Address) -> TokenAmount {
        self.state()
            .tokens
            .get(token)
            .map(|token| token.balance(owner))
            .unwrap_or_default()
    }

    pub fn track(&self, id: TrackId) -> Option<Track> {
        self.state().tracks.get(&id).cloned()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn get_all_tracks(&self) -> LedgerResult<Vec<Track>> {
        let mut state = self.state();
        state.enter()?;
        Ok(state.tracks.values().cloned().collect())
    }

    async fn get_accepted_tokens(&self) -> LedgerResult<Vec<Address>> {
        let mut state = self.state();
        state.enter()?;
        Ok(state
            .tokens
            .iter()
            .filter(|(_, token)| token.accepted)
            .map(|(address, _)| address.clone())
            .collect())
    }

    async fn token_symbol(&self, token: &Address) -> LedgerResult<String> {
        let mut state = self.state();
        state.enter()?;
        Ok(state.token(token)?.symbol.clone())
    }

    async fn token_decimals(&self, token: &Address) -> LedgerResult<u8> {
        let mut state = self.state();
        state.enter()?;
        Ok(state.token(token)?.decimals)
    }

    async fn allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> LedgerResult<TokenAmount> {
        let mut state = self.state();
        state.enter()?;
        Ok(state.token(token)?.allowance(owner, spender))
    }

    async fn balance_of(&self, token: &Address, owner: &Address) -> LedgerResult<TokenAmount> {
        let mut state = self.state();
        state.enter()?;
        Ok(state.token(token)?.balance(owner))
    }

    async fn approve(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: TokenAmount,
    ) -> LedgerResult<OperationId> {
        let mut state = self.state();
        state.enter()?;
        state.token(token)?;
        state.sign()?;

        let (id, success) = state.broadcast(false);
        if success && let Some(token_state) = state.tokens.get_mut(token) {
            token_state
                .allowances
                .insert((owner.clone(), spender.clone()), amount);
        }
        state.submissions.push(Submission::Approve {
            id: id.clone(),
            token: token.clone(),
            owner: owner.clone(),
            spender: spender.clone(),
            amount,
        });
        debug!(operation = %id, %token, %owner, %amount, "approve broadcast");
        Ok(id)
    }

    async fn vend_from_track(
        &self,
        track_id: TrackId,
        token: &Address,
        recipient: &Address,
    ) -> LedgerResult<OperationId> {
        let mut state = self.state();
        state.enter()?;

        // Fee estimation runs the call first, so contract reverts surface
        // before the signer is asked.
        let track = state
            .tracks
            .get(&track_id)
            .filter(|track| track.active)
            .cloned()
            .ok_or_else(|| LedgerError::reverted("Invalid track"))?;
        let token_state = state
            .tokens
            .get(token)
            .filter(|token| token.accepted)
            .ok_or_else(|| LedgerError::reverted("Token not accepted"))?;
        if track.price.is_zero() {
            return Err(LedgerError::reverted("Price not set"));
        }
        if !track.in_stock() {
            return Err(LedgerError::reverted("Insufficient stock"));
        }
        if token_state.allowance(recipient, &self.vending_contract) < track.price {
            return Err(LedgerError::reverted("ERC20: insufficient allowance"));
        }
        if token_state.balance(recipient) < track.price {
            return Err(LedgerError::reverted(
                "ERC20: transfer amount exceeds balance",
            ));
        }
        state.sign()?;

        let vend_number = state.vend_count + 1;
        let reward = state.reward_every.is_some_and(|n| vend_number % n == 0);
        let (id, success) = state.broadcast(reward);
        if success {
            state.vend_count = vend_number;
            if let Some(track) = state.tracks.get_mut(&track_id) {
                track.stock -= 1;
            }
            if let Some(token_state) = state.tokens.get_mut(token) {
                let key = (recipient.clone(), self.vending_contract.clone());
                let allowance = token_state.allowances.entry(key).or_default();
                *allowance -= track.price;
                *token_state.balances.entry(recipient.clone()).or_default() -= track.price;
                *token_state
                    .balances
                    .entry(self.vending_contract.clone())
                    .or_default() += track.price;
            }
        }
        state.submissions.push(Submission::Vend {
            id: id.clone(),
            track_id,
            token: token.clone(),
            recipient: recipient.clone(),
        });
        debug!(operation = %id, track = track_id, %token, %recipient, "vend broadcast");
        Ok(id)
    }

    async fn get_transaction_receipt(&self, id: &OperationId) -> LedgerResult<Option<Receipt>> {
        let mut state = self.state();
        state.enter()?;
        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            return Err(LedgerError::new("network request timed out"));
        }
        let Some(pending) = state.operations.get_mut(id) else {
            return Ok(None);
        };
        if pending.remaining_polls > 0 {
            pending.remaining_polls -= 1;
            return Ok(None);
        }
        Ok(Some(pending.receipt.clone()))
    }
}
