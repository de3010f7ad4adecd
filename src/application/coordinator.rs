use super::session::Session;
use super::watcher::{StatusCallback, TransactionWatcher};
use crate::domain::failure::{FailureKind, PurchaseFailure};
use crate::domain::purchase::{PurchaseState, PurchaseStatus};
use crate::domain::token::{Address, PaymentInstrument};
use crate::domain::track::Track;
use crate::domain::transaction::{OperationId, TransactionStatus, WatchMeta};
use crate::error::{Result, VendError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Drives one purchase attempt at a time through allowance check, approval
/// and vend.
///
/// Every failure along the way lands in [`PurchaseState::error`] instead of
/// being returned. A finished attempt (success or error) must be
/// [`reset`](PurchaseCoordinator::reset) before the next one starts.
///
/// Success means the vend was accepted for submission. Its confirmation is
/// tracked by the [`TransactionWatcher`]; once it settles the session is
/// refreshed and the listener registered with
/// [`on_settled`](PurchaseCoordinator::on_settled) is called.
pub struct PurchaseCoordinator {
    session: Arc<Session>,
    watcher: TransactionWatcher,
    state: PurchaseState,
    transitions: Vec<PurchaseStatus>,
    updates: watch::Sender<PurchaseState>,
    listener: Option<StatusCallback>,
}

impl PurchaseCoordinator {
    pub fn new(session: Arc<Session>, watcher: TransactionWatcher) -> Self {
        let (updates, _) = watch::channel(PurchaseState::default());
        Self {
            session,
            watcher,
            state: PurchaseState::default(),
            transitions: vec![PurchaseStatus::Idle],
            updates,
            listener: None,
        }
    }

    pub fn state(&self) -> &PurchaseState {
        &self.state
    }

    /// Statuses visited since the last reset, starting with idle.
    pub fn transitions(&self) -> &[PurchaseStatus] {
        &self.transitions
    }

    /// Receives a snapshot after every transition and reset.
    pub fn subscribe(&self) -> watch::Receiver<PurchaseState> {
        self.updates.subscribe()
    }

    /// Called with the terminal status of each purchase handed to the watcher,
    /// after the session has been refreshed.
    pub fn on_settled(&mut self, listener: StatusCallback) {
        self.listener = Some(listener);
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn watcher(&self) -> &TransactionWatcher {
        &self.watcher
    }

    /// Returns to idle. Operations already broadcast are not affected.
    pub fn reset(&mut self) {
        self.state = PurchaseState::default();
        self.transitions = vec![PurchaseStatus::Idle];
        self.updates.send_replace(self.state.clone());
    }

    /// Buys one item from `track`, paying with `token`.
    ///
    /// Only fails if the previous attempt has not been reset. Everything else
    /// is reported through the returned state.
    pub async fn purchase(&mut self, track: &Track, token: &Address) -> Result<&PurchaseState> {
        if self.state.status != PurchaseStatus::Idle {
            return Err(VendError::AttemptNotReset(self.state.status));
        }

        self.state.track = Some(track.clone());
        self.state.instrument = self.session.instrument(token).await;

        let outcome = match self.guard(track, token).await {
            Ok((account, instrument)) => self.execute(track, &account, &instrument).await,
            Err(failure) => Err(failure),
        };

        match outcome {
            Ok(id) => {
                self.state.operation_id = Some(id.clone());
                self.transition(PurchaseStatus::Success);
                self.hand_off(id, track).await;
            }
            Err(failure) => self.fail(failure),
        }
        Ok(&self.state)
    }

    async fn guard(
        &self,
        track: &Track,
        token: &Address,
    ) -> std::result::Result<(Address, PaymentInstrument), PurchaseFailure> {
        let account = self.session.account().await.ok_or_else(|| {
            PurchaseFailure::new(FailureKind::Unknown, "No wallet connected")
        })?;
        let instrument = self.state.instrument.clone().ok_or_else(|| {
            PurchaseFailure::new(
                FailureKind::TokenNotAccepted,
                format!("{token} is not an accepted payment token"),
            )
        })?;
        if !track.active {
            return Err(PurchaseFailure::of_kind(FailureKind::InvalidTrack));
        }
        if !track.in_stock() {
            return Err(PurchaseFailure::of_kind(FailureKind::InsufficientStock));
        }
        if !instrument.can_afford(track.price) {
            return Err(PurchaseFailure::new(
                FailureKind::InsufficientBalance,
                format!(
                    "Insufficient {} balance: need {}, have {}",
                    instrument.symbol, track.price, instrument.balance
                ),
            ));
        }
        Ok((account, instrument))
    }

    async fn execute(
        &mut self,
        track: &Track,
        account: &Address,
        instrument: &PaymentInstrument,
    ) -> std::result::Result<OperationId, PurchaseFailure> {
        let ledger = self.session.ledger().clone();
        let spender = self.session.vending_contract().clone();

        self.transition(PurchaseStatus::CheckingAllowance);
        let allowance = ledger
            .allowance(&instrument.address, account, &spender)
            .await?;

        if allowance < track.price {
            self.transition(PurchaseStatus::Approving);
            let approval = ledger
                .approve(&instrument.address, account, &spender, track.price)
                .await?;
            self.state.operation_id = Some(approval.clone());
            self.publish();

            let meta = WatchMeta {
                track_id: Some(track.id),
                amount: Some(track.price),
            };
            match self.watcher.wait(approval, meta).await {
                Some(status) if status.is_confirmed() => {}
                Some(status) if status.timed_out => {
                    return Err(PurchaseFailure::of_kind(FailureKind::ReceiptTimeout));
                }
                Some(_) => {
                    return Err(PurchaseFailure::new(
                        FailureKind::Unknown,
                        "Approval transaction failed",
                    ));
                }
                None => {
                    return Err(PurchaseFailure::new(
                        FailureKind::Unknown,
                        "Approval was no longer being tracked",
                    ));
                }
            }
            if let Err(e) = self.session.refresh_balances().await {
                warn!(error = %e, "balance refresh after approval failed");
            }
        }

        self.transition(PurchaseStatus::Purchasing);
        let id = ledger
            .vend_from_track(track.id, &instrument.address, account)
            .await?;
        Ok(id)
    }

    async fn hand_off(&self, id: OperationId, track: &Track) {
        let session = self.session.clone();
        let listener = self.listener.clone();
        let callback: StatusCallback = Arc::new(move |status: &TransactionStatus| {
            let session = session.clone();
            let listener = listener.clone();
            let status = status.clone();
            tokio::spawn(async move {
                if let Err(e) = session.refresh().await {
                    warn!(error = %e, "session refresh after settlement failed");
                }
                if let Some(listener) = listener {
                    listener(&status);
                }
            });
        });
        let meta = WatchMeta {
            track_id: Some(track.id),
            amount: Some(track.price),
        };
        self.watcher.watch(id, meta, callback).await;
    }

    /// Moves to `next`. Edges the state machine does not allow are refused
    /// and leave the state untouched.
    fn transition(&mut self, next: PurchaseStatus) {
        if !self.state.status.can_transition_to(next) {
            warn!(from = %self.state.status, to = %next, "illegal purchase transition refused");
            return;
        }
        info!(from = %self.state.status, to = %next, "purchase transition");
        self.state.status = next;
        self.transitions.push(next);
        self.publish();
    }

    fn fail(&mut self, failure: PurchaseFailure) {
        warn!(
            kind = %failure.kind,
            recoverable = failure.is_recoverable(),
            "purchase failed: {}",
            failure.message
        );
        self.state.error = Some(failure);
        self.transition(PurchaseStatus::Error);
    }

    fn publish(&self) {
        self.updates.send_replace(self.state.clone());
    }
}
