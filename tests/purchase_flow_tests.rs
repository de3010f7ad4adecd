mod common;

use common::{address, buyer, coordinator, ledger, track, usdc, vending_contract};
use mutual_vend::application::watcher::StatusCallback;
use mutual_vend::domain::failure::FailureKind;
use mutual_vend::domain::purchase::PurchaseStatus::*;
use mutual_vend::domain::token::TokenAmount;
use mutual_vend::domain::transaction::{TransactionStatus, TxStatus};
use mutual_vend::infrastructure::in_memory::Submission;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, sleep};

#[tokio::test(start_paused = true)]
async fn test_approval_then_purchase_scenario() {
    let cola = track(3, 1000, 5);
    let ledger = ledger(1000, 0, &[cola.clone()]);
    let mut coordinator = coordinator(&ledger).await;

    let state = coordinator.purchase(&cola, &usdc()).await.unwrap();
    assert_eq!(state.status, Success);
    assert!(state.error.is_none());
    assert_eq!(
        coordinator.transitions(),
        &[Idle, CheckingAllowance, Approving, Purchasing, Success]
    );

    let submissions = ledger.submissions();
    assert_eq!(submissions.len(), 2);
    assert!(matches!(
        &submissions[0],
        Submission::Approve { amount, spender, .. }
            if *amount == TokenAmount::new(1000) && *spender == vending_contract()
    ));
    assert!(matches!(
        &submissions[1],
        Submission::Vend { track_id: 3, recipient, .. } if *recipient == buyer()
    ));
    assert_eq!(
        coordinator.state().operation_id.as_ref(),
        Some(submissions[1].id())
    );
}

#[tokio::test(start_paused = true)]
async fn test_out_of_stock_makes_no_ledger_calls() {
    let water = track(1, 500, 0);
    let ledger = ledger(1000, 0, &[water.clone()]);
    let mut coordinator = coordinator(&ledger).await;
    let calls = ledger.call_count();

    let state = coordinator.purchase(&water, &usdc()).await.unwrap();
    assert_eq!(state.status, Error);
    let error = state.error.as_ref().unwrap();
    assert_eq!(error.kind, FailureKind::InsufficientStock);
    assert!(error.message.to_lowercase().contains("insufficient stock"));
    assert!(!error.is_recoverable());
    assert!(state.operation_id.is_none());

    assert_eq!(ledger.call_count(), calls);
    assert!(ledger.submissions().is_empty());
    assert!(!coordinator.transitions().contains(&CheckingAllowance));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_signature_then_retry() {
    let cola = track(3, 1000, 5);
    let ledger = ledger(1000, 1000, &[cola.clone()]);
    let mut coordinator = coordinator(&ledger).await;

    ledger.reject_next_signature();
    let state = coordinator.purchase(&cola, &usdc()).await.unwrap();
    assert_eq!(state.status, Error);
    let error = state.error.as_ref().unwrap();
    assert_eq!(error.kind, FailureKind::UserRejectedSignature);
    assert!(error.is_recoverable());
    assert_eq!(
        coordinator.transitions(),
        &[Idle, CheckingAllowance, Purchasing, Error]
    );

    coordinator.reset();
    assert!(coordinator.state().is_idle());

    let state = coordinator.purchase(&cola, &usdc()).await.unwrap();
    assert_eq!(state.status, Success);
    assert_eq!(ledger.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_purchase_waits_for_approval_confirmation() {
    let cola = track(3, 1000, 5);
    let ledger = ledger(1000, 0, &[cola.clone()]);
    ledger.set_receipt_delay(5);
    let mut coordinator = coordinator(&ledger).await;

    let start = Instant::now();
    let state = coordinator.purchase(&cola, &usdc()).await.unwrap();
    assert_eq!(state.status, Success);
    // Five empty polls, then the receipt on the sixth, two seconds apart.
    assert_eq!(start.elapsed(), Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn test_settlement_refreshes_session_then_notifies() {
    let cola = track(3, 1000, 5);
    let ledger = ledger(3000, 3000, &[cola.clone()]);
    ledger.set_reward_every(1);
    let mut coordinator = coordinator(&ledger).await;

    let seen: Arc<Mutex<Vec<TransactionStatus>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let session = coordinator.session().clone();
    let stock_at_notification = Arc::new(Mutex::new(None));
    let stock_sink = stock_at_notification.clone();
    let listener: StatusCallback = Arc::new(move |status: &TransactionStatus| {
        sink.lock().unwrap().push(status.clone());
        let session = session.clone();
        let stock_sink = stock_sink.clone();
        // Snapshot what the session held when the listener ran.
        tokio::spawn(async move {
            let stock = session.track(3).await.unwrap().stock;
            *stock_sink.lock().unwrap() = Some(stock);
        });
    });
    coordinator.on_settled(listener);

    coordinator.purchase(&cola, &usdc()).await.unwrap();
    sleep(Duration::from_secs(5)).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].status, TxStatus::Confirmed);
    assert_eq!(seen[0].track_id, Some(3));
    assert_eq!(seen[0].amount, Some(TokenAmount::new(1000)));
    assert_eq!(seen[0].reward_earned, Some(true));

    assert_eq!(*stock_at_notification.lock().unwrap(), Some(4));
    let instrument = coordinator.session().instrument(&usdc()).await.unwrap();
    assert_eq!(instrument.balance, TokenAmount::new(2000));
}

#[tokio::test(start_paused = true)]
async fn test_stale_balance_surfaces_at_submission() {
    let cola = track(3, 1000, 5);
    let ledger = ledger(1000, 1000, &[cola.clone()]);
    let mut coordinator = coordinator(&ledger).await;

    // The buyer spends elsewhere; the session still shows the old balance.
    ledger.set_balance(&usdc(), &buyer(), TokenAmount::new(10));

    let state = coordinator.purchase(&cola, &usdc()).await.unwrap();
    assert_eq!(state.status, Error);
    assert_eq!(
        state.error.as_ref().unwrap().kind,
        FailureKind::InsufficientBalance
    );
    assert_eq!(
        coordinator.transitions(),
        &[Idle, CheckingAllowance, Purchasing, Error]
    );
}

#[tokio::test(start_paused = true)]
async fn test_inactive_track_is_invalid() {
    let mut retired = track(5, 100, 3);
    retired.active = false;
    let ledger = ledger(1000, 0, &[retired.clone()]);
    let mut coordinator = coordinator(&ledger).await;

    let state = coordinator.purchase(&retired, &usdc()).await.unwrap();
    assert_eq!(state.error.as_ref().unwrap().kind, FailureKind::InvalidTrack);
    assert_eq!(state.track.as_ref().map(|t| t.id), Some(5));
    assert_eq!(
        state.instrument.as_ref().map(|i| i.address.clone()),
        Some(usdc())
    );
    assert!(ledger.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_token_is_not_accepted() {
    let cola = track(3, 1000, 5);
    let ledger = ledger(1000, 0, &[cola.clone()]);
    let mut coordinator = coordinator(&ledger).await;

    let state = coordinator.purchase(&cola, &address(0x42)).await.unwrap();
    assert_eq!(
        state.error.as_ref().unwrap().kind,
        FailureKind::TokenNotAccepted
    );
    assert!(state.instrument.is_none());
}
