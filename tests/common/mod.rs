#![allow(dead_code)]

use mutual_vend::application::coordinator::PurchaseCoordinator;
use mutual_vend::application::session::Session;
use mutual_vend::application::watcher::TransactionWatcher;
use mutual_vend::config::WatcherConfig;
use mutual_vend::domain::token::{Address, TokenAmount};
use mutual_vend::domain::track::Track;
use mutual_vend::infrastructure::in_memory::InMemoryLedger;
use std::sync::Arc;

pub fn address(byte: u8) -> Address {
    Address::parse(&format!("0x{:040x}", byte)).unwrap()
}

pub fn vending_contract() -> Address {
    address(0xfe)
}

pub fn usdc() -> Address {
    address(1)
}

pub fn buyer() -> Address {
    address(7)
}

pub fn track(id: u64, price: u128, stock: u64) -> Track {
    Track {
        id,
        name: format!("Track {id}"),
        price: TokenAmount::new(price),
        stock,
        active: true,
    }
}

/// A ledger with one accepted token and the given tracks, where the buyer
/// holds `balance` and has already approved `allowance` to the vending
/// contract.
pub fn ledger(balance: u128, allowance: u128, tracks: &[Track]) -> Arc<InMemoryLedger> {
    let ledger = Arc::new(InMemoryLedger::new(vending_contract()));
    ledger.add_token(usdc(), "USDC", 6);
    ledger.accept_token(&usdc());
    ledger.set_balance(&usdc(), &buyer(), TokenAmount::new(balance));
    ledger.set_allowance(
        &usdc(),
        &buyer(),
        &vending_contract(),
        TokenAmount::new(allowance),
    );
    for track in tracks {
        ledger.add_track(track.clone());
    }
    ledger
}

/// Connects the buyer and wires a coordinator with the default watcher
/// timing.
pub async fn coordinator(ledger: &Arc<InMemoryLedger>) -> PurchaseCoordinator {
    let session = Arc::new(Session::new(ledger.clone(), vending_contract()));
    session.connect(buyer()).await.unwrap();
    let watcher = TransactionWatcher::new(ledger.clone(), WatcherConfig::default());
    PurchaseCoordinator::new(session, watcher)
}
