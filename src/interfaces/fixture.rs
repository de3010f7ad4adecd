use crate::domain::token::{Address, TokenAmount};
use crate::domain::track::Track;
use crate::error::Result;
use crate::infrastructure::in_memory::InMemoryLedger;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

fn default_accepted() -> bool {
    true
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct AllowanceFixture {
    pub owner: Address,
    /// Defaults to the vending contract.
    pub spender: Option<Address>,
    pub amount: TokenAmount,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct TokenFixture {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default = "default_accepted")]
    pub accepted: bool,
    #[serde(default)]
    pub balances: HashMap<Address, TokenAmount>,
    #[serde(default)]
    pub allowances: Vec<AllowanceFixture>,
}

/// Initial state of a simulated ledger, as loaded from JSON.
#[derive(Debug, Deserialize, PartialEq)]
pub struct LedgerFixture {
    pub vending_contract: Address,
    #[serde(default)]
    pub tokens: Vec<TokenFixture>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub receipt_delay_polls: u32,
    pub reward_every: Option<u64>,
}

impl LedgerFixture {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn into_ledger(self) -> InMemoryLedger {
        let ledger = InMemoryLedger::new(self.vending_contract);
        for token in self.tokens {
            ledger.add_token(token.address.clone(), token.symbol, token.decimals);
            if token.accepted {
                ledger.accept_token(&token.address);
            }
            for (owner, amount) in token.balances {
                ledger.set_balance(&token.address, &owner, amount);
            }
            for allowance in token.allowances {
                let spender = allowance
                    .spender
                    .unwrap_or_else(|| ledger.vending_contract().clone());
                ledger.set_allowance(&token.address, &allowance.owner, &spender, allowance.amount);
            }
        }
        for track in self.tracks {
            ledger.add_track(track);
        }
        ledger.set_receipt_delay(self.receipt_delay_polls);
        if let Some(n) = self.reward_every {
            ledger.set_reward_every(n);
        }
        ledger
    }
}
