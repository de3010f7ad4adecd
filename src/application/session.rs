use crate::domain::ports::LedgerClientRef;
use crate::domain::token::{Address, PaymentInstrument};
use crate::domain::track::{Track, TrackId};
use crate::error::{Result, VendError};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
struct SessionState {
    account: Option<Address>,
    tracks: Vec<Track>,
    instruments: Vec<PaymentInstrument>,
}

/// The client's view of one ledger connection.
///
/// Holds the connected account, the track catalogue and the accepted payment
/// tokens resolved for that account. Everything here is a cache of ledger
/// reads: it is replaced on refresh and never edited locally.
pub struct Session {
    ledger: LedgerClientRef,
    vending_contract: Address,
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new(ledger: LedgerClientRef, vending_contract: Address) -> Self {
        Self {
            ledger,
            vending_contract,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn ledger(&self) -> &LedgerClientRef {
        &self.ledger
    }

    pub fn vending_contract(&self) -> &Address {
        &self.vending_contract
    }

    /// Connects `account` and loads the tracks and its payment tokens.
    pub async fn connect(&self, account: Address) -> Result<()> {
        info!(%account, "connecting session");
        let tracks = self.ledger.get_all_tracks().await?;
        let instruments = self.resolve_instruments(&account).await?;

        let mut state = self.state.write().await;
        state.account = Some(account);
        state.tracks = tracks;
        state.instruments = instruments;
        Ok(())
    }

    /// Forgets the account and its balances. The track catalogue is public
    /// and survives a disconnect.
    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        if let Some(account) = state.account.take() {
            info!(%account, "session disconnected");
        }
        state.instruments.clear();
    }

    pub async fn account(&self) -> Option<Address> {
        self.state.read().await.account.clone()
    }

    pub async fn tracks(&self) -> Vec<Track> {
        self.state.read().await.tracks.clone()
    }

    pub async fn track(&self, id: TrackId) -> Result<Track> {
        self.state
            .read()
            .await
            .tracks
            .iter()
            .find(|track| track.id == id)
            .cloned()
            .ok_or(VendError::UnknownTrack(id))
    }

    pub async fn instruments(&self) -> Vec<PaymentInstrument> {
        self.state.read().await.instruments.clone()
    }

    pub async fn instrument(&self, address: &Address) -> Option<PaymentInstrument> {
        self.state
            .read()
            .await
            .instruments
            .iter()
            .find(|instrument| &instrument.address == address)
            .cloned()
    }

    pub async fn refresh_tracks(&self) -> Result<()> {
        let tracks = self.ledger.get_all_tracks().await?;
        debug!(count = tracks.len(), "tracks refreshed");
        self.state.write().await.tracks = tracks;
        Ok(())
    }

    /// Re-reads the accepted tokens and the connected account's balances.
    pub async fn refresh_balances(&self) -> Result<()> {
        let account = self.account().await.ok_or(VendError::NotConnected)?;
        let instruments = self.resolve_instruments(&account).await?;

        let mut state = self.state.write().await;
        // A disconnect or reconnect may have happened while reading.
        if state.account.as_ref() == Some(&account) {
            state.instruments = instruments;
        }
        Ok(())
    }

    pub async fn refresh(&self) -> Result<()> {
        self.refresh_tracks().await?;
        if self.account().await.is_some() {
            self.refresh_balances().await?;
        }
        Ok(())
    }

    async fn resolve_instruments(&self, account: &Address) -> Result<Vec<PaymentInstrument>> {
        let mut instruments = Vec::new();
        for address in self.ledger.get_accepted_tokens().await? {
            let symbol = self.ledger.token_symbol(&address).await?;
            let decimals = self.ledger.token_decimals(&address).await?;
            let balance = self.ledger.balance_of(&address, account).await?;
            instruments.push(PaymentInstrument {
                address,
                symbol,
                decimals,
                balance,
            });
        }
        Ok(instruments)
    }
}
