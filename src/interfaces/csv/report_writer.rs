use crate::domain::purchase::PurchaseState;
use crate::domain::token::PaymentInstrument;
use crate::domain::track::Track;
use crate::domain::transaction::TransactionStatus;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct TrackRecord<'a> {
    id: u64,
    name: &'a str,
    price: String,
    stock: u64,
    active: bool,
}

#[derive(Serialize)]
struct InstrumentRecord<'a> {
    address: &'a str,
    symbol: &'a str,
    decimals: u8,
    balance: String,
}

#[derive(Serialize)]
struct PurchaseRecord {
    status: String,
    track: Option<u64>,
    token: Option<String>,
    operation: Option<String>,
    confirmed: Option<String>,
    reward: Option<bool>,
    error: Option<String>,
}

/// Writes CLI reports as CSV with a header row.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_tracks(&mut self, tracks: &[Track]) -> Result<()> {
        for track in tracks {
            self.writer.serialize(TrackRecord {
                id: track.id,
                name: &track.name,
                price: track.price.to_string(),
                stock: track.stock,
                active: track.active,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Balances are printed in whole units, falling back to the raw amount
    /// when it cannot be scaled.
    pub fn write_instruments(&mut self, instruments: &[PaymentInstrument]) -> Result<()> {
        for instrument in instruments {
            let balance = instrument
                .balance
                .to_units(instrument.decimals)
                .map(|units| units.to_string())
                .unwrap_or_else(|| instrument.balance.to_string());
            self.writer.serialize(InstrumentRecord {
                address: instrument.address.as_str(),
                symbol: &instrument.symbol,
                decimals: instrument.decimals,
                balance,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_purchase(
        &mut self,
        state: &PurchaseState,
        settled: Option<&TransactionStatus>,
    ) -> Result<()> {
        self.writer.serialize(PurchaseRecord {
            status: state.status.to_string(),
            track: state.track.as_ref().map(|track| track.id),
            token: state
                .instrument
                .as_ref()
                .map(|instrument| instrument.address.to_string()),
            operation: state.operation_id.as_ref().map(|id| id.to_string()),
            confirmed: settled.map(|status| status.status.to_string()),
            reward: settled.and_then(|status| status.reward_earned),
            error: state.error.as_ref().map(|error| error.to_string()),
        })?;
        self.writer.flush()?;
        Ok(())
    }
}
