use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use mutual_vend::application::coordinator::PurchaseCoordinator;
use mutual_vend::application::session::Session;
use mutual_vend::application::watcher::{StatusCallback, TransactionWatcher};
use mutual_vend::config::WatcherConfig;
use mutual_vend::domain::ports::LedgerClientRef;
use mutual_vend::domain::purchase::PurchaseStatus;
use mutual_vend::domain::token::Address;
use mutual_vend::domain::transaction::TransactionStatus;
use mutual_vend::interfaces::csv::report_writer::ReportWriter;
use mutual_vend::interfaces::fixture::LedgerFixture;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ledger fixture (JSON) with tracks, tokens and balances
    fixture: PathBuf,

    /// Account to connect as
    #[arg(long, value_parser = Address::parse)]
    account: Option<Address>,

    /// Delay between receipt polls
    #[arg(long, default_value_t = 2_000)]
    poll_interval_ms: u64,

    /// Receipt polls before an operation is reported as timed out
    #[arg(long, default_value_t = WatcherConfig::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// How long a settled operation stays queryable
    #[arg(long, default_value_t = 30_000)]
    grace_period_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the vending tracks
    Tracks,
    /// List the accepted payment tokens with the account's balances
    Tokens,
    /// Buy one item from a track
    Purchase {
        #[arg(long)]
        track: u64,
        #[arg(long, value_parser = Address::parse)]
        token: Address,
    },
}

impl Cli {
    fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_attempts,
            grace_period: Duration::from_millis(self.grace_period_ms),
        }
    }

    fn account(&self) -> Result<Address> {
        self.account
            .clone()
            .ok_or_else(|| miette!("--account is required for this command"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let fixture = LedgerFixture::from_path(&cli.fixture).into_diagnostic()?;
    let vending_contract = fixture.vending_contract.clone();
    let ledger: LedgerClientRef = Arc::new(fixture.into_ledger());
    let session = Arc::new(Session::new(ledger.clone(), vending_contract));

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());

    match &cli.command {
        Command::Tracks => {
            session.refresh_tracks().await.into_diagnostic()?;
            writer
                .write_tracks(&session.tracks().await)
                .into_diagnostic()?;
        }
        Command::Tokens => {
            session.connect(cli.account()?).await.into_diagnostic()?;
            writer
                .write_instruments(&session.instruments().await)
                .into_diagnostic()?;
        }
        Command::Purchase { track, token } => {
            session.connect(cli.account()?).await.into_diagnostic()?;
            let track = session.track(*track).await.into_diagnostic()?;

            let watcher = TransactionWatcher::new(ledger, cli.watcher_config());
            let mut coordinator = PurchaseCoordinator::new(session.clone(), watcher);

            let (tx, rx) = oneshot::channel::<TransactionStatus>();
            let slot = Mutex::new(Some(tx));
            let listener: StatusCallback = Arc::new(move |status: &TransactionStatus| {
                if let Some(tx) = slot.lock().ok().and_then(|mut slot| slot.take()) {
                    let _ = tx.send(status.clone());
                }
            });
            coordinator.on_settled(listener);

            let state = coordinator
                .purchase(&track, token)
                .await
                .into_diagnostic()?
                .clone();
            let settled = match state.status {
                PurchaseStatus::Success => rx.await.ok(),
                _ => None,
            };
            writer
                .write_purchase(&state, settled.as_ref())
                .into_diagnostic()?;

            if let Some(error) = &state.error {
                return Err(miette!("purchase failed: {error}"));
            }
            match settled {
                Some(status) if status.is_confirmed() => {}
                Some(status) if status.timed_out => {
                    return Err(miette!(
                        "purchase {} was not confirmed after {} polls",
                        status.operation_id,
                        status.attempts
                    ));
                }
                Some(status) => {
                    return Err(miette!("purchase {} failed on the ledger", status.operation_id));
                }
                None => return Err(miette!("purchase was submitted but never settled")),
            }
        }
    }

    Ok(())
}
