use crate::config::WatcherConfig;
use crate::domain::ports::LedgerClientRef;
use crate::domain::transaction::{OperationId, TransactionStatus, WatchMeta};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, oneshot};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Invoked once with the terminal status of a watched operation.
pub type StatusCallback = Arc<dyn Fn(&TransactionStatus) + Send + Sync>;

struct Entry {
    status: TransactionStatus,
    generation: u64,
}

/// Polls the ledger for receipts of submitted operations.
///
/// Each watched operation gets its own polling task. The watcher never
/// returns errors: a transient polling failure counts as "no receipt yet",
/// and an operation that is still unconfirmed after the attempt ceiling is
/// reported as failed with `timed_out` set.
///
/// Registering an operation id that is already watched replaces the earlier
/// registration. The superseded poller stops without notifying.
#[derive(Clone)]
pub struct TransactionWatcher {
    ledger: LedgerClientRef,
    config: WatcherConfig,
    entries: Arc<RwLock<HashMap<OperationId, Entry>>>,
    generations: Arc<AtomicU64>,
}

impl TransactionWatcher {
    pub fn new(ledger: LedgerClientRef, config: WatcherConfig) -> Self {
        Self {
            ledger,
            config,
            entries: Arc::new(RwLock::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Starts watching `id` and returns immediately.
    ///
    /// `callback` runs exactly once, when the operation confirms, fails or
    /// times out, unless the watch is stopped or replaced first.
    pub async fn watch(&self, id: OperationId, meta: WatchMeta, callback: StatusCallback) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            status: TransactionStatus::pending(id.clone(), meta),
            generation,
        };
        if self.entries.write().await.insert(id.clone(), entry).is_some() {
            warn!(operation = %id, "replacing existing watch registration");
        }
        debug!(operation = %id, "watching operation");

        let watcher = self.clone();
        tokio::spawn(async move { watcher.poll(id, generation, callback).await });
    }

    /// Watches `id` and waits for its terminal status.
    ///
    /// Returns `None` if the watch was stopped or replaced before it settled.
    pub async fn wait(&self, id: OperationId, meta: WatchMeta) -> Option<TransactionStatus> {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let callback: StatusCallback = Arc::new(move |status: &TransactionStatus| {
            if let Some(tx) = slot.lock().ok().and_then(|mut slot| slot.take()) {
                let _ = tx.send(status.clone());
            }
        });
        self.watch(id, meta, callback).await;
        rx.await.ok()
    }

    /// Stops watching `id`. Any pending notification for it is discarded.
    pub async fn stop_watching(&self, id: &OperationId) -> bool {
        self.entries.write().await.remove(id).is_some()
    }

    pub async fn status(&self, id: &OperationId) -> Option<TransactionStatus> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|entry| entry.status.clone())
    }

    pub async fn statuses(&self) -> Vec<TransactionStatus> {
        self.entries
            .read()
            .await
            .values()
            .map(|entry| entry.status.clone())
            .collect()
    }

    async fn poll(self, id: OperationId, generation: u64, callback: StatusCallback) {
        let mut attempts = 0;
        let terminal = loop {
            sleep(self.config.poll_interval).await;
            attempts += 1;

            let receipt = match self.ledger.get_transaction_receipt(&id).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    warn!(operation = %id, attempt = attempts, error = %e, "receipt poll failed");
                    None
                }
            };

            let mut entries = self.entries.write().await;
            let Some(entry) = entries
                .get_mut(&id)
                .filter(|entry| entry.generation == generation)
            else {
                debug!(operation = %id, "watch stopped or replaced");
                return;
            };
            entry.status.attempts = attempts;

            match receipt {
                Some(receipt) => {
                    entry.status.resolve(&receipt);
                    break entry.status.clone();
                }
                None if attempts >= self.config.max_attempts => {
                    entry.status.time_out();
                    break entry.status.clone();
                }
                None => debug!(operation = %id, attempt = attempts, "no receipt yet"),
            }
        };

        info!(
            operation = %id,
            status = %terminal.status,
            timed_out = terminal.timed_out,
            attempts,
            "operation settled"
        );
        callback(&terminal);

        sleep(self.config.grace_period).await;
        let mut entries = self.entries.write().await;
        if entries
            .get(&id)
            .is_some_and(|entry| entry.generation == generation)
        {
            entries.remove(&id);
        }
    }
}
