//! Refresh coordinator - admits requests, runs fetch cycles, publishes snapshots
//!
//! A single worker task owns all refresh state. Triggers from any number of
//! [`CoordinatorHandle`]s, store notifications, retry timers and finished
//! fetch cycles all arrive as messages on that task, so state changes never
//! race. Each admitted refresh runs in its own spawned task, which joins the
//! balance and CDP enrichments before merging.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use balance_core::{
    merge, CoreResult, RefreshConfig, RefreshError, RefreshResult, RefreshSnapshot, WalletSet,
};

use crate::scheduler::{Decision, PendingRetry, RefreshScheduler};
use crate::state::RefreshStatus;
use crate::traits::{BalanceProvider, CdpProvider, WalletChange, WalletStore};

/// Why a refresh was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    Timer,
    WalletsChanged(WalletChange),
    /// Store notifications were dropped before we read them
    StoreLagged,
    /// A deferred retry or the progressive follow-up came due
    Retry,
}

/// Notifications for presentation
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    Started {
        cycle: u64,
        trigger: Trigger,
    },
    Published {
        snapshot: Arc<RefreshSnapshot>,
        /// Number of wallets differs from the previous snapshot
        count_changed: bool,
    },
    Aborted {
        cycle: u64,
        error: RefreshError,
    },
}

/// Cheap, cloneable access to a running coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    triggers: mpsc::Sender<Trigger>,
    snapshots: watch::Receiver<Arc<RefreshSnapshot>>,
    status: watch::Receiver<RefreshStatus>,
    events: broadcast::Sender<RefreshEvent>,
}

impl CoordinatorHandle {
    /// Ask for a refresh. Safe to call any number of times; redundant requests
    /// are coalesced.
    pub fn request_refresh(&self, trigger: Trigger) -> RefreshResult<()> {
        match self.triggers.try_send(trigger) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(trigger)) => {
                debug!("Trigger queue full, coalescing {:?}", trigger);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RefreshError::Stopped),
        }
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<RefreshSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Arc<RefreshSnapshot>> {
        self.snapshots.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RefreshEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> RefreshStatus {
        self.status.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.status.borrow().loading
    }
}

/// Owner of the refresh worker. Dropping it stops the worker.
pub struct RefreshCoordinator {
    handle: CoordinatorHandle,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RefreshCoordinator {
    /// Start the worker on the current tokio runtime
    pub fn spawn(
        config: RefreshConfig,
        store: Arc<dyn WalletStore>,
        balances: Arc<dyn BalanceProvider>,
        cdps: Arc<dyn CdpProvider>,
    ) -> CoreResult<Self> {
        config.validate()?;

        let (trigger_tx, trigger_rx) = mpsc::channel(config.trigger_capacity);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(RefreshSnapshot::default()));
        let (status_tx, status_rx) = watch::channel(RefreshStatus::default());
        let (events_tx, _) = broadcast::channel(config.event_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        // Subscribe before returning so no change made after spawn() is missed
        let changes = store.subscribe();

        let worker = Worker {
            scheduler: RefreshScheduler::from_config(&config),
            config,
            store,
            balances,
            cdps,
            first_load_completed: false,
            cycle: 0,
            cycles_published: 0,
            cycles_aborted: 0,
            last_completed_at: None,
            retry_timer: None,
            in_flight: None,
            internal_tx,
            snapshots: snapshot_tx,
            status: status_tx,
            events: events_tx.clone(),
        };

        let task = tokio::spawn(worker.run(trigger_rx, internal_rx, Some(changes), shutdown_rx));
        info!("Refresh coordinator started");

        Ok(Self {
            handle: CoordinatorHandle {
                triggers: trigger_tx,
                snapshots: snapshot_rx,
                status: status_rx,
                events: events_tx,
            },
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    pub fn request_refresh(&self, trigger: Trigger) -> RefreshResult<()> {
        self.handle.request_refresh(trigger)
    }

    /// Stop the worker, abandoning any in-flight cycle and pending retry
    pub async fn stop(&mut self) {
        info!("Stopping refresh coordinator");

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Refresh worker ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }
}

enum Internal {
    RetryDue(u64),
    CycleFinished {
        cycle: u64,
        progressive: bool,
        outcome: CycleOutcome,
    },
}

enum CycleOutcome {
    Ready(RefreshSnapshot),
    /// Wallets disappeared between the count check and the load
    Emptied,
    Failed(RefreshError),
}

/// One fetch cycle: load candidates, enrich concurrently, merge, aggregate
struct FetchCycle {
    cycle: u64,
    progressive: bool,
    aggregate_title: String,
    store: Arc<dyn WalletStore>,
    balances: Arc<dyn BalanceProvider>,
    cdps: Arc<dyn CdpProvider>,
}

impl FetchCycle {
    fn load_candidates(&self) -> WalletSet {
        if self.progressive {
            if let Some(primary) = self.store.load_primary() {
                return vec![primary];
            }
        }
        self.store.load_all()
    }

    async fn run(self) -> CycleOutcome {
        let candidates = self.load_candidates();
        if candidates.is_empty() {
            return CycleOutcome::Emptied;
        }

        debug!("Cycle {} enriching {} wallets", self.cycle, candidates.len());

        // Both enrichments must land before anything is merged
        let (balances, cdps) = tokio::join!(
            self.balances.enrich(candidates.clone()),
            self.cdps.enrich(candidates.clone()),
        );

        match merge(&candidates, balances, cdps) {
            Ok(wallets) => CycleOutcome::Ready(RefreshSnapshot::assemble(
                self.cycle,
                wallets,
                &self.aggregate_title,
            )),
            Err(e) => CycleOutcome::Failed(e.into()),
        }
    }
}

struct Worker {
    config: RefreshConfig,
    store: Arc<dyn WalletStore>,
    balances: Arc<dyn BalanceProvider>,
    cdps: Arc<dyn CdpProvider>,
    scheduler: RefreshScheduler,
    first_load_completed: bool,
    cycle: u64,
    cycles_published: u64,
    cycles_aborted: u64,
    last_completed_at: Option<DateTime<Utc>>,
    retry_timer: Option<JoinHandle<()>>,
    in_flight: Option<JoinHandle<()>>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    snapshots: watch::Sender<Arc<RefreshSnapshot>>,
    status: watch::Sender<RefreshStatus>,
    events: broadcast::Sender<RefreshEvent>,
}

async fn next_change(
    changes: &mut Option<broadcast::Receiver<WalletChange>>,
) -> Result<WalletChange, broadcast::error::RecvError> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl Worker {
    async fn run(
        mut self,
        mut triggers: mpsc::Receiver<Trigger>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
        mut changes: Option<broadcast::Receiver<WalletChange>>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    debug!("Refresh worker shutdown requested");
                    break;
                }
                Some(message) = internal.recv() => self.handle_internal(message),
                Some(trigger) = triggers.recv() => self.handle_request(trigger),
                change = next_change(&mut changes) => match change {
                    Ok(change) => self.handle_request(Trigger::WalletsChanged(change)),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Missed {} wallet change notifications", missed);
                        self.handle_request(Trigger::StoreLagged);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Wallet store stopped sending changes");
                        changes = None;
                    }
                },
            }
        }

        self.shut_down();
    }

    fn handle_request(&mut self, trigger: Trigger) {
        let wallet_count = self.store.count();

        match self.scheduler.request(Instant::now(), wallet_count) {
            Decision::ProceedNow => self.start_cycle(trigger, wallet_count),
            Decision::DeferUntil(retry) => {
                debug!(
                    "Refresh {:?} deferred for {:?}",
                    trigger,
                    retry.due.saturating_duration_since(Instant::now())
                );
                self.arm_retry(retry);
            }
            Decision::Dropped => debug!("Refresh {:?} dropped, coordinator closing", trigger),
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::RetryDue(id) => {
                if self.scheduler.fire(id) {
                    self.retry_timer = None;
                    self.handle_request(Trigger::Retry);
                } else {
                    debug!("Ignoring superseded retry {}", id);
                }
            }
            Internal::CycleFinished {
                cycle,
                progressive,
                outcome,
            } => self.finish_cycle(cycle, progressive, outcome),
        }
    }

    fn start_cycle(&mut self, trigger: Trigger, wallet_count: usize) {
        self.cancel_retry_timer();
        self.cycle += 1;
        let cycle = self.cycle;

        self.update_status();
        let _ = self.events.send(RefreshEvent::Started { cycle, trigger });

        if wallet_count == 0 {
            debug!("No wallets stored, publishing empty snapshot");
            self.publish(RefreshSnapshot::empty(cycle));
            return;
        }

        let progressive = self.config.progressive_loading && !self.first_load_completed;
        info!(
            "Refresh cycle {} started by {:?} ({})",
            cycle,
            trigger,
            if progressive { "primary wallet" } else { "all wallets" }
        );

        let fetch = FetchCycle {
            cycle,
            progressive,
            aggregate_title: self.config.aggregate_title.clone(),
            store: Arc::clone(&self.store),
            balances: Arc::clone(&self.balances),
            cdps: Arc::clone(&self.cdps),
        };
        let done_tx = self.internal_tx.clone();

        self.in_flight = Some(tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(fetch.run()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => CycleOutcome::Failed(RefreshError::ProviderPanicked),
            };
            let _ = done_tx.send(Internal::CycleFinished {
                cycle,
                progressive,
                outcome,
            });
        }));
    }

    fn finish_cycle(&mut self, cycle: u64, progressive: bool, outcome: CycleOutcome) {
        self.in_flight = None;

        match outcome {
            CycleOutcome::Ready(snapshot) => {
                let loaded = snapshot.wallet_count();
                self.first_load_completed = true;
                let (snapshot, count_changed) = self.install(snapshot);

                if progressive {
                    let stored = self.store.count();
                    if stored > loaded {
                        let delay = self.config.progressive_delay();
                        if let Some(retry) = self.scheduler.schedule_follow_up(Instant::now(), delay) {
                            info!("Loaded primary wallet, loading {} more in {:?}", stored - loaded, delay);
                            self.arm_retry(retry);
                        }
                    }
                }

                let _ = self.events.send(RefreshEvent::Published {
                    snapshot,
                    count_changed,
                });
            }
            CycleOutcome::Emptied => {
                debug!("Wallets vanished before cycle {} loaded them", cycle);
                self.publish(RefreshSnapshot::empty(cycle));
            }
            CycleOutcome::Failed(error) => {
                error!("Refresh cycle {} aborted: {}", cycle, error);
                self.cycles_aborted += 1;
                self.complete();
                let _ = self.events.send(RefreshEvent::Aborted { cycle, error });
            }
        }
    }

    fn publish(&mut self, snapshot: RefreshSnapshot) {
        let (snapshot, count_changed) = self.install(snapshot);
        let _ = self.events.send(RefreshEvent::Published {
            snapshot,
            count_changed,
        });
    }

    /// Swap in a new snapshot and leave the loading state
    fn install(&mut self, snapshot: RefreshSnapshot) -> (Arc<RefreshSnapshot>, bool) {
        let snapshot = Arc::new(snapshot);
        let previous = self.snapshots.send_replace(Arc::clone(&snapshot));
        let count_changed = previous.wallet_count() != snapshot.wallet_count();

        self.cycles_published += 1;
        info!(
            "Published cycle {}: {} wallets{}",
            snapshot.cycle,
            snapshot.wallet_count(),
            if snapshot.aggregated.is_some() { " + aggregate" } else { "" }
        );

        self.complete();
        (snapshot, count_changed)
    }

    fn complete(&mut self) {
        self.scheduler.mark_completed(Instant::now());
        self.last_completed_at = Some(Utc::now());
        self.update_status();
    }

    fn arm_retry(&mut self, retry: PendingRetry) {
        self.cancel_retry_timer();

        let retry_tx = self.internal_tx.clone();
        self.retry_timer = Some(tokio::spawn(async move {
            sleep_until(retry.due).await;
            let _ = retry_tx.send(Internal::RetryDue(retry.id));
        }));
        self.update_status();
    }

    fn cancel_retry_timer(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }

    fn update_status(&self) {
        self.status.send_replace(RefreshStatus {
            loading: self.scheduler.is_loading(),
            first_load_completed: self.first_load_completed,
            last_completed_at: self.last_completed_at,
            retry_pending: self.scheduler.pending().is_some(),
            cycles_published: self.cycles_published,
            cycles_aborted: self.cycles_aborted,
        });
    }

    fn shut_down(&mut self) {
        self.scheduler.close();
        self.cancel_retry_timer();
        if let Some(cycle) = self.in_flight.take() {
            cycle.abort();
            self.scheduler.mark_completed(Instant::now());
        }
        self.update_status();
        info!("Refresh worker stopped after {} cycles", self.cycle);
    }
}
