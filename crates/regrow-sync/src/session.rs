//! Game session - the single actor that owns a user's progress.
//!
//! One tokio task owns the [`ProgressEngine`] and the [`SyncCoordinator`]
//! and handles commands one at a time from a mailbox. User intents, identity
//! changes, finished fetches and due saves all arrive through that mailbox,
//! so state is only ever mutated in issue order by a single owner.
//!
//! Fetches run in spawned tasks that report back through the mailbox.
//! Saves are handed to a dedicated saver task that performs them strictly
//! in order. Readers never wait on either: the latest settled state is
//! published on a `watch` channel after every command.

use std::sync::Arc;

use regrow_progress::{
    Action, CycleCompleted, ProgressEngine, ProgressEvent, ProgressState,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::cache::LocalCache;
use crate::config::SyncConfig;
use crate::coordinator::{IdentityTransition, LoadDecision, LoadOutcome, SyncCoordinator, SyncMode};
use crate::error::ActionError;
use crate::identity::{ActionGate, Identity, UserKey};
use crate::schedule::{Debounce, Scheduler};
use crate::store::RemoteProgressStore;

/// Everything the presentation layer needs to render, published after
/// every command.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Settled progress state.
    pub state: ProgressState,
    /// Identity the session is acting for.
    pub identity: Identity,
    /// Coordinator mode.
    pub mode: SyncMode,
    /// Completion notice waiting to be dismissed.
    pub completion: Option<CycleCompleted>,
}

impl Snapshot {
    /// Whether the remote fetch for the current user is outstanding.
    pub fn is_loading(&self) -> bool {
        matches!(self.mode, SyncMode::Loading { .. })
    }

    /// Whether action intents should be forwarded.
    pub fn gate(&self) -> ActionGate {
        self.identity.gate()
    }
}

enum Command {
    Act {
        action: Action,
        reply: oneshot::Sender<Result<ProgressState, ActionError>>,
    },
    Reset {
        reply: oneshot::Sender<ProgressState>,
    },
    AddCurrency {
        amount: i64,
        reply: oneshot::Sender<ProgressState>,
    },
    SetIdentity {
        identity: Identity,
        reply: oneshot::Sender<()>,
    },
    DismissCompletion {
        reply: oneshot::Sender<()>,
    },
    LoadFinished {
        generation: u64,
        outcome: LoadOutcome,
    },
    SaveDue {
        ticket: u64,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct SaveJob {
    user: UserKey,
    state: ProgressState,
}

/// Spawns the session actor.
pub struct GameSession;

impl GameSession {
    /// Start a session with no identity yet.
    ///
    /// The engine shows the guest default until an identity arrives; an
    /// `Unknown` identity changes nothing.
    pub fn spawn(
        store: Arc<dyn RemoteProgressStore>,
        cache: Arc<dyn LocalCache>,
        config: SyncConfig,
    ) -> GameHandle {
        let (tx, rx) = mpsc::channel(config.mailbox_capacity);
        let (events, _) = broadcast::channel(config.event_capacity);
        let engine = ProgressEngine::new(ProgressState::guest(), config.engine);
        let coordinator = SyncCoordinator::new();

        let initial = Snapshot {
            state: engine.state().clone(),
            identity: coordinator.identity().clone(),
            mode: coordinator.mode(),
            completion: None,
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let (saver_tx, saver_rx) = mpsc::unbounded_channel();
        let saver = tokio::spawn(run_saver(Arc::clone(&store), saver_rx));

        let actor = SessionActor {
            engine,
            coordinator,
            store,
            cache,
            scheduler: Scheduler::new(&tx),
            mailbox: tx.downgrade(),
            debounce: Debounce::new(),
            save_delay: config.save_delay,
            saver_tx,
            saver,
            snapshot: snapshot_tx,
            events: events.clone(),
        };
        tokio::spawn(actor.run(rx));

        GameHandle {
            tx,
            snapshot: snapshot_rx,
            events,
        }
    }
}

/// Cloneable handle used by the presentation layer.
#[derive(Clone)]
pub struct GameHandle {
    tx: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Snapshot>,
    events: broadcast::Sender<ProgressEvent>,
}

impl GameHandle {
    /// Latest settled state.
    pub fn state(&self) -> ProgressState {
        self.snapshot.borrow().state.clone()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Whether the remote fetch for the current user is outstanding.
    pub fn is_loading(&self) -> bool {
        self.snapshot.borrow().is_loading()
    }

    /// The completion notice, if one is showing.
    pub fn completion_notice(&self) -> Option<CycleCompleted> {
        self.snapshot.borrow().completion
    }

    /// Whether action intents should be forwarded for the current identity.
    pub fn gate(&self) -> ActionGate {
        self.snapshot.borrow().gate()
    }

    /// Receiver that is notified whenever a new snapshot is published.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Receiver of engine events (state changes, level-ups, completions).
    pub fn events(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Wait until no fetch is outstanding.
    pub async fn loaded(&self) -> Result<Snapshot, ActionError> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|s| !s.is_loading())
            .await
            .map_err(|_| ActionError::SessionClosed)?;
        Ok(snapshot.clone())
    }

    /// Apply a new identity signal. Returns once the session has acted on it.
    pub async fn set_identity(&self, identity: Identity) -> Result<(), ActionError> {
        self.request(|reply| Command::SetIdentity { identity, reply })
            .await
    }

    /// Perform `action` for the current user.
    pub async fn apply(&self, action: Action) -> Result<ProgressState, ActionError> {
        self.request(|reply| Command::Act { action, reply }).await?
    }

    /// Water the tree.
    pub async fn water(&self) -> Result<ProgressState, ActionError> {
        self.apply(Action::Water).await
    }

    /// Fertilize the tree.
    pub async fn fertilize(&self) -> Result<ProgressState, ActionError> {
        self.apply(Action::Fertilize).await
    }

    /// Replace progress with the restart state.
    pub async fn reset(&self) -> Result<ProgressState, ActionError> {
        self.request(|reply| Command::Reset { reply }).await
    }

    /// Adjust the balance (e.g. to credit a reward). Saturates at zero.
    pub async fn add_currency(&self, amount: i64) -> Result<ProgressState, ActionError> {
        self.request(|reply| Command::AddCurrency { amount, reply })
            .await
    }

    /// Dismiss the completion notice. No-op if none is showing.
    pub async fn dismiss_completion(&self) -> Result<(), ActionError> {
        self.request(|reply| Command::DismissCompletion { reply })
            .await
    }

    /// Stop the session, performing any pending save first.
    pub async fn shutdown(self) -> Result<(), ActionError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ActionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| ActionError::SessionClosed)?;
        rx.await.map_err(|_| ActionError::SessionClosed)
    }
}

struct SessionActor {
    engine: ProgressEngine,
    coordinator: SyncCoordinator,
    store: Arc<dyn RemoteProgressStore>,
    cache: Arc<dyn LocalCache>,
    scheduler: Scheduler<Command>,
    mailbox: mpsc::WeakSender<Command>,
    debounce: Debounce,
    save_delay: std::time::Duration,
    saver_tx: mpsc::UnboundedSender<SaveJob>,
    saver: JoinHandle<()>,
    snapshot: watch::Sender<Snapshot>,
    events: broadcast::Sender<ProgressEvent>,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let mut shutdown_reply = None;

        while let Some(command) = rx.recv().await {
            match command {
                Command::Act { action, reply } => {
                    let result = self.act(action);
                    self.settle(true);
                    let _ = reply.send(result);
                }
                Command::Reset { reply } => {
                    self.engine.reset();
                    self.settle(true);
                    let _ = reply.send(self.engine.state().clone());
                }
                Command::AddCurrency { amount, reply } => {
                    self.engine.add_currency(amount);
                    self.settle(true);
                    let _ = reply.send(self.engine.state().clone());
                }
                Command::SetIdentity { identity, reply } => {
                    self.set_identity(identity);
                    self.settle(false);
                    let _ = reply.send(());
                }
                Command::DismissCompletion { reply } => {
                    self.engine.dismiss_completion();
                    self.settle(false);
                    let _ = reply.send(());
                }
                Command::LoadFinished { generation, outcome } => {
                    self.load_finished(generation, outcome);
                    self.settle(false);
                }
                Command::SaveDue { ticket } => self.save_due(ticket),
                Command::Shutdown { reply } => {
                    shutdown_reply = Some(reply);
                    break;
                }
            }
        }

        self.finish().await;
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    fn act(&mut self, action: Action) -> Result<ProgressState, ActionError> {
        if !self.coordinator.identity().gate().is_allowed() {
            debug!(%action, identity = %self.coordinator.identity(), "Blocked action: login required");
            return Err(ActionError::LoginRequired);
        }
        self.engine.apply(action)?;
        Ok(self.engine.state().clone())
    }

    fn set_identity(&mut self, identity: Identity) {
        match self.coordinator.on_identity(identity) {
            IdentityTransition::Unchanged => {}
            IdentityTransition::Suspend => {
                self.debounce.cancel();
            }
            IdentityTransition::ShowGuest => {
                self.debounce.cancel();
                self.engine.replace(ProgressState::guest());
            }
            IdentityTransition::Load { user, generation } => {
                self.debounce.cancel();
                let initial = match self.cache.read(&user) {
                    Ok(Some(cached)) => {
                        debug!(%user, "Showing cached progress while loading");
                        cached
                    }
                    Ok(None) => ProgressState::new_account(),
                    Err(e) => {
                        warn!(%user, error = %e, "Ignoring unreadable progress cache");
                        ProgressState::new_account()
                    }
                };
                self.engine.replace(initial);
                self.start_load(user, generation);
            }
        }
    }

    fn start_load(&self, user: UserKey, generation: u64) {
        let Some(mailbox) = self.mailbox.upgrade() else {
            return;
        };
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let outcome = match store.fetch(&user).await {
                Ok(Some(record)) => LoadOutcome::Found(record),
                Ok(None) => LoadOutcome::NotFound,
                Err(e) => LoadOutcome::Failed(e.to_string()),
            };
            let _ = mailbox
                .send(Command::LoadFinished { generation, outcome })
                .await;
        });
    }

    fn load_finished(&mut self, generation: u64, outcome: LoadOutcome) {
        if let LoadDecision::Apply(state) = self.coordinator.on_load_finished(generation, outcome) {
            self.engine.replace(state);
            if let Some(user) = self.coordinator.persist_target() {
                if let Err(e) = self.cache.write(user, self.engine.state()) {
                    warn!(%user, error = %e, "Failed to mirror progress into cache");
                }
            }
        }
    }

    fn save_due(&mut self, ticket: u64) {
        if !self.debounce.take(ticket) {
            trace!(ticket, "Ignoring superseded save");
            return;
        }
        self.enqueue_save();
    }

    fn enqueue_save(&self) {
        let Some(user) = self.coordinator.persist_target().cloned() else {
            return;
        };
        let job = SaveJob {
            user,
            state: self.engine.state().clone(),
        };
        if self.saver_tx.send(job).is_err() {
            warn!("Saver stopped, dropping save");
        }
    }

    /// Publish engine events and the new snapshot.
    ///
    /// With `persist`, a state change made while `Ready` is written to the
    /// local cache and (re)arms the debounced remote save.
    fn settle(&mut self, persist: bool) {
        for event in self.engine.poll_events() {
            if persist {
                if let ProgressEvent::StateChanged(state) = &event {
                    self.persist(state);
                }
            }
            let _ = self.events.send(event);
        }

        self.snapshot.send_replace(Snapshot {
            state: self.engine.state().clone(),
            identity: self.coordinator.identity().clone(),
            mode: self.coordinator.mode(),
            completion: self.engine.completion_notice(),
        });
    }

    fn persist(&mut self, state: &ProgressState) {
        let Some(user) = self.coordinator.persist_target() else {
            return;
        };
        if let Err(e) = self.cache.write(user, state) {
            warn!(%user, error = %e, "Failed to write progress cache");
        }
        let ticket = self.debounce.reschedule(&self.scheduler, self.save_delay, |ticket| {
            Command::SaveDue { ticket }
        });
        trace!(ticket, delay = ?self.save_delay, "Scheduled save");
    }

    /// Flush a pending save and wait for the saver to drain.
    async fn finish(self) {
        let SessionActor {
            mut debounce,
            coordinator,
            engine,
            saver_tx,
            saver,
            ..
        } = self;

        if debounce.cancel() {
            if let Some(user) = coordinator.persist_target().cloned() {
                debug!(%user, "Flushing pending save");
                let _ = saver_tx.send(SaveJob {
                    user,
                    state: engine.state().clone(),
                });
            }
        }
        drop(saver_tx);
        if let Err(e) = saver.await {
            warn!(error = %e, "Saver task failed");
        }
    }
}

async fn run_saver(
    store: Arc<dyn RemoteProgressStore>,
    mut jobs: mpsc::UnboundedReceiver<SaveJob>,
) {
    while let Some(SaveJob { user, state }) = jobs.recv().await {
        match store.upsert(&user, &state).await {
            Ok(()) => debug!(
                %user,
                currency = state.currency,
                level = state.level,
                progress_pct = state.progress_pct,
                "Saved progress"
            ),
            // Dropped on purpose: the next change schedules a fresh save.
            Err(e) => warn!(%user, error = %e, "Failed to save progress"),
        }
    }
}
