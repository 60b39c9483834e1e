use super::events::{notice_for, BoardEvent};
use super::freshness::{decide_freshness, BoardState, DecideFreshnessParams};
use super::policy::{backoff_delay, AppPhase, PollPhase, DEFAULT_MAX_BACKOFF, DEFAULT_POLL_INTERVAL};
use super::BoardFetcher;
use crate::redact::redact_secrets;
use crate::types::{Message, UserRecord};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTrigger {
    Timer,
    Foreground,
    Push,
    Manual,
}

impl PollTrigger {
    /// Out-of-band triggers fetch even while another fetch is running or the
    /// poller is backing off.
    fn is_gated(self) -> bool {
        matches!(self, Self::Timer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub team_id: String,
    pub interval: Duration,
    pub max_backoff: Duration,
    pub notify_new_messages: bool,
}

impl PollerConfig {
    pub fn new(team_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            interval: DEFAULT_POLL_INTERVAL,
            max_backoff: DEFAULT_MAX_BACKOFF,
            notify_new_messages: true,
        }
    }

    /// Management posts the messages, so it is not notified about them.
    pub fn for_user(user: &UserRecord, team_id: Option<&str>, interval: Duration) -> Self {
        let team_id = team_id
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&user.team_id);
        Self {
            interval: interval.max(Duration::from_secs(1)),
            notify_new_messages: !user.role().is_management(),
            ..Self::new(team_id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Updated { new_messages: usize },
    Unchanged,
    Stale,
    Skipped,
    Failed(String),
}

#[derive(Debug, Default)]
struct RuntimeState {
    in_flight: usize,
    consecutive_failures: u32,
    backoff_until: Option<Instant>,
    next_seq: u64,
}

struct PollerShared<F> {
    fetcher: F,
    config: PollerConfig,
    board: Mutex<BoardState>,
    runtime: Mutex<RuntimeState>,
    events: broadcast::Sender<BoardEvent>,
}

impl<F> PollerShared<F> {
    fn runtime(&self) -> std::sync::MutexGuard<'_, RuntimeState> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn board(&self) -> std::sync::MutexGuard<'_, BoardState> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fetch that passed the gate. Dropping it, including by task abort,
/// releases the in-flight slot.
pub(crate) struct FetchTicket<F> {
    shared: Arc<PollerShared<F>>,
    seq: u64,
    trigger: PollTrigger,
    started: Instant,
}

impl<F> Drop for FetchTicket<F> {
    fn drop(&mut self) {
        let mut runtime = self.shared.runtime();
        runtime.in_flight = runtime.in_flight.saturating_sub(1);
    }
}

/// Board synchroniser for one team. Clones share state.
pub struct FreshnessPoller<F> {
    shared: Arc<PollerShared<F>>,
}

impl<F> Clone for FreshnessPoller<F> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<F: BoardFetcher> FreshnessPoller<F> {
    pub fn new(fetcher: F, config: PollerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(PollerShared {
                fetcher,
                config,
                board: Mutex::new(BoardState::default()),
                runtime: Mutex::new(RuntimeState::default()),
                events,
            }),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.shared.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.shared.events.subscribe()
    }

    /// Most-recent-first.
    pub fn presented(&self) -> Vec<Message> {
        self.shared.board().presented.clone()
    }

    pub fn last_seen_timestamp(&self) -> Option<String> {
        self.shared.board().last_seen_timestamp.clone()
    }

    pub fn phase(&self) -> PollPhase {
        let runtime = self.shared.runtime();
        if runtime.in_flight > 0 {
            PollPhase::Fetching
        } else if runtime.backoff_until.is_some_and(|until| until > Instant::now()) {
            PollPhase::Backoff
        } else {
            PollPhase::Idle
        }
    }

    pub(crate) fn begin(&self, trigger: PollTrigger) -> Option<FetchTicket<F>> {
        let mut runtime = self.shared.runtime();
        if trigger.is_gated() {
            if runtime.in_flight > 0 {
                return None;
            }
            if runtime.backoff_until.is_some_and(|until| until > Instant::now()) {
                return None;
            }
        }
        runtime.in_flight += 1;
        runtime.next_seq += 1;
        Some(FetchTicket {
            shared: self.shared.clone(),
            seq: runtime.next_seq,
            trigger,
            started: Instant::now(),
        })
    }

    /// Runs one poll now. Never fails: errors are logged and reported in the
    /// outcome.
    pub async fn poll(&self, trigger: PollTrigger) -> PollOutcome {
        match self.begin(trigger) {
            Some(ticket) => self.run(ticket).await,
            None => {
                tracing::trace!(?trigger, "poll skipped");
                PollOutcome::Skipped
            }
        }
    }

    async fn run(&self, ticket: FetchTicket<F>) -> PollOutcome {
        let team_id = &self.shared.config.team_id;
        match self.shared.fetcher.fetch_board(team_id).await {
            Ok(board) => {
                self.record_success();
                self.apply(&board.messages, ticket.seq)
            }
            Err(e) => {
                let message = redact_secrets(&e.to_string()).into_owned();
                let failures = self.record_failure(ticket.started);
                tracing::warn!(
                    team_id = %team_id,
                    trigger = ?ticket.trigger,
                    failures,
                    error = %message,
                    "board poll failed"
                );
                PollOutcome::Failed(message)
            }
        }
    }

    fn record_success(&self) {
        let mut runtime = self.shared.runtime();
        runtime.consecutive_failures = 0;
        runtime.backoff_until = None;
    }

    fn record_failure(&self, started: Instant) -> u32 {
        let mut runtime = self.shared.runtime();
        runtime.consecutive_failures = runtime.consecutive_failures.saturating_add(1);
        let delay = backoff_delay(
            self.shared.config.interval,
            self.shared.config.max_backoff,
            runtime.consecutive_failures,
        );
        runtime.backoff_until = (!delay.is_zero()).then(|| started + delay);
        runtime.consecutive_failures
    }

    fn apply(&self, snapshot: &[Message], seq: u64) -> PollOutcome {
        let config = &self.shared.config;
        let (decision, presented) = {
            let mut board = self.shared.board();
            let decision = decide_freshness(DecideFreshnessParams {
                state: &board,
                snapshot,
                seq,
                notify: config.notify_new_messages,
            });
            board.commit(snapshot, seq, &decision);
            let presented = decision.list_changed.then(|| board.presented.clone());
            (decision, presented)
        };

        if decision.stale {
            tracing::debug!(team_id = %config.team_id, seq, "discarded stale board snapshot");
            return PollOutcome::Stale;
        }
        if decision.is_noop() {
            return PollOutcome::Unchanged;
        }

        // send only fails when nobody is subscribed
        if let Some(messages) = presented {
            let _ = self.shared.events.send(BoardEvent::Updated {
                team_id: config.team_id.clone(),
                messages,
            });
        }
        for message in &decision.new_messages {
            tracing::info!(
                team_id = %config.team_id,
                kind = message.message_type.label(),
                "new message on board"
            );
            let _ = self.shared.events.send(BoardEvent::NewMessage {
                team_id: config.team_id.clone(),
                message: message.clone(),
                notice: notice_for(message),
            });
        }

        PollOutcome::Updated {
            new_messages: decision.new_messages.len(),
        }
    }

    /// Spawns the owned poll task: an immediate first poll, then one timer
    /// tick per interval until the handle is stopped or dropped.
    pub fn start(&self) -> PollerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_poll_loop(self.clone(), rx));
        tracing::debug!(team_id = %self.shared.config.team_id, "poller started");
        PollerHandle {
            tx,
            task: Some(task),
        }
    }
}

enum Command {
    Poll {
        trigger: PollTrigger,
        respond_to: Option<oneshot::Sender<PollOutcome>>,
    },
    AppPhase(AppPhase),
    Stop,
}

fn spawn_poll<F: BoardFetcher>(
    fetches: &mut JoinSet<()>,
    poller: &FreshnessPoller<F>,
    trigger: PollTrigger,
    respond_to: Option<oneshot::Sender<PollOutcome>>,
) {
    let Some(ticket) = poller.begin(trigger) else {
        if let Some(tx) = respond_to {
            let _ = tx.send(PollOutcome::Skipped);
        }
        return;
    };
    let poller = poller.clone();
    fetches.spawn(async move {
        let outcome = poller.run(ticket).await;
        if let Some(tx) = respond_to {
            let _ = tx.send(outcome);
        }
    });
}

async fn run_poll_loop<F: BoardFetcher>(
    poller: FreshnessPoller<F>,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let interval = poller.shared.config.interval;
    let mut fetches = JoinSet::new();
    let mut next_tick = Instant::now();
    let mut app_phase = AppPhase::Active;

    loop {
        tokio::select! {
          cmd = rx.recv() => match cmd {
            None | Some(Command::Stop) => break,
            Some(Command::Poll { trigger, respond_to }) => {
              spawn_poll(&mut fetches, &poller, trigger, respond_to);
            }
            Some(Command::AppPhase(next)) => {
              if AppPhase::is_foreground_transition(app_phase, next) {
                spawn_poll(&mut fetches, &poller, PollTrigger::Foreground, None);
              }
              app_phase = next;
            }
          },
          _ = tokio::time::sleep_until(next_tick) => {
            next_tick = Instant::now() + interval;
            spawn_poll(&mut fetches, &poller, PollTrigger::Timer, None);
          }
          Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
            if let Err(e) = joined {
              if e.is_panic() {
                tracing::error!(error = %e, "board poll task panicked");
              }
            }
          }
        }
    }

    fetches.shutdown().await;
    tracing::debug!(team_id = %poller.shared.config.team_id, "poller stopped");
}

/// Owns the running poll task. Dropping the handle aborts the task and any
/// fetch it has in flight.
pub struct PollerHandle {
    tx: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Returns false once the poller has stopped.
    pub fn trigger(&self, trigger: PollTrigger) -> bool {
        self.tx
            .send(Command::Poll {
                trigger,
                respond_to: None,
            })
            .is_ok()
    }

    pub fn push_received(&self) -> bool {
        self.trigger(PollTrigger::Push)
    }

    pub fn app_state_changed(&self, phase: AppPhase) -> bool {
        self.tx.send(Command::AppPhase(phase)).is_ok()
    }

    pub async fn poll_now(&self) -> PollOutcome {
        let (tx, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Poll {
                trigger: PollTrigger::Manual,
                respond_to: Some(tx),
            })
            .is_err()
        {
            return PollOutcome::Failed("poller is not running".to_string());
        }
        rx.await
            .unwrap_or_else(|_| PollOutcome::Failed("poll was cancelled".to_string()))
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the timer and waits for the task to wind down. No fetch starts
    /// after this returns.
    pub async fn stop(mut self) {
        let _ = self.tx.send(Command::Stop);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
