use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, sleep, sleep_until},
};
use tracing::{debug, error, info, warn};

use crate::{
    config::BridgeConfig,
    detector::{Detection, detect},
    error::{BridgeError, RemoteError},
    frame::FrameExtractor,
    grid::{Grid, Side, SquareSet},
    indicator::{Debounce, IndicatorDebouncer},
    proto::IndicatorCommand,
    reconcile::{Mismatch, reconcile},
    rules::Replay,
    scheduler::{CommitScheduler, Offer},
};

/// Where LED commands end up, usually the write half of the serial port.
pub trait IndicatorSink: Send + 'static {
    fn write_command<'a>(&'a mut self, command: &'a [u8]) -> BoxFuture<'a, std::io::Result<()>>;
}

/// The remote game service.
pub trait GameClient: Send + Sync + 'static {
    fn submit_move<'a>(&'a self, game_id: &'a str, mv: &'a str)
    -> BoxFuture<'a, Result<(), RemoteError>>;

    fn claim_victory<'a>(&'a self, game_id: &'a str) -> BoxFuture<'a, Result<(), RemoteError>>;
}

/// Things the bridge reports back to whoever runs it.
#[derive(Debug)]
pub enum BridgeEvent {
    MoveCommitted {
        game_id: String,
        mv: String,
    },
    CommitFailed {
        game_id: String,
        mv: String,
        error: RemoteError,
    },
    /// The LED command could not be written. The bridge is no longer usable.
    IndicatorFailed(std::io::Error),
}

#[derive(Debug)]
struct GameSession {
    game_id: String,
    side: Side,
    moves: Vec<String>,
    last_committed: Option<String>,
}

struct SessionData {
    session: Option<GameSession>,
    physical: Option<Grid>,
    extractor: FrameExtractor,
    scheduler: CommitScheduler,
    indicator: IndicatorDebouncer,
    commit_timer: Option<JoinHandle<()>>,
    indicator_timer: Option<JoinHandle<()>>,
}

impl SessionData {
    fn cancel_candidate(&mut self) {
        if let Some(cancelled) = self.scheduler.cancel() {
            debug!(mv = %cancelled.mv, "candidate move dropped");
        }
        if let Some(timer) = self.commit_timer.take() {
            timer.abort();
        }
    }

    fn cancel_indicator(&mut self) {
        self.indicator.cancel();
        if let Some(timer) = self.indicator_timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    data: Mutex<SessionData>,
    client: Arc<dyn GameClient>,
    commands: mpsc::UnboundedSender<IndicatorCommand>,
    ready: watch::Sender<bool>,
    events: mpsc::UnboundedSender<BridgeEvent>,
    commit_gate: tokio::sync::Mutex<()>,
}

/// Ties the physical board to one remote game at a time.
///
/// Every entry point applies its whole state change under one short lock and never
/// waits while holding it. Timers, LED writes and move submission run on spawned tasks,
/// so a tokio runtime must be running.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        client: impl GameClient,
        sink: impl IndicatorSink,
    ) -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(false);

        tokio::spawn(write_indicator(sink, commands_rx, ready_rx, events_tx.clone()));

        let bridge = Self {
            inner: Arc::new(Inner {
                data: Mutex::new(SessionData {
                    session: None,
                    physical: None,
                    extractor: FrameExtractor::new(),
                    scheduler: CommitScheduler::new(config.settle_delay),
                    indicator: IndicatorDebouncer::new(config.indicator_interval),
                    commit_timer: None,
                    indicator_timer: None,
                }),
                client: Arc::new(client),
                commands: commands_tx,
                ready: ready_tx,
                events: events_tx,
                commit_gate: tokio::sync::Mutex::new(()),
            }),
        };
        // start from dark LEDs once the board shows up
        {
            let mut data = bridge.data();
            bridge.push_indicator(&mut data, SquareSet::EMPTY);
        }
        (bridge, events_rx)
    }

    fn data(&self) -> MutexGuard<'_, SessionData> {
        self.inner.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset_session(&self, game_id: impl Into<String>, side: Side) {
        let game_id = game_id.into();
        info!(%game_id, %side, "starting session");
        let mut data = self.data();
        data.cancel_candidate();
        data.cancel_indicator();
        data.session = Some(GameSession {
            game_id,
            side,
            moves: Vec::new(),
            last_committed: None,
        });
        self.reconcile(&mut data);
    }

    pub fn terminate_session(&self) {
        let mut data = self.data();
        if let Some(session) = data.session.take() {
            info!(game_id = %session.game_id, "session terminated");
        }
        data.cancel_candidate();
        data.cancel_indicator();
        self.reconcile(&mut data);
    }

    /// Feeds raw serial bytes. Reconciles whenever they complete a new frame.
    pub fn on_frame_bytes(&self, bytes: &[u8]) {
        let mut data = self.data();
        data.extractor.extend(bytes);
        let Some(frame) = data.extractor.next_frame() else {
            return;
        };
        let grid = frame.decode();
        debug!("board state:\n{grid}");
        if self.inner.ready.send_if_modified(|ready| !std::mem::replace(ready, true)) {
            info!("board connected");
        }
        data.physical = Some(grid);
        self.reconcile(&mut data);
    }

    pub fn on_remote_moves(&self, moves: Vec<String>) {
        let moves: Vec<String> = moves.into_iter().filter(|mv| !mv.is_empty()).collect();
        info!(?moves, "updating remote moves");
        let mut data = self.data();
        let Some(session) = &mut data.session else {
            debug!("no session, ignoring remote moves");
            return;
        };
        session.moves = moves;
        self.reconcile(&mut data);
    }

    /// The opponent left and the service allows claiming the game.
    pub async fn on_opponent_gone_claimable(&self) -> Result<(), BridgeError> {
        let game_id = self
            .data()
            .session
            .as_ref()
            .map(|session| session.game_id.clone());
        let Some(game_id) = game_id else {
            info!("no game id found, can't claim victory");
            return Err(BridgeError::NoSession);
        };
        info!(%game_id, "opponent is gone for good, claiming victory");
        self.inner.client.claim_victory(&game_id).await?;
        Ok(())
    }

    pub fn lit_squares(&self) -> SquareSet {
        self.data().indicator.lit()
    }

    pub fn pending_move(&self) -> Option<String> {
        self.data().scheduler.pending().map(|c| c.mv.clone())
    }

    pub fn last_committed(&self) -> Option<String> {
        self.data()
            .session
            .as_ref()
            .and_then(|session| session.last_committed.clone())
    }

    pub fn is_board_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    fn reconcile(&self, data: &mut SessionData) {
        let replay = match data.session.as_ref().map(|s| Replay::from_moves(&s.moves)) {
            None => Replay::default(),
            Some(Ok(replay)) => replay,
            Some(Err(e)) => {
                warn!("cannot replay remote moves: {e}");
                data.cancel_candidate();
                return;
            }
        };

        let mismatch = match &data.physical {
            Some(physical) => reconcile(physical, replay.grid(), data.session.is_some()),
            None => Mismatch::default(),
        };
        self.push_indicator(data, mismatch.lit);

        let (Some(session), Some(_)) = (&data.session, &data.physical) else {
            data.cancel_candidate();
            return;
        };
        match detect(
            &mismatch,
            &replay,
            session.side,
            session.last_committed.as_deref(),
        ) {
            Detection::Candidate(mv) => {
                if let Offer::Scheduled { ticket, due } = data.scheduler.offer(&mv, Instant::now()) {
                    info!(%mv, "candidate move detected");
                    self.arm_commit(data, ticket, due);
                }
            }
            Detection::Idle(_) | Detection::Ambiguous => data.cancel_candidate(),
        }
    }

    fn push_indicator(&self, data: &mut SessionData, lit: SquareSet) {
        match data.indicator.update(lit, Instant::now()) {
            Debounce::SendNow(lit) => self.send_indicator(lit),
            Debounce::Defer(after) => {
                let bridge = self.clone();
                data.indicator_timer = Some(tokio::spawn(async move {
                    sleep(after).await;
                    bridge.fire_indicator();
                }));
            }
            Debounce::Coalesced => {}
        }
    }

    fn fire_indicator(&self) {
        let mut data = self.data();
        data.indicator_timer = None;
        if let Some(lit) = data.indicator.fire(Instant::now()) {
            self.send_indicator(lit);
        }
    }

    fn send_indicator(&self, lit: SquareSet) {
        debug!(?lit, "sending LED command");
        if self.inner.commands.send(IndicatorCommand::new(lit)).is_err() {
            debug!("indicator writer has stopped");
        }
    }

    fn arm_commit(&self, data: &mut SessionData, ticket: u64, due: Instant) {
        if let Some(previous) = data.commit_timer.take() {
            previous.abort();
        }
        let bridge = self.clone();
        data.commit_timer = Some(tokio::spawn(async move {
            sleep_until(due).await;
            bridge.commit(ticket).await;
        }));
    }

    async fn commit(&self, ticket: u64) {
        let _gate = self.inner.commit_gate.lock().await;
        let (game_id, mv) = {
            let mut data = self.data();
            let Some(mv) = data.scheduler.take_due(ticket, Instant::now()) else {
                return;
            };
            // past this point the submission must not be aborted
            data.commit_timer = None;
            let Some(session) = &mut data.session else {
                return;
            };
            session.last_committed = Some(mv.clone());
            (session.game_id.clone(), mv)
        };

        info!(%game_id, %mv, "playing move");
        let event = match self.inner.client.submit_move(&game_id, &mv).await {
            Ok(()) => BridgeEvent::MoveCommitted { game_id, mv },
            Err(error) => {
                warn!(%game_id, %mv, "move was not accepted: {error}");
                BridgeEvent::CommitFailed { game_id, mv, error }
            }
        };
        self.inner.events.send(event).ok();
    }
}

async fn write_indicator(
    mut sink: impl IndicatorSink,
    mut commands: mpsc::UnboundedReceiver<IndicatorCommand>,
    mut ready: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<BridgeEvent>,
) {
    while let Some(mut command) = commands.recv().await {
        if ready.wait_for(|ready| *ready).await.is_err() {
            return;
        }
        // anything queued up while waiting is stale by now
        while let Ok(newer) = commands.try_recv() {
            command = newer;
        }
        if let Err(e) = sink.write_command(command.as_bytes()).await {
            error!("error while writing to serial port: {e}");
            events.send(BridgeEvent::IndicatorFailed(e)).ok();
            return;
        }
    }
}
