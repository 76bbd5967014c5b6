//! Per-match session actor
//!
//! Each match runs as one tokio task that exclusively owns its
//! [`MatchState`], [`InputSynchronizer`], optional [`OpponentEngine`] and
//! [`StateValidator`]. Every mutation goes through the task's `select!` loop:
//!
//! - the fixed-rate synchronizer tick (paddles, then ball and scoring)
//! - the opponent sampling cadence
//! - the opponent's reaction-delay and emission deadlines
//! - commands from the transport collaborator
//!
//! Because all of these are branches of one loop, a decision can never run
//! concurrently with a tick, and clearing a deadline is enough to cancel it.

use crate::config::{ConfigError, ServerConfig};
use crate::events::{ObserverError, OpponentEvent};
use crate::game::{self, BallOutcome};
use crate::opponent::{OpponentEngine, PerformanceStats, SampleOutcome, ScheduledIntent};
use crate::random::{make_source, RandomSource};
use crate::registry::{MatchId, RegistryError};
use crate::sync::{InputSynchronizer, SyncSnapshot};
use crate::utils::get_timestamp;
use crate::validation::{ComparisonReport, PlayerRecord, StateValidator, ValidationResult};
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use shared::{Direction, InputSource, MatchState, MoveIntent, PlayerSlot, Score};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

/// Minimum opponent samples before compliance is judged.
const MIN_SAMPLES_FOR_HEALTH: u64 = 10;

/// How a match is set up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub difficulty: String,
    /// Slot played by the opponent engine, `None` for two humans.
    pub ai_slot: Option<PlayerSlot>,
    pub seed: Option<u64>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            difficulty: "standard".to_string(),
            ai_slot: Some(PlayerSlot::Two),
            seed: None,
        }
    }
}

/// Messages sent from the transport collaborator to a match
#[derive(Debug)]
pub enum MatchCommand {
    HumanInput {
        slot: PlayerSlot,
        direction: Direction,
        intensity: Option<f32>,
    },
    SetTarget {
        slot: PlayerSlot,
        y: f32,
    },
    SetDifficulty {
        tier: String,
        reply: oneshot::Sender<Result<(), ConfigError>>,
    },
    SetOpponentActive(bool),
    /// Offers the current authoritative state to the opponent's sampling
    /// gate. Offers inside the cadence count as skipped.
    Observe,
    SetPaused(bool),
    /// Serves and activates the opponent. Restarts a finished match.
    Start,
    ClientReport {
        state: Box<MatchState>,
        reply: oneshot::Sender<ComparisonReport>,
    },
    Snapshot {
        reply: oneshot::Sender<MatchState>,
    },
    Stats {
        reply: oneshot::Sender<Option<PerformanceStats>>,
    },
    Stop,
}

/// Messages sent from a match to the transport collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchEvent {
    State(SyncSnapshot),
    Opponent(OpponentEvent),
    Validation(ValidationResult),
    Scored { scorer: PlayerSlot, score: Score },
    Finished { winner: PlayerSlot },
    Timing(PerformanceStats),
    /// The match has been paused until the transport resyncs its clients.
    ResyncRequired { reason: String },
}

impl MatchEvent {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// Wall-clock milliseconds derived from the tokio clock, so that paused
/// test time and intent timestamps agree.
struct MatchClock {
    base_ms: u64,
    base: Instant,
}

impl MatchClock {
    fn new() -> Self {
        Self {
            base_ms: get_timestamp(),
            base: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.base_ms + self.base.elapsed().as_millis() as u64
    }
}

pub struct MatchSession {
    id: MatchId,
    config: Arc<ServerConfig>,
    state: MatchState,
    sync: InputSynchronizer,
    opponent: Option<OpponentEngine>,
    validator: StateValidator,
    players: [PlayerRecord; 2],
    rng: Box<dyn RandomSource>,
    clock: MatchClock,

    commands: mpsc::UnboundedReceiver<MatchCommand>,
    events: mpsc::UnboundedSender<MatchEvent>,

    pending_decision: Option<(Instant, u64)>,
    emissions: VecDeque<(Instant, ScheduledIntent)>,
    ticks: u64,
    critical_streak: u32,
    timing_flagged: bool,
}

impl MatchSession {
    /// Builds the session and spawns it on the current runtime.
    pub fn spawn(
        id: MatchId,
        config: Arc<ServerConfig>,
        options: &MatchOptions,
    ) -> Result<(MatchHandle, mpsc::UnboundedReceiver<MatchEvent>), ConfigError> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let session = Self::new(id, config, options, command_rx, event_tx)?;
        let task = tokio::spawn(session.run());

        Ok((
            MatchHandle {
                id,
                commands: command_tx,
                task,
            },
            event_rx,
        ))
    }

    fn new(
        id: MatchId,
        config: Arc<ServerConfig>,
        options: &MatchOptions,
        commands: mpsc::UnboundedReceiver<MatchCommand>,
        events: mpsc::UnboundedSender<MatchEvent>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let opponent = match options.ai_slot {
            Some(side) => {
                let mut engine = OpponentEngine::new(
                    &config,
                    &options.difficulty,
                    side,
                    make_source(options.seed),
                )?;
                let sink = events.clone();
                engine.subscribe(Box::new(move |event: &OpponentEvent| -> Result<(), ObserverError> {
                    sink.send(MatchEvent::Opponent(event.clone()))
                        .map_err(|_| ObserverError::Closed)
                }));
                Some(engine)
            }
            None => {
                config.difficulties.lookup(&options.difficulty)?;
                None
            }
        };

        Ok(Self {
            id,
            state: config.bounds.initial_state(),
            sync: InputSynchronizer::new(&config)?,
            validator: StateValidator::new(&config)?,
            opponent,
            players: [
                PlayerRecord { slot: PlayerSlot::One, score: 0 },
                PlayerRecord { slot: PlayerSlot::Two, score: 0 },
            ],
            rng: make_source(options.seed.map(|s| s.wrapping_add(1))),
            clock: MatchClock::new(),
            config,
            commands,
            events,
            pending_decision: None,
            emissions: VecDeque::new(),
            ticks: 0,
            critical_streak: 0,
            timing_flagged: false,
        })
    }

    /// Main loop; returns once `Stop` arrives or every handle is dropped.
    pub async fn run(mut self) {
        let mut tick_interval = interval(self.config.sync.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cadence_interval = interval(self.config.opponent.cadence());
        cadence_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Match {} started its session", self.id);

        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(MatchCommand::Stop) | None => {
                            info!("Match {} stopping", self.id);
                            break;
                        }
                        Some(command) => self.handle_command(command),
                    }
                },

                _ = tick_interval.tick() => self.on_tick(),

                _ = cadence_interval.tick() => self.on_cadence(),

                _ = wait_until(deadline) => self.on_deadline(),
            }
        }

        self.shutdown();
    }

    fn handle_command(&mut self, command: MatchCommand) {
        match command {
            MatchCommand::HumanInput {
                slot,
                direction,
                intensity,
            } => {
                if self.ai_side() == Some(slot) {
                    warn!("Match {}: ignoring human input for opponent slot {:?}", self.id, slot);
                    return;
                }
                let mut intent = MoveIntent::new(direction, InputSource::Human, self.clock.now_ms());
                if let Some(intensity) = intensity {
                    intent = intent.with_intensity(intensity);
                }
                self.sync.add_input(slot, intent);
            }

            MatchCommand::SetTarget { slot, y } => {
                if self.ai_side() == Some(slot) {
                    warn!("Match {}: ignoring target for opponent slot {:?}", self.id, slot);
                    return;
                }
                self.sync.set_target_position(slot, y);
            }

            MatchCommand::SetDifficulty { tier, reply } => {
                let result = match self.opponent.as_mut() {
                    Some(engine) => engine.set_difficulty(&tier),
                    None => self.config.difficulties.lookup(&tier).map(|_| ()),
                };
                if let Err(e) = &result {
                    warn!("Match {}: difficulty change rejected: {}", self.id, e);
                }
                let _ = reply.send(result);
            }

            MatchCommand::SetOpponentActive(active) => {
                if let Some(engine) = self.opponent.as_mut() {
                    if active {
                        engine.activate();
                    } else {
                        engine.deactivate();
                    }
                }
                if !active {
                    self.cancel_opponent_schedule();
                }
            }

            MatchCommand::Observe => self.on_cadence(),

            MatchCommand::SetPaused(paused) => {
                if self.state.paused == paused {
                    return;
                }
                self.state.paused = paused;
                if paused {
                    self.cancel_opponent_schedule();
                } else {
                    self.critical_streak = 0;
                }
                info!("Match {} {}", self.id, if paused { "paused" } else { "resumed" });
            }

            MatchCommand::Start => self.start(),

            MatchCommand::ClientReport { state, reply } => {
                let report = self.validator.compare(&state, &self.state);
                if !report.result.is_valid {
                    debug!(
                        "Match {}: client report invalid ({} errors)",
                        self.id,
                        report.result.errors.len()
                    );
                }
                let _ = reply.send(report);
            }

            MatchCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.clone());
            }

            MatchCommand::Stats { reply } => {
                let _ = reply.send(self.opponent.as_ref().map(|e| e.performance_stats()));
            }

            // Handled by the run loop.
            MatchCommand::Stop => {}
        }
    }

    fn start(&mut self) {
        if self.state.winner.is_some() {
            self.state.score = Score::default();
            for record in self.players.iter_mut() {
                record.score = 0;
            }
            self.validator.clear_history();
        }

        game::start(&mut self.state, &self.config.bounds, self.rng.as_mut());
        self.state.last_update = self.clock.now_ms();
        self.critical_streak = 0;
        self.timing_flagged = false;

        if let Some(engine) = self.opponent.as_mut() {
            engine.activate();
        }
    }

    fn on_tick(&mut self) {
        let now_ms = self.clock.now_ms();

        self.sync.tick(now_ms);
        self.sync.apply_to(&mut self.state);

        match game::advance_ball(&mut self.state, &self.config.bounds) {
            BallOutcome::Scored { scorer } => self.on_point(scorer),
            BallOutcome::Returned(slot) => trace!("Match {}: {:?} returned the ball", self.id, slot),
            BallOutcome::InPlay => {}
        }

        self.state.last_update = now_ms;
        self.sync.set_ball(self.state.ball);
        self.ticks += 1;

        let session = &self.config.session;
        if self.ticks % session.broadcast_every_ticks == 0 {
            self.publish(MatchEvent::State(self.sync.get_state()));
        }
        if self.ticks % session.validate_every_ticks == 0 {
            self.run_validation(now_ms);
        }
        if self.ticks % 60 == 0 {
            debug!(
                "Match {} tick {}: score {}-{}, ball ({:.0}, {:.0})",
                self.id,
                self.ticks,
                self.state.score.one,
                self.state.score.two,
                self.state.ball.x,
                self.state.ball.y
            );
        }
    }

    fn on_point(&mut self, scorer: PlayerSlot) {
        let winner = game::award_point(&mut self.state, scorer, &self.config.bounds, self.rng.as_mut());
        self.players[scorer.index()].score = self.state.score.get(scorer);
        self.publish(MatchEvent::Scored {
            scorer,
            score: self.state.score,
        });

        if let Some(winner) = winner {
            if let Some(engine) = self.opponent.as_mut() {
                engine.deactivate();
            }
            self.cancel_opponent_schedule();
            self.publish(MatchEvent::Finished { winner });
        }
    }

    fn run_validation(&mut self, now_ms: u64) {
        self.validator.record(&self.state);
        let result = self.validator.validate_at(&self.state, &self.players, now_ms);

        if result.has_critical() {
            self.critical_streak += 1;
        } else {
            self.critical_streak = 0;
        }
        self.publish(MatchEvent::Validation(result));

        if self.critical_streak >= self.config.session.resync_after_criticals {
            let reason = format!(
                "{} consecutive validation passes with critical errors",
                self.critical_streak
            );
            self.critical_streak = 0;
            self.request_resync(reason);
        }
    }

    fn on_cadence(&mut self) {
        let Some(engine) = self.opponent.as_mut() else {
            return;
        };

        match engine.observe(&self.state, Instant::now().into_std()) {
            SampleOutcome::Accepted { decide_after, cycle } => {
                self.pending_decision = Some((Instant::now() + decide_after, cycle));
                trace!("Match {}: opponent sample {} accepted", self.id, cycle);
            }
            SampleOutcome::Skipped => debug!("Match {}: opponent sample skipped", self.id),
            SampleOutcome::Ignored => {}
        }

        if !engine.is_active() {
            return;
        }

        let stats = engine.performance_stats();
        let judged = stats.accepted + stats.skipped >= MIN_SAMPLES_FOR_HEALTH;
        self.publish(MatchEvent::Timing(stats));

        if judged && !stats.is_healthy() && !self.timing_flagged {
            self.timing_flagged = true;
            self.request_resync(format!(
                "opponent cadence compliance {:.1}%",
                stats.compliance_rate * 100.0
            ));
        }
    }

    fn on_deadline(&mut self) {
        let now = Instant::now();
        let now_ms = self.clock.now_ms();

        if let Some((at, cycle)) = self.pending_decision {
            if at <= now {
                self.pending_decision = None;
                let decision = self
                    .opponent
                    .as_mut()
                    .and_then(|engine| engine.decide(cycle, now_ms));
                if let Some(decision) = decision {
                    self.emissions.clear();
                    self.emissions
                        .extend(decision.plan.into_iter().map(|step| (now + step.offset, step)));
                }
            }
        }

        while self.emissions.front().is_some_and(|(at, _)| *at <= now) {
            let Some((_, step)) = self.emissions.pop_front() else {
                break;
            };
            let Some(engine) = self.opponent.as_mut() else {
                break;
            };
            if let Some(intent) = engine.emit(&step, now_ms) {
                let side = engine.side();
                self.sync.add_input(side, intent);
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let decision = self.pending_decision.map(|(at, _)| at);
        let emission = self.emissions.front().map(|(at, _)| *at);
        match (decision, emission) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn cancel_opponent_schedule(&mut self) {
        self.pending_decision = None;
        self.emissions.clear();
    }

    fn request_resync(&mut self, reason: String) {
        warn!("Match {}: resync required ({})", self.id, reason);
        self.state.paused = true;
        self.cancel_opponent_schedule();
        self.publish(MatchEvent::ResyncRequired { reason });
    }

    fn ai_side(&self) -> Option<PlayerSlot> {
        self.opponent.as_ref().map(|e| e.side())
    }

    fn publish(&self, event: MatchEvent) {
        if self.events.send(event).is_err() {
            trace!("Match {}: no event listener", self.id);
        }
    }

    fn shutdown(&mut self) {
        if let Some(engine) = self.opponent.as_mut() {
            engine.deactivate();
        }
        self.cancel_opponent_schedule();
        self.validator.clear_history();
        self.state.active = false;
        info!("Match {} session ended after {} ticks", self.id, self.ticks);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Owner's handle to a running match session.
pub struct MatchHandle {
    id: MatchId,
    commands: mpsc::UnboundedSender<MatchCommand>,
    task: JoinHandle<()>,
}

impl MatchHandle {
    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn send(&self, command: MatchCommand) -> Result<(), RegistryError> {
        self.commands
            .send(command)
            .map_err(|_| RegistryError::SessionClosed(self.id))
    }

    /// Sends a command built around a reply channel and awaits the reply.
    pub async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> MatchCommand,
    ) -> Result<T, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(build(reply_tx))?;
        reply_rx
            .await
            .map_err(|_| RegistryError::SessionClosed(self.id))
    }

    pub async fn snapshot(&self) -> Result<MatchState, RegistryError> {
        self.request(|reply| MatchCommand::Snapshot { reply }).await
    }

    pub async fn stats(&self) -> Result<Option<PerformanceStats>, RegistryError> {
        self.request(|reply| MatchCommand::Stats { reply }).await
    }

    pub async fn set_difficulty(&self, tier: &str) -> Result<(), RegistryError> {
        let tier = tier.to_string();
        self.request(|reply| MatchCommand::SetDifficulty { tier, reply })
            .await?
            .map_err(RegistryError::Config)
    }

    pub async fn report(&self, state: MatchState) -> Result<ComparisonReport, RegistryError> {
        self.request(|reply| MatchCommand::ClientReport {
            state: Box::new(state),
            reply,
        })
        .await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the session and waits for its task to exit. No tick fires after
    /// this returns.
    pub async fn stop(self) -> Result<(), RegistryError> {
        // The session may already be gone; joining is still required.
        let _ = self.commands.send(MatchCommand::Stop);
        if let Err(e) = self.task.await {
            error!("Match {} session task failed: {}", self.id, e);
            return Err(RegistryError::SessionClosed(self.id));
        }
        Ok(())
    }
}
