//! # Opponent Engine
//!
//! Decides what the non-human player does. The engine is a synchronous state
//! machine; the match session owns the clock and drives it:
//!
//! 1. [`OpponentEngine::observe`] gates incoming samples to a fixed cadence.
//!    Early samples are counted as skipped and dropped, so the opponent can
//!    never react faster than the cadence no matter how often it is fed.
//! 2. An accepted sample returns the reaction delay of the active profile.
//!    The session schedules [`OpponentEngine::decide`] after that delay,
//!    tagged with the cycle number; a stale or cancelled cycle is a no-op.
//! 3. A decision predicts the intercept, applies the strategic and
//!    difficulty adjustments, resolves a direction and returns a plan of
//!    timed key events (press, release and the occasional correction or
//!    double tap). The session replays the plan through
//!    [`OpponentEngine::emit`], which publishes each event to subscribers.
//!
//! The engine owns its side of the court. "Ahead" and "behind" are always
//! computed from the engine's own [`PlayerSlot`], never from labels supplied
//! by the caller.

use crate::config::{ConfigError, OpponentTiming, PhysicalBounds, ServerConfig};
use crate::difficulty::{DifficultyProfile, DifficultyTable, SkillLevel};
use crate::events::{KeyPhase, OpponentEvent, OpponentObserver, Subscribers, SubscriptionId};
use crate::random::RandomSource;
use crate::trajectory::{predict_intercept, TrajectoryPrediction, Walls};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use shared::{Direction, InputSource, MatchState, MoveIntent, PlayerSlot};
use std::time::{Duration, Instant};

/// Urgency below which a receding ball sends the paddle back toward centre.
const LOW_URGENCY: f32 = 0.5;
/// Share of the gap to centre closed when drifting back.
const CENTER_PULL: f32 = 0.8;
/// Paddle-height fraction used as the angled-return offset when ahead.
const ANGLED_RETURN: f32 = 0.3;
/// Paddle-height multiple spanned by the accuracy error at accuracy 0.
const ERROR_SPAN: f32 = 1.2;
const DEAD_ZONE_JITTER: f32 = 0.1;

const CASUAL_CENTER_CHANCE: f32 = 0.12;
const CASUAL_BLUNDER_CHANCE: f32 = 0.08;
const CASUAL_BLUNDER_SPAN: f32 = 0.75;
const STANDARD_BLUNDER_CHANCE: f32 = 0.05;
const STANDARD_BLUNDER_SPAN: f32 = 0.4;
const EXPERT_COUNTER_BIAS: f32 = 0.15;

const HOLD_MIN_MS: f32 = 50.0;
const HOLD_MAX_MS: f32 = 400.0;

/// Result of offering a sample to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Call [`OpponentEngine::decide`] with `cycle` once `decide_after` has elapsed.
    Accepted { decide_after: Duration, cycle: u64 },
    /// Arrived before the cadence allowed; counted and dropped.
    Skipped,
    /// Engine inactive or match not running; not counted.
    Ignored,
}

/// A key event to publish `offset` after the decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledIntent {
    pub offset: Duration,
    pub phase: KeyPhase,
    pub intent: MoveIntent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub prediction: TrajectoryPrediction,
    pub urgency: f32,
    pub target_y: f32,
    pub direction: Direction,
    /// Ordered by offset.
    pub plan: Vec<ScheduledIntent>,
}

/// Cadence compliance and decision cost, for the telemetry collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub accepted: u64,
    pub skipped: u64,
    pub decisions: u64,
    pub average_decision_micros: f64,
    /// `accepted / (accepted + skipped)`, 1.0 before any sample.
    pub compliance_rate: f64,
}

impl PerformanceStats {
    pub fn is_healthy(&self) -> bool {
        self.compliance_rate >= 0.95
    }
}

pub struct OpponentEngine {
    side: PlayerSlot,
    profile: DifficultyProfile,
    pending_profile: Option<DifficultyProfile>,
    table: DifficultyTable,
    timing: OpponentTiming,
    bounds: PhysicalBounds,
    ms_per_tick: f32,

    active: bool,
    cycle: u64,
    sample: Option<MatchState>,
    last_accepted: Option<Instant>,

    accepted: u64,
    skipped: u64,
    decisions: u64,
    decision_time: Duration,

    subscribers: Subscribers,
    rng: Box<dyn RandomSource>,
}

impl OpponentEngine {
    /// Builds an inactive engine playing `side` at difficulty `tier`.
    ///
    /// Fails if the configuration is invalid or `tier` is not in the table.
    pub fn new(
        config: &ServerConfig,
        tier: &str,
        side: PlayerSlot,
        rng: Box<dyn RandomSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let profile = config.difficulties.lookup(tier)?.clone();

        Ok(Self {
            side,
            profile,
            pending_profile: None,
            table: config.difficulties.clone(),
            timing: config.opponent.clone(),
            bounds: config.bounds.clone(),
            ms_per_tick: 1000.0 / config.sync.tick_rate_hz as f32,
            active: false,
            cycle: 0,
            sample: None,
            last_accepted: None,
            accepted: 0,
            skipped: 0,
            decisions: 0,
            decision_time: Duration::ZERO,
            subscribers: Subscribers::new(),
            rng,
        })
    }

    pub fn side(&self) -> PlayerSlot {
        self.side
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Profile used by the current cycle. A pending change is not visible until
    /// the next sample is accepted.
    pub fn active_profile(&self) -> &DifficultyProfile {
        &self.profile
    }

    pub fn subscribe(&mut self, observer: Box<dyn OpponentObserver>) -> SubscriptionId {
        self.subscribers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        info!("Opponent for {:?} activated ({})", self.side, self.profile.name);
        self.subscribers
            .publish(&OpponentEvent::ActivationChanged { active: true });
    }

    /// Stops consuming samples. Any buffered sample is dropped and any
    /// scheduled decision becomes stale.
    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.sample = None;
        self.last_accepted = None;
        self.cycle += 1;
        info!("Opponent for {:?} deactivated", self.side);
        self.subscribers
            .publish(&OpponentEvent::ActivationChanged { active: false });
    }

    /// Swaps the difficulty profile starting with the next accepted sample.
    pub fn set_difficulty(&mut self, tier: &str) -> Result<(), ConfigError> {
        let next = self.table.lookup(tier)?.clone();
        let from = self
            .pending_profile
            .as_ref()
            .unwrap_or(&self.profile)
            .name
            .clone();

        info!("Opponent difficulty change requested: {} -> {}", from, next.name);
        let to = next.name.clone();
        self.pending_profile = Some(next);
        self.subscribers
            .publish(&OpponentEvent::DifficultyChanged { from, to });
        Ok(())
    }

    /// Offers a state sample taken at `now`.
    pub fn observe(&mut self, state: &MatchState, now: Instant) -> SampleOutcome {
        if !self.active || !state.is_running() {
            return SampleOutcome::Ignored;
        }

        if let Some(last) = self.last_accepted {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.timing.min_gap() {
                self.skipped += 1;
                trace!(
                    "Skipped opponent sample after {}ms (cadence {}ms)",
                    elapsed.as_millis(),
                    self.timing.cadence_ms
                );
                return SampleOutcome::Skipped;
            }
        }

        if let Some(profile) = self.pending_profile.take() {
            debug!("Opponent now playing at {}", profile.name);
            self.profile = profile;
        }

        self.last_accepted = Some(now);
        self.accepted += 1;
        self.cycle += 1;
        self.sample = Some(state.clone());

        SampleOutcome::Accepted {
            decide_after: Duration::from_millis(self.profile.reaction_latency_ms),
            cycle: self.cycle,
        }
    }

    /// Runs the decision for `cycle`. Returns `None` when the engine is
    /// inactive, the cycle is stale, or no sample is buffered.
    pub fn decide(&mut self, cycle: u64, now_ms: u64) -> Option<Decision> {
        if !self.active || cycle != self.cycle {
            return None;
        }
        let state = self.sample.take()?;

        let started = Instant::now();
        let decision = self.plan_decision(&state, now_ms);
        self.decision_time += started.elapsed();
        self.decisions += 1;

        debug!(
            "Opponent decision: intercept {:.1} (bounces {}), target {:.1}, {:?}",
            decision.prediction.intercept_y,
            decision.prediction.bounce_count,
            decision.target_y,
            decision.direction
        );

        let decided = MoveIntent::new(decision.direction, InputSource::Ai, now_ms);
        self.subscribers.publish(&OpponentEvent::Move {
            phase: KeyPhase::Decided,
            intent: decided,
        });

        Some(decision)
    }

    /// Publishes one step of a decision plan, stamped with `now_ms`.
    /// Returns the intent as published, or `None` while inactive.
    pub fn emit(&mut self, scheduled: &ScheduledIntent, now_ms: u64) -> Option<MoveIntent> {
        if !self.active {
            return None;
        }
        let mut intent = scheduled.intent.clone();
        intent.timestamp = now_ms;
        self.subscribers.publish(&OpponentEvent::Move {
            phase: scheduled.phase,
            intent: intent.clone(),
        });
        Some(intent)
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        let total = self.accepted + self.skipped;
        let compliance_rate = if total == 0 {
            1.0
        } else {
            self.accepted as f64 / total as f64
        };
        let average_decision_micros = if self.decisions == 0 {
            0.0
        } else {
            self.decision_time.as_secs_f64() * 1_000_000.0 / self.decisions as f64
        };

        PerformanceStats {
            accepted: self.accepted,
            skipped: self.skipped,
            decisions: self.decisions,
            average_decision_micros,
            compliance_rate,
        }
    }

    fn plan_decision(&mut self, state: &MatchState, now_ms: u64) -> Decision {
        let own = *state.paddle(self.side);
        let other = *state.paddle(self.side.opponent());
        let (plane_x, far_x) = match self.side {
            PlayerSlot::One => (own.x + own.width, other.x),
            PlayerSlot::Two => (own.x, other.x + other.width),
        };

        let walls = Walls::for_ball(state.canvas.height, state.ball.radius);
        let prediction = predict_intercept(
            &state.ball,
            plane_x,
            far_x,
            walls,
            self.profile.prediction_depth,
        );

        let urgency = self.urgency(state, plane_x);
        let strategic = self.strategic_target(&prediction, urgency, state);
        let adjusted = self.apply_difficulty(strategic, state);

        let half = own.height / 2.0;
        let target_y = adjusted.clamp(half, (state.canvas.height - half).max(half));

        let gap = target_y - own.center_y();
        let direction = self.resolve_direction(gap);
        let plan = self.emission_plan(direction, gap.abs(), now_ms);

        Decision {
            prediction,
            urgency,
            target_y,
            direction,
            plan,
        }
    }

    /// Weighted closeness and speed of the ball, in `0..=1`.
    fn urgency(&self, state: &MatchState, plane_x: f32) -> f32 {
        let width = state.canvas.width.max(1.0);
        let distance_ratio = ((plane_x - state.ball.x).abs() / width).min(1.0);
        let speed_ratio = (state.ball.speed() / self.bounds.max_ball_speed).min(1.0);
        ((1.0 - distance_ratio) * 0.6 + speed_ratio * 0.4).clamp(0.0, 1.0)
    }

    fn strategic_target(&self, prediction: &TrajectoryPrediction, urgency: f32, state: &MatchState) -> f32 {
        let center = state.canvas.height / 2.0;
        let target = prediction.intercept_y;

        if !prediction.incoming {
            if urgency < LOW_URGENCY {
                return target + (center - target) * CENTER_PULL * (1.0 - urgency);
            }
            return target;
        }

        let own_score = state.score.get(self.side);
        let their_score = state.score.get(self.side.opponent());
        if own_score > their_score {
            let side_of_center = if target >= center { 1.0 } else { -1.0 };
            let paddle_height = state.paddle(self.side).height;
            return target + side_of_center * paddle_height * ANGLED_RETURN;
        }

        target
    }

    fn apply_difficulty(&mut self, target: f32, state: &MatchState) -> f32 {
        let paddle_height = state.paddle(self.side).height;
        let center = state.canvas.height / 2.0;

        let error = self.rng.symmetric() * (1.0 - self.profile.accuracy) * paddle_height * ERROR_SPAN;
        let mut target = target + error;

        match self.profile.skill {
            SkillLevel::Casual => {
                if self.rng.chance(CASUAL_CENTER_CHANCE) {
                    target = center;
                } else if self.rng.chance(CASUAL_BLUNDER_CHANCE) {
                    target += self.rng.symmetric() * paddle_height * CASUAL_BLUNDER_SPAN;
                }
            }
            SkillLevel::Standard => {
                if self.rng.chance(STANDARD_BLUNDER_CHANCE) {
                    target += self.rng.symmetric() * paddle_height * STANDARD_BLUNDER_SPAN;
                }
            }
            SkillLevel::Expert => {
                let human = state.paddle(self.side.opponent());
                target -= (human.center_y() - center) * EXPERT_COUNTER_BIAS;
            }
        }

        target
    }

    fn resolve_direction(&mut self, gap: f32) -> Direction {
        let jitter = 1.0 + self.rng.symmetric() * DEAD_ZONE_JITTER;
        let dead_zone = self.profile.dead_zone_px / self.profile.speed_multiplier * jitter;

        if gap.abs() < dead_zone {
            Direction::None
        } else if gap < 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    /// Press, hold and release timing for `direction`, plus the occasional
    /// correction and double tap.
    fn emission_plan(&mut self, direction: Direction, distance: f32, now_ms: u64) -> Vec<ScheduledIntent> {
        if direction == Direction::None {
            return Vec::new();
        }

        let intensity = self.profile.speed_multiplier.min(1.0);
        let reaction = self.profile.reaction_latency_ms as f32;
        let pre_press = reaction * self.rng.between(0.1, 0.3);

        let ticks_needed = distance / (self.bounds.max_paddle_velocity * intensity);
        let hold_ceiling = HOLD_MAX_MS * self.profile.speed_multiplier.max(1.0);
        let hold = (ticks_needed * self.ms_per_tick).clamp(HOLD_MIN_MS, hold_ceiling) * self.rng.between(0.85, 1.15);

        let mut plan = Vec::with_capacity(6);
        let mut push = |at_ms: f32, phase: KeyPhase, direction: Direction, hold_ms: Option<f32>| {
            let offset = Duration::from_millis(at_ms.max(0.0).round() as u64);
            let mut intent = MoveIntent::new(direction, InputSource::Ai, now_ms + offset.as_millis() as u64);
            if let Some(hold_ms) = hold_ms {
                intent = intent
                    .with_intensity(intensity)
                    .with_duration(hold_ms.round() as u64);
            }
            plan.push(ScheduledIntent { offset, phase, intent });
        };

        let release_at = pre_press + hold;
        push(pre_press, KeyPhase::Press, direction, Some(hold));
        push(release_at, KeyPhase::Release, Direction::None, None);
        let mut last = release_at;

        if self.rng.chance(self.profile.correction_chance) {
            let at = last + self.rng.between(20.0, 60.0);
            let hold = self.rng.between(30.0, 60.0);
            push(at, KeyPhase::CorrectionPress, direction.reversed(), Some(hold));
            push(at + hold, KeyPhase::CorrectionRelease, Direction::None, None);
            last = at + hold;
        }

        if self.rng.chance(self.profile.double_tap_chance) {
            let at = last + self.rng.between(40.0, 80.0);
            let hold = self.rng.between(30.0, 50.0);
            push(at, KeyPhase::DoubleTap, direction, Some(hold));
            push(at + hold, KeyPhase::DoubleTapRelease, Direction::None, None);
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;
    use assert_approx_eq::assert_approx_eq;
    use shared::Canvas;
    use std::sync::{Arc, Mutex};

    fn engine(tier: &str, side: PlayerSlot, rng: ScriptedRandom) -> OpponentEngine {
        OpponentEngine::new(&ServerConfig::default(), tier, side, Box::new(rng)).unwrap()
    }

    fn running_state() -> MatchState {
        let mut state = ServerConfig::default().bounds.initial_state();
        state.active = true;
        state
    }

    fn recorded(engine: &mut OpponentEngine) -> Arc<Mutex<Vec<OpponentEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        engine.subscribe(Box::new(move |event: &OpponentEvent| -> Result<(), crate::events::ObserverError> {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        }));
        log
    }

    fn accept(engine: &mut OpponentEngine, state: &MatchState, now: Instant) -> u64 {
        match engine.observe(state, now) {
            SampleOutcome::Accepted { cycle, .. } => cycle,
            other => panic!("expected accepted sample, got {:?}", other),
        }
    }

    #[test]
    fn test_speed_multiplier_lengthens_longest_press() {
        let mut standard = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        let mut expert = engine("expert", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        let press = |engine: &mut OpponentEngine| engine.emission_plan(Direction::Down, 1_000.0, 0)[0].intent.duration;

        assert_eq!(press(&mut standard), Some(400));
        assert_eq!(press(&mut expert), Some(520));
        assert!(520 < ServerConfig::default().sync.max_hold_ms);
    }

    #[test]
    fn test_unknown_tier_fails_at_construction() {
        let result = OpponentEngine::new(
            &ServerConfig::default(),
            "impossible",
            PlayerSlot::Two,
            Box::new(ScriptedRandom::constant(0.5)),
        );
        assert!(matches!(result, Err(ConfigError::UnknownDifficulty(_))));
    }

    #[test]
    fn test_two_samples_within_interval() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        engine.activate();
        let state = running_state();
        let start = Instant::now();

        assert!(matches!(engine.observe(&state, start), SampleOutcome::Accepted { .. }));
        assert_eq!(
            engine.observe(&state, start + Duration::from_millis(400)),
            SampleOutcome::Skipped
        );

        let stats = engine.performance_stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.skipped, 1);
        assert_approx_eq!(stats.compliance_rate, 0.5, 1e-9);
        assert!(!stats.is_healthy());
    }

    #[test]
    fn test_cadence_tolerance() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        engine.activate();
        let state = running_state();
        let start = Instant::now();

        accept(&mut engine, &state, start);
        assert_eq!(
            engine.observe(&state, start + Duration::from_millis(940)),
            SampleOutcome::Skipped
        );
        accept(&mut engine, &state, start + Duration::from_millis(960));
        accept(&mut engine, &state, start + Duration::from_millis(1960));

        let stats = engine.performance_stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_accepted_sample_reports_reaction_delay() {
        let mut engine = engine("casual", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        engine.activate();
        match engine.observe(&running_state(), Instant::now()) {
            SampleOutcome::Accepted { decide_after, .. } => {
                assert_eq!(decide_after, Duration::from_millis(500))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_samples_ignored_when_inactive_or_paused() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        let mut state = running_state();
        let now = Instant::now();

        assert_eq!(engine.observe(&state, now), SampleOutcome::Ignored);

        engine.activate();
        state.paused = true;
        assert_eq!(engine.observe(&state, now), SampleOutcome::Ignored);

        state.paused = false;
        state.active = false;
        assert_eq!(engine.observe(&state, now), SampleOutcome::Ignored);

        let stats = engine.performance_stats();
        assert_eq!(stats.accepted + stats.skipped, 0);
        assert_eq!(stats.compliance_rate, 1.0);
    }

    #[test]
    fn test_decide_without_sample_is_noop() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        engine.activate();
        assert!(engine.decide(0, 0).is_none());
        assert!(engine.decide(1, 0).is_none());
    }

    #[test]
    fn test_deactivation_cancels_pending_decision() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        let events = recorded(&mut engine);
        engine.activate();
        let cycle = accept(&mut engine, &running_state(), Instant::now());

        engine.deactivate();
        assert!(engine.decide(cycle, 0).is_none());

        // Reactivation does not resurrect the dropped sample.
        engine.activate();
        assert!(engine.decide(cycle, 0).is_none());

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                OpponentEvent::ActivationChanged { active: true },
                OpponentEvent::ActivationChanged { active: false },
                OpponentEvent::ActivationChanged { active: true },
            ]
        );
    }

    #[test]
    fn test_reactivation_accepts_immediately() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        engine.activate();
        let state = running_state();
        let start = Instant::now();
        accept(&mut engine, &state, start);
        engine.deactivate();
        engine.activate();
        accept(&mut engine, &state, start + Duration::from_millis(10));
    }

    #[test]
    fn test_stale_cycle_is_ignored() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        engine.activate();
        let state = running_state();
        let start = Instant::now();
        let first = accept(&mut engine, &state, start);
        let second = accept(&mut engine, &state, start + Duration::from_secs(1));

        assert!(engine.decide(first, 0).is_none());
        assert!(engine.decide(second, 0).is_some());
        // The sample is consumed by the decision.
        assert!(engine.decide(second, 0).is_none());
    }

    #[test]
    fn test_ball_at_paddle_needs_no_move() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        engine.activate();

        let mut state = running_state();
        state.canvas = Canvas { width: 800.0, height: 600.0 };
        state.ball.x = 790.0;
        state.ball.y = 300.0;
        state.ball.vel_x = 5.0;
        state.ball.vel_y = 0.0;
        state.paddles[1].x = 800.0;
        state.paddles[1].y = 240.0;

        let cycle = accept(&mut engine, &state, Instant::now());
        let decision = engine.decide(cycle, 1_000).unwrap();

        assert!(decision.prediction.incoming);
        assert_approx_eq!(decision.prediction.intercept_y, 300.0, 1e-4);
        assert_approx_eq!(decision.target_y, 300.0, 1e-4);
        assert_eq!(decision.direction, Direction::None);
        assert!(decision.plan.is_empty());
    }

    #[test]
    fn test_far_target_produces_press_and_release() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        let events = recorded(&mut engine);
        engine.activate();

        let mut state = running_state();
        state.ball.x = 600.0;
        state.ball.y = 500.0;
        state.ball.vel_x = 5.0;
        state.ball.vel_y = 0.0;
        state.paddles[1].y = 0.0;

        let cycle = accept(&mut engine, &state, Instant::now());
        let decision = engine.decide(cycle, 10_000).unwrap();
        assert_eq!(decision.direction, Direction::Down);

        let phases: Vec<KeyPhase> = decision.plan.iter().map(|s| s.phase).collect();
        assert_eq!(phases, vec![KeyPhase::Press, KeyPhase::Release]);

        let press = &decision.plan[0];
        let release = &decision.plan[1];
        assert_eq!(press.intent.direction, Direction::Down);
        assert_eq!(press.intent.source, InputSource::Ai);
        assert!(press.offset < Duration::from_millis(300));
        assert!(release.offset > press.offset);
        assert_eq!(release.intent.direction, Direction::None);
        let hold = press.intent.duration.unwrap();
        assert_eq!(release.offset - press.offset, Duration::from_millis(hold));

        let events = events.lock().unwrap();
        assert!(events.contains(&OpponentEvent::Move {
            phase: KeyPhase::Decided,
            intent: MoveIntent::new(Direction::Down, InputSource::Ai, 10_000),
        }));
    }

    #[test]
    fn test_correction_and_double_tap() {
        // A zero source makes every chance roll succeed.
        let mut engine = engine("expert", PlayerSlot::Two, ScriptedRandom::constant(0.0));
        engine.activate();

        let mut state = running_state();
        state.ball.x = 600.0;
        state.ball.y = 100.0;
        state.ball.vel_x = 5.0;
        state.ball.vel_y = 0.0;
        state.paddles[1].y = 450.0;

        let cycle = accept(&mut engine, &state, Instant::now());
        let decision = engine.decide(cycle, 0).unwrap();
        assert_eq!(decision.direction, Direction::Up);

        let phases: Vec<KeyPhase> = decision.plan.iter().map(|s| s.phase).collect();
        assert_eq!(
            phases,
            vec![
                KeyPhase::Press,
                KeyPhase::Release,
                KeyPhase::CorrectionPress,
                KeyPhase::CorrectionRelease,
                KeyPhase::DoubleTap,
                KeyPhase::DoubleTapRelease,
            ]
        );
        assert_eq!(decision.plan[2].intent.direction, Direction::Down);
        assert_eq!(decision.plan[4].intent.direction, Direction::Up);
        assert!(decision.plan.windows(2).all(|w| w[0].offset <= w[1].offset));
    }

    #[test]
    fn test_emit_publishes_and_restamps() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        let events = recorded(&mut engine);
        let scheduled = ScheduledIntent {
            offset: Duration::from_millis(40),
            phase: KeyPhase::Press,
            intent: MoveIntent::new(Direction::Up, InputSource::Ai, 40),
        };

        assert!(engine.emit(&scheduled, 99).is_none());

        engine.activate();
        let intent = engine.emit(&scheduled, 99).unwrap();
        assert_eq!(intent.timestamp, 99);
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_difficulty_change_applies_next_cycle() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        let events = recorded(&mut engine);
        engine.activate();
        let state = running_state();
        let start = Instant::now();

        accept(&mut engine, &state, start);
        engine.set_difficulty("expert").unwrap();
        assert_eq!(engine.active_profile().name, "standard");

        match engine.observe(&state, start + Duration::from_secs(1)) {
            SampleOutcome::Accepted { decide_after, .. } => {
                assert_eq!(decide_after, Duration::from_millis(150))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(engine.active_profile().name, "expert");

        assert!(events.lock().unwrap().contains(&OpponentEvent::DifficultyChanged {
            from: "standard".to_string(),
            to: "expert".to_string(),
        }));
    }

    #[test]
    fn test_unknown_difficulty_change_is_rejected() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        assert!(engine.set_difficulty("godlike").is_err());
        assert_eq!(engine.active_profile().name, "standard");
    }

    #[test]
    fn test_receding_ball_drifts_toward_center() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        engine.activate();

        let mut state = running_state();
        state.ball.x = 100.0;
        state.ball.y = 100.0;
        state.ball.vel_x = -3.0;
        state.ball.vel_y = 0.0;

        let cycle = accept(&mut engine, &state, Instant::now());
        let decision = engine.decide(cycle, 0).unwrap();
        assert!(!decision.prediction.incoming);
        assert!(decision.urgency < LOW_URGENCY);
        assert!(decision.target_y > 100.0);
        assert!(decision.target_y < 300.0);
    }

    #[test]
    fn test_leading_opponent_aims_for_angle() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        engine.activate();

        let mut state = running_state();
        state.ball.x = 500.0;
        state.ball.y = 400.0;
        state.ball.vel_x = 5.0;
        state.ball.vel_y = 0.0;
        state.score.two = 3;

        let cycle = accept(&mut engine, &state, Instant::now());
        let decision = engine.decide(cycle, 0).unwrap();
        assert_approx_eq!(decision.target_y, 400.0 + 100.0 * ANGLED_RETURN, 1e-3);
    }

    #[test]
    fn test_side_one_uses_left_plane() {
        let mut engine = engine("standard", PlayerSlot::One, ScriptedRandom::constant(0.5));
        engine.activate();

        let mut state = running_state();
        state.ball.x = 300.0;
        state.ball.y = 200.0;
        state.ball.vel_x = -4.0;
        state.ball.vel_y = 0.0;

        let cycle = accept(&mut engine, &state, Instant::now());
        let decision = engine.decide(cycle, 0).unwrap();
        assert!(decision.prediction.incoming);
        let plane = state.paddles[0].x + state.paddles[0].width;
        assert_approx_eq!(decision.prediction.time_to_intercept, (300.0 - plane) / 4.0, 1e-3);
        assert_eq!(decision.direction, Direction::Up);
    }

    #[test]
    fn test_stats_track_decision_count() {
        let mut engine = engine("standard", PlayerSlot::Two, ScriptedRandom::constant(0.5));
        engine.activate();
        let cycle = accept(&mut engine, &running_state(), Instant::now());
        engine.decide(cycle, 0);
        let stats = engine.performance_stats();
        assert_eq!(stats.decisions, 1);
        assert!(stats.average_decision_micros >= 0.0);
        assert!(stats.is_healthy());
    }
}
