//! Input synchronization for paddle movement
//!
//! The synchronizer is the only writer of paddle position. It handles:
//! - Per-player bounded input buffers fed by both the transport layer and
//!   the opponent engine (oldest input dropped on overflow)
//! - Absolute target positions translated from pointer input
//! - Velocity-bounded integration on a fixed tick, with exponential decay
//!   once input stops
//!
//! Snapping a paddle to whatever position a message claims is both jerky
//! and exploitable; bounded integration rules out teleporting paddles.

use crate::config::{ConfigError, PhysicalBounds, ServerConfig, SyncSettings};
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use shared::{Ball, Direction, MatchState, MoveIntent, PlayerSlot};
use std::collections::VecDeque;

/// Gap below which a paddle following a target snaps onto it.
const TARGET_SNAP: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleSnapshot {
    pub slot: PlayerSlot,
    pub y: f32,
    pub vel_y: f32,
    pub height: f32,
}

/// Point-in-time copy of the synchronizer's view, safe to broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub tick: u64,
    pub timestamp: u64,
    pub paddles: [PaddleSnapshot; 2],
    pub ball: Ball,
}

/// Movement state and pending inputs for one player slot.
#[derive(Debug, Clone)]
struct PlayerLane {
    y: f32,
    vel_y: f32,
    height: f32,
    target_y: Option<f32>,
    buffer: VecDeque<MoveIntent>,
    dropped: u64,
}

impl PlayerLane {
    fn new(y: f32, height: f32, capacity: usize) -> Self {
        Self {
            y,
            vel_y: 0.0,
            height,
            target_y: None,
            buffer: VecDeque::with_capacity(capacity),
            dropped: 0,
        }
    }

    /// Drops inputs stamped further ahead of `now_ms` than the skew allows.
    fn discard_future(&mut self, now_ms: u64, settings: &SyncSettings) -> usize {
        let horizon = now_ms.saturating_add(settings.future_skew_ms);
        let before = self.buffer.len();
        self.buffer.retain(|input| input.timestamp <= horizon);
        before - self.buffer.len()
    }

    /// Most recently arrived input still inside its relevance window.
    /// Inputs that arrived before it are superseded and removed.
    fn select(&mut self, now_ms: u64, settings: &SyncSettings) -> Option<MoveIntent> {
        let position = self.buffer.iter().rposition(|input| {
            let window = settings.relevance_ms.max(hold_ms(input, settings));
            now_ms.saturating_sub(input.timestamp) <= window
        })?;
        self.buffer.drain(..position);
        self.buffer.front().cloned()
    }

    fn prune(&mut self, now_ms: u64, settings: &SyncSettings) {
        let grace = settings.discard_ms.saturating_sub(settings.relevance_ms);
        self.buffer.retain(|input| {
            let window = settings
                .discard_ms
                .max(hold_ms(input, settings).saturating_add(grace));
            now_ms.saturating_sub(input.timestamp) <= window
        });
    }
}

/// How long an input asks to be held, capped at `max_hold_ms`.
fn hold_ms(input: &MoveIntent, settings: &SyncSettings) -> u64 {
    input.duration.unwrap_or(0).min(settings.max_hold_ms)
}

pub struct InputSynchronizer {
    settings: SyncSettings,
    bounds: PhysicalBounds,
    lanes: [PlayerLane; 2],
    ball: Ball,
    tick: u64,
    last_tick_ms: u64,
}

impl InputSynchronizer {
    pub fn new(config: &ServerConfig) -> Result<Self, ConfigError> {
        config.bounds.validate()?;
        config.sync.validate()?;

        let initial = config.bounds.initial_state();
        let capacity = config.sync.buffer_capacity;
        Ok(Self {
            settings: config.sync.clone(),
            bounds: config.bounds.clone(),
            lanes: [
                PlayerLane::new(initial.paddles[0].y, initial.paddles[0].height, capacity),
                PlayerLane::new(initial.paddles[1].y, initial.paddles[1].height, capacity),
            ],
            ball: initial.ball,
            tick: 0,
            last_tick_ms: 0,
        })
    }

    fn centered_y(&self) -> f32 {
        self.bounds.max_paddle_y() / 2.0
    }

    /// Buffers an input for `slot`, dropping the oldest one when full.
    pub fn add_input(&mut self, slot: PlayerSlot, intent: MoveIntent) {
        let capacity = self.settings.buffer_capacity;
        let lane = &mut self.lanes[slot.index()];
        if lane.buffer.len() >= capacity {
            lane.buffer.pop_front();
            lane.dropped += 1;
        }
        if intent.direction != Direction::None {
            lane.target_y = None;
        }
        lane.buffer.push_back(intent);
    }

    /// Records a desired paddle top edge for `slot`. The request is clamped to
    /// the court; non-finite requests are ignored. Returns the stored target.
    pub fn set_target_position(&mut self, slot: PlayerSlot, y: f32) -> Option<f32> {
        if !y.is_finite() {
            warn!("Ignoring non-finite target position for {:?}", slot);
            return None;
        }
        let clamped = y.clamp(0.0, self.bounds.max_paddle_y());
        self.lanes[slot.index()].target_y = Some(clamped);
        Some(clamped)
    }

    /// Replaces the ball record shared through snapshots.
    pub fn set_ball(&mut self, ball: Ball) {
        if ball.is_finite() {
            self.ball = ball;
        } else {
            warn!("Non-finite ball state received, recentring");
            self.ball = Ball::new(
                self.bounds.canvas_width / 2.0,
                self.bounds.canvas_height / 2.0,
                self.bounds.ball_radius,
            );
        }
    }

    /// Advances every paddle by one fixed step at time `now_ms`.
    pub fn tick(&mut self, now_ms: u64) {
        let max_velocity = self.bounds.max_paddle_velocity;
        let max_y = self.bounds.max_paddle_y();
        let centered = self.centered_y();
        let settings = &self.settings;

        for (index, lane) in self.lanes.iter_mut().enumerate() {
            let early = lane.discard_future(now_ms, settings);
            if early > 0 {
                warn!("Dropped {} future-stamped inputs in lane {}", early, index);
            }

            match lane.select(now_ms, settings) {
                Some(input) => {
                    let intensity = input
                        .intensity
                        .filter(|i| i.is_finite())
                        .unwrap_or(1.0)
                        .clamp(0.0, 1.0);
                    let desired = input.direction.sign() * max_velocity * intensity;
                    lane.vel_y += (desired - lane.vel_y) * settings.acceleration;
                }
                None => match lane.target_y {
                    Some(target) => {
                        let gap = target - lane.y;
                        if gap.abs() <= TARGET_SNAP {
                            lane.y = target;
                            lane.vel_y = 0.0;
                            lane.target_y = None;
                        } else {
                            let desired = gap.clamp(-max_velocity, max_velocity);
                            lane.vel_y += (desired - lane.vel_y) * settings.acceleration;
                        }
                    }
                    None => {
                        lane.vel_y *= settings.velocity_decay;
                        if lane.vel_y.abs() < settings.velocity_epsilon {
                            lane.vel_y = 0.0;
                        }
                    }
                },
            }

            lane.vel_y = lane.vel_y.clamp(-max_velocity, max_velocity);
            lane.y += lane.vel_y;

            if !lane.y.is_finite() || !lane.vel_y.is_finite() {
                warn!("Non-finite paddle state in lane {}, recentring", index);
                lane.y = centered;
                lane.vel_y = 0.0;
                lane.target_y = None;
            }

            if lane.y <= 0.0 || lane.y >= max_y {
                lane.y = lane.y.clamp(0.0, max_y);
                lane.vel_y = 0.0;
            }

            lane.prune(now_ms, settings);
        }

        self.tick += 1;
        self.last_tick_ms = now_ms;

        if self.tick % 60 == 0 {
            trace!(
                "Sync tick {}: paddles at {:.1} / {:.1}",
                self.tick,
                self.lanes[0].y,
                self.lanes[1].y
            );
        }
    }

    /// Writes paddle positions and velocities into the match state.
    pub fn apply_to(&self, state: &mut MatchState) {
        for slot in PlayerSlot::ALL {
            let lane = &self.lanes[slot.index()];
            let paddle = state.paddle_mut(slot);
            paddle.y = lane.y;
            paddle.vel_y = lane.vel_y;
        }
    }

    pub fn get_state(&self) -> SyncSnapshot {
        let snapshot = |slot: PlayerSlot| {
            let lane = &self.lanes[slot.index()];
            PaddleSnapshot {
                slot,
                y: lane.y,
                vel_y: lane.vel_y,
                height: lane.height,
            }
        };

        SyncSnapshot {
            tick: self.tick,
            timestamp: self.last_tick_ms,
            paddles: [snapshot(PlayerSlot::One), snapshot(PlayerSlot::Two)],
            ball: self.ball,
        }
    }

    /// Recentres both paddles and the ball and clears all pending input.
    pub fn reset(&mut self) {
        let centered = self.centered_y();
        for lane in self.lanes.iter_mut() {
            lane.y = centered;
            lane.vel_y = 0.0;
            lane.target_y = None;
            lane.buffer.clear();
        }
        self.ball = Ball::new(
            self.bounds.canvas_width / 2.0,
            self.bounds.canvas_height / 2.0,
            self.bounds.ball_radius,
        );
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn pending_inputs(&self, slot: PlayerSlot) -> usize {
        self.lanes[slot.index()].buffer.len()
    }

    /// Inputs discarded because the buffer was full.
    pub fn dropped_inputs(&self, slot: PlayerSlot) -> u64 {
        self.lanes[slot.index()].dropped
    }
}
