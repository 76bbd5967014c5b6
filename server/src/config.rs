//! Configuration surface for the match core.
//!
//! Everything tunable from outside lives here: physical bounds of the court,
//! the difficulty table, and the timing of the opponent, synchronizer,
//! validator and session. A [`ServerConfig`] is validated once at startup;
//! any unknown tier or non-positive bound is fatal.

use crate::difficulty::DifficultyTable;
use serde::{Deserialize, Serialize};
use shared::{
    Canvas, MatchState, BALL_RADIUS, CANVAS_HEIGHT, CANVAS_WIDTH, PADDLE_HEIGHT, PADDLE_INSET,
    PADDLE_WIDTH, TICK_RATE_HZ,
};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown difficulty tier '{0}'")]
    UnknownDifficulty(String),

    #[error("invalid bound {field}: {value}")]
    InvalidBound { field: &'static str, value: f64 },

    #[error("invalid difficulty profile '{tier}': {reason}")]
    InvalidProfile { tier: String, reason: String },

    #[error("difficulty table is empty")]
    EmptyDifficultyTable,

    #[error("failed to read config: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] serde_json::Error),
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidBound { field, value })
    }
}

fn require_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidBound { field, value })
    }
}

/// Court geometry and speed limits. Velocities are in pixels per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalBounds {
    pub canvas_width: f32,
    pub canvas_height: f32,
    pub paddle_width: f32,
    pub paddle_height: f32,
    /// Horizontal gap between a paddle and its side wall.
    pub paddle_inset: f32,
    pub ball_radius: f32,
    pub max_paddle_velocity: f32,
    pub min_ball_speed: f32,
    pub max_ball_speed: f32,
    pub serve_speed: f32,
    /// Vertical speed given to a ball striking the very edge of a paddle.
    pub max_bounce_speed: f32,
    /// Horizontal speed factor applied on every paddle hit.
    pub hit_speedup: f32,
    pub points_to_win: u32,
}

impl Default for PhysicalBounds {
    fn default() -> Self {
        Self {
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            paddle_width: PADDLE_WIDTH,
            paddle_height: PADDLE_HEIGHT,
            paddle_inset: PADDLE_INSET,
            ball_radius: BALL_RADIUS,
            max_paddle_velocity: 8.0,
            min_ball_speed: 2.0,
            max_ball_speed: 24.0,
            serve_speed: 5.0,
            max_bounce_speed: 6.0,
            hit_speedup: 1.05,
            points_to_win: 11,
        }
    }
}

impl PhysicalBounds {
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.canvas_width,
            height: self.canvas_height,
        }
    }

    /// A fresh, inactive match laid out for these bounds.
    pub fn initial_state(&self) -> MatchState {
        MatchState::new(
            self.canvas(),
            self.paddle_width,
            self.paddle_height,
            self.paddle_inset,
            self.ball_radius,
        )
    }

    /// Lowest legal paddle top edge is 0; this is the highest.
    pub fn max_paddle_y(&self) -> f32 {
        self.canvas_height - self.paddle_height
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("canvas_width", self.canvas_width as f64)?;
        require_positive("canvas_height", self.canvas_height as f64)?;
        require_positive("paddle_width", self.paddle_width as f64)?;
        require_positive("paddle_height", self.paddle_height as f64)?;
        require_positive("ball_radius", self.ball_radius as f64)?;
        require_positive("max_paddle_velocity", self.max_paddle_velocity as f64)?;
        require_positive("min_ball_speed", self.min_ball_speed as f64)?;
        require_positive("max_ball_speed", self.max_ball_speed as f64)?;
        require_positive("serve_speed", self.serve_speed as f64)?;
        require_positive("max_bounce_speed", self.max_bounce_speed as f64)?;
        require_positive("hit_speedup", self.hit_speedup as f64)?;
        require_positive("points_to_win", self.points_to_win as f64)?;

        if !(self.paddle_inset.is_finite() && self.paddle_inset >= 0.0) {
            return Err(ConfigError::InvalidBound {
                field: "paddle_inset",
                value: self.paddle_inset as f64,
            });
        }
        if self.paddle_height >= self.canvas_height {
            return Err(ConfigError::InvalidBound {
                field: "paddle_height",
                value: self.paddle_height as f64,
            });
        }
        if self.max_ball_speed <= self.min_ball_speed {
            return Err(ConfigError::InvalidBound {
                field: "max_ball_speed",
                value: self.max_ball_speed as f64,
            });
        }
        if self.serve_speed < self.min_ball_speed || self.serve_speed > self.max_ball_speed {
            return Err(ConfigError::InvalidBound {
                field: "serve_speed",
                value: self.serve_speed as f64,
            });
        }
        Ok(())
    }
}

/// Opponent sampling cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpponentTiming {
    pub cadence_ms: u64,
    pub tolerance_ms: u64,
}

impl Default for OpponentTiming {
    fn default() -> Self {
        Self {
            cadence_ms: 1000,
            tolerance_ms: 50,
        }
    }
}

impl OpponentTiming {
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }

    /// Shortest gap between two accepted samples.
    pub fn min_gap(&self) -> Duration {
        Duration::from_millis(self.cadence_ms.saturating_sub(self.tolerance_ms))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("cadence_ms", self.cadence_ms as f64)?;
        if self.tolerance_ms >= self.cadence_ms {
            return Err(ConfigError::InvalidBound {
                field: "tolerance_ms",
                value: self.tolerance_ms as f64,
            });
        }
        Ok(())
    }
}

/// Input synchronizer tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub tick_rate_hz: u32,
    pub buffer_capacity: usize,
    /// Inputs older than this are not selected for a tick.
    pub relevance_ms: u64,
    /// Inputs older than this are dropped from the buffer.
    pub discard_ms: u64,
    /// Ceiling on how long one input may keep a paddle driven.
    pub max_hold_ms: u64,
    /// Inputs stamped further ahead of the tick clock than this are dropped.
    pub future_skew_ms: u64,
    /// Fraction of the gap to the commanded velocity closed each tick.
    pub acceleration: f32,
    /// Per-tick velocity multiplier while no input is present.
    pub velocity_decay: f32,
    /// Velocities below this snap to zero.
    pub velocity_epsilon: f32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            tick_rate_hz: TICK_RATE_HZ,
            buffer_capacity: 16,
            relevance_ms: 100,
            discard_ms: 150,
            max_hold_ms: 750,
            future_skew_ms: 50,
            acceleration: 0.35,
            velocity_decay: 0.75,
            velocity_epsilon: 0.01,
        }
    }
}

impl SyncSettings {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("tick_rate_hz", self.tick_rate_hz as f64)?;
        require_positive("buffer_capacity", self.buffer_capacity as f64)?;
        require_positive("relevance_ms", self.relevance_ms as f64)?;
        require_positive("max_hold_ms", self.max_hold_ms as f64)?;
        require_positive("velocity_epsilon", self.velocity_epsilon as f64)?;
        if self.discard_ms < self.relevance_ms {
            return Err(ConfigError::InvalidBound {
                field: "discard_ms",
                value: self.discard_ms as f64,
            });
        }
        if !(self.acceleration.is_finite() && self.acceleration > 0.0 && self.acceleration <= 1.0) {
            return Err(ConfigError::InvalidBound {
                field: "acceleration",
                value: self.acceleration as f64,
            });
        }
        require_fraction("velocity_decay", self.velocity_decay as f64)
    }
}

/// Plausibility ranges used by the state validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    pub min_canvas_width: f32,
    pub max_canvas_width: f32,
    pub min_canvas_height: f32,
    pub max_canvas_height: f32,
    /// How far beyond the canvas edge a ball may sit before it becomes an error.
    pub ball_margin: f32,
    pub min_paddle_height: f32,
    pub max_paddle_height: f32,
    pub min_paddle_width: f32,
    pub max_paddle_width: f32,
    pub desync_tolerance: f32,
    pub stale_after_ms: u64,
    pub future_skew_ms: u64,
    pub history_capacity: usize,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            min_canvas_width: 320.0,
            max_canvas_width: 3840.0,
            min_canvas_height: 240.0,
            max_canvas_height: 2160.0,
            ball_margin: 100.0,
            min_paddle_height: 20.0,
            max_paddle_height: 300.0,
            min_paddle_width: 2.0,
            max_paddle_width: 50.0,
            desync_tolerance: 10.0,
            stale_after_ms: 5000,
            future_skew_ms: 1000,
            history_capacity: 32,
        }
    }
}

impl ValidatorSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("min_canvas_width", self.min_canvas_width as f64)?;
        require_positive("min_canvas_height", self.min_canvas_height as f64)?;
        require_positive("min_paddle_height", self.min_paddle_height as f64)?;
        require_positive("min_paddle_width", self.min_paddle_width as f64)?;
        require_positive("desync_tolerance", self.desync_tolerance as f64)?;
        require_positive("stale_after_ms", self.stale_after_ms as f64)?;
        require_positive("history_capacity", self.history_capacity as f64)?;
        if self.max_canvas_width < self.min_canvas_width {
            return Err(ConfigError::InvalidBound {
                field: "max_canvas_width",
                value: self.max_canvas_width as f64,
            });
        }
        if self.max_canvas_height < self.min_canvas_height {
            return Err(ConfigError::InvalidBound {
                field: "max_canvas_height",
                value: self.max_canvas_height as f64,
            });
        }
        if self.max_paddle_height < self.min_paddle_height {
            return Err(ConfigError::InvalidBound {
                field: "max_paddle_height",
                value: self.max_paddle_height as f64,
            });
        }
        if self.max_paddle_width < self.min_paddle_width {
            return Err(ConfigError::InvalidBound {
                field: "max_paddle_width",
                value: self.max_paddle_width as f64,
            });
        }
        if !(self.ball_margin.is_finite() && self.ball_margin >= 0.0) {
            return Err(ConfigError::InvalidBound {
                field: "ball_margin",
                value: self.ball_margin as f64,
            });
        }
        Ok(())
    }
}

/// Per-match session cadence and registry capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub broadcast_every_ticks: u64,
    pub validate_every_ticks: u64,
    /// Consecutive validation passes with critical errors before a resync is requested.
    pub resync_after_criticals: u32,
    pub max_matches: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            broadcast_every_ticks: 2,
            validate_every_ticks: 60,
            resync_after_criticals: 3,
            max_matches: 64,
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("broadcast_every_ticks", self.broadcast_every_ticks as f64)?;
        require_positive("validate_every_ticks", self.validate_every_ticks as f64)?;
        require_positive("resync_after_criticals", self.resync_after_criticals as f64)?;
        require_positive("max_matches", self.max_matches as f64)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bounds: PhysicalBounds,
    pub difficulties: DifficultyTable,
    pub opponent: OpponentTiming,
    pub sync: SyncSettings,
    pub validator: ValidatorSettings,
    pub session: SessionSettings,
}

impl ServerConfig {
    /// Loads and validates a JSON config file. Missing sections take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_json::from_str(contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate()?;
        self.opponent.validate()?;
        self.difficulties.validate(self.opponent.cadence_ms)?;
        self.sync.validate()?;
        self.validator.validate()?;
        self.session.validate()
    }
}
