//! # State Validator
//!
//! Plausibility checks over an authoritative [`MatchState`] and over
//! client-reported copies of it. The validator never mutates what it is
//! given; every finding is returned as plain data that the caller may
//! broadcast, log or ignore.
//!
//! A match is only *invalid* when a finding of severity [`Severity::High`] or
//! [`Severity::Critical`] is present. Low and medium errors, and every
//! warning, are advisory.

use crate::config::{ConfigError, PhysicalBounds, ServerConfig, ValidatorSettings};
use crate::physics::Vector2;
use crate::utils::{describe, get_timestamp};
use log::warn;
use serde::{Deserialize, Serialize};
use shared::{MatchState, PlayerSlot, Score};
use std::collections::VecDeque;

/// Slack allowed on geometric comparisons to absorb float rounding.
const GEOMETRY_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Whether a finding of this severity makes the state invalid.
    pub fn invalidates(self) -> bool {
        self >= Severity::High
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidCanvas,
    NonFiniteValue,
    BallOutOfBounds,
    BallSpeedTooHigh,
    BallSpeedTooLow,
    PaddleOutOfBounds,
    InvalidPaddleSize,
    NegativeScore,
    ScoreInconsistent,
    FutureTimestamp,
    StaleState,
    BallDesync,
    PaddleDesync,
    ScoreMismatch,
    CanvasMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: ErrorCode,
    pub message: String,
    pub severity: Severity,
    pub field: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn has_critical(&self) -> bool {
        self.errors.iter().any(|e| e.severity == Severity::Critical)
    }

    pub fn error_codes(&self) -> Vec<ErrorCode> {
        self.errors.iter().map(|e| e.code).collect()
    }

    pub fn warning_codes(&self) -> Vec<ErrorCode> {
        self.warnings.iter().map(|w| w.code).collect()
    }
}

/// Score as recorded for a player outside the match state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub slot: PlayerSlot,
    pub score: i32,
}

/// Outcome of comparing a client-reported state against the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub ball_distance: f32,
    pub paddle_distances: [f32; 2],
    pub result: ValidationResult,
}

/// Accumulates findings in check order.
#[derive(Default)]
struct Findings {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Findings {
    fn issue(
        code: ErrorCode,
        severity: Severity,
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        message: impl Into<String>,
    ) -> ValidationIssue {
        ValidationIssue {
            code,
            message: message.into(),
            severity,
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    fn error(
        &mut self,
        code: ErrorCode,
        severity: Severity,
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.errors
            .push(Self::issue(code, severity, field, expected, actual, message));
    }

    fn warning(
        &mut self,
        code: ErrorCode,
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.warnings
            .push(Self::issue(code, Severity::Low, field, expected, actual, message));
    }

    fn finish(self) -> ValidationResult {
        let is_valid = !self.errors.iter().any(|e| e.severity.invalidates());
        ValidationResult {
            is_valid,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

fn slot_name(slot: PlayerSlot) -> &'static str {
    match slot {
        PlayerSlot::One => "one",
        PlayerSlot::Two => "two",
    }
}

/// Bounded history of the most recent authoritative snapshots for one
/// match. Diagnostic only.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    capacity: usize,
    snapshots: VecDeque<MatchState>,
}

impl SnapshotHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            snapshots: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, state: &MatchState) {
        if self.snapshots.len() >= self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(state.clone());
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&MatchState> {
        self.snapshots.back()
    }

    /// Largest ball displacement between two consecutive snapshots.
    pub fn max_ball_step(&self) -> Option<f32> {
        self.snapshots
            .iter()
            .zip(self.snapshots.iter().skip(1))
            .map(|(a, b)| Vector2::from(&a.ball).distance(&Vector2::from(&b.ball)))
            .filter(|d| d.is_finite())
            .fold(None, |max, d| Some(max.map_or(d, |m: f32| m.max(d))))
    }

    /// Number of consecutive snapshot pairs in which either score went down.
    pub fn score_regressions(&self) -> usize {
        self.snapshots
            .iter()
            .zip(self.snapshots.iter().skip(1))
            .filter(|(a, b)| b.score.one < a.score.one || b.score.two < a.score.two)
            .count()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

pub struct StateValidator {
    settings: ValidatorSettings,
    bounds: PhysicalBounds,
    history: SnapshotHistory,
}

impl StateValidator {
    pub fn new(config: &ServerConfig) -> Result<Self, ConfigError> {
        config.bounds.validate()?;
        config.validator.validate()?;
        Ok(Self {
            settings: config.validator.clone(),
            bounds: config.bounds.clone(),
            history: SnapshotHistory::new(config.validator.history_capacity),
        })
    }

    /// Runs every check against `state` using the current wall clock.
    pub fn validate(&self, state: &MatchState, players: &[PlayerRecord]) -> ValidationResult {
        self.validate_at(state, players, get_timestamp())
    }

    /// Runs every check against `state` as if the time were `now_ms`.
    pub fn validate_at(
        &self,
        state: &MatchState,
        players: &[PlayerRecord],
        now_ms: u64,
    ) -> ValidationResult {
        let mut findings = Findings::default();

        self.check_canvas(state, &mut findings);
        self.check_ball(state, &mut findings);
        for slot in PlayerSlot::ALL {
            self.check_paddle(state, slot, &mut findings);
        }
        Self::check_scores(&state.score, players, &mut findings);
        self.check_timestamp(state.last_update, now_ms, &mut findings);

        let result = findings.finish();
        for error in result.errors.iter().filter(|e| e.severity.invalidates()) {
            warn!("Validation {:?} on {}: {}", error.code, error.field, error.message);
        }
        result
    }

    /// Measures how far a client-reported state has drifted from the
    /// authoritative one. Positional drift is tolerated up to the configured
    /// pixel distance; any score difference is critical.
    pub fn compare(&self, client: &MatchState, server: &MatchState) -> ComparisonReport {
        let mut findings = Findings::default();
        let tolerance = self.settings.desync_tolerance;

        let ball_distance = self.distance(
            Vector2::from(&client.ball),
            Vector2::from(&server.ball),
            "ball",
            &mut findings,
        );
        if ball_distance > tolerance {
            findings.warning(
                ErrorCode::BallDesync,
                "ball",
                format!("<= {}", describe(tolerance)),
                describe(ball_distance),
                "Client ball position diverged from server",
            );
        }

        let mut paddle_distances = [0.0; 2];
        for slot in PlayerSlot::ALL {
            let field = format!("paddles.{}", slot_name(slot));
            let distance = self.distance(
                Vector2::from(client.paddle(slot)),
                Vector2::from(server.paddle(slot)),
                &field,
                &mut findings,
            );
            paddle_distances[slot.index()] = distance;
            if distance > tolerance {
                findings.warning(
                    ErrorCode::PaddleDesync,
                    field,
                    format!("<= {}", describe(tolerance)),
                    describe(distance),
                    "Client paddle position diverged from server",
                );
            }
        }

        for slot in PlayerSlot::ALL {
            let (reported, actual) = (client.score.get(slot), server.score.get(slot));
            if reported != actual {
                findings.error(
                    ErrorCode::ScoreMismatch,
                    Severity::Critical,
                    format!("score.{}", slot_name(slot)),
                    actual.to_string(),
                    reported.to_string(),
                    "Client score differs from server",
                );
            }
        }

        if client.canvas != server.canvas {
            findings.warning(
                ErrorCode::CanvasMismatch,
                "canvas",
                format!("{}x{}", server.canvas.width, server.canvas.height),
                format!("{}x{}", describe(client.canvas.width), describe(client.canvas.height)),
                "Client canvas differs from server",
            );
        }

        ComparisonReport {
            ball_distance,
            paddle_distances,
            result: findings.finish(),
        }
    }

    /// Appends `state` to the diagnostic history.
    pub fn record(&mut self, state: &MatchState) {
        self.history.push(state);
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    /// Drops the history; called when the match ends.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn distance(&self, a: Vector2, b: Vector2, field: &str, findings: &mut Findings) -> f32 {
        let distance = a.distance(&b);
        if distance.is_finite() {
            return distance;
        }
        findings.error(
            ErrorCode::NonFiniteValue,
            Severity::Critical,
            field,
            "finite position",
            format!("({}, {})", describe(a.x), describe(a.y)),
            "Reported position is not a finite number",
        );
        f32::MAX
    }

    fn check_canvas(&self, state: &MatchState, findings: &mut Findings) {
        let s = &self.settings;
        let checks = [
            ("canvas.width", state.canvas.width, s.min_canvas_width, s.max_canvas_width),
            ("canvas.height", state.canvas.height, s.min_canvas_height, s.max_canvas_height),
        ];
        for (field, value, min, max) in checks {
            if !value.is_finite() {
                findings.error(
                    ErrorCode::NonFiniteValue,
                    Severity::Critical,
                    field,
                    "finite",
                    describe(value),
                    "Canvas dimension is not a finite number",
                );
            } else if value < min || value > max {
                findings.error(
                    ErrorCode::InvalidCanvas,
                    Severity::High,
                    field,
                    format!("{}..={}", min, max),
                    describe(value),
                    "Canvas dimension outside plausible range",
                );
            }
        }
    }

    fn check_ball(&self, state: &MatchState, findings: &mut Findings) {
        let ball = &state.ball;
        if !ball.is_finite() {
            findings.error(
                ErrorCode::NonFiniteValue,
                Severity::Critical,
                "ball",
                "finite position and velocity",
                format!(
                    "({}, {}) v=({}, {})",
                    describe(ball.x),
                    describe(ball.y),
                    describe(ball.vel_x),
                    describe(ball.vel_y)
                ),
                "Ball contains a non-finite value",
            );
            return;
        }

        let canvas = &state.canvas;
        let overshoot = [
            ("ball.x", -(ball.x + ball.radius)),
            ("ball.x", ball.x - ball.radius - canvas.width),
            ("ball.y", -(ball.y + ball.radius)),
            ("ball.y", ball.y - ball.radius - canvas.height),
        ];
        if let Some((field, distance)) = overshoot
            .into_iter()
            .filter(|(_, d)| *d > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
        {
            let expected = format!("within {} px of the canvas", self.settings.ball_margin);
            let actual = format!("{} px outside", describe(distance));
            if distance <= self.settings.ball_margin {
                findings.warning(
                    ErrorCode::BallOutOfBounds,
                    field,
                    expected,
                    actual,
                    "Ball is fully outside the canvas",
                );
            } else {
                findings.error(
                    ErrorCode::BallOutOfBounds,
                    Severity::High,
                    field,
                    expected,
                    actual,
                    "Ball is beyond the out-of-canvas margin",
                );
            }
        }

        let speed = ball.speed();
        if speed > self.bounds.max_ball_speed + GEOMETRY_EPSILON {
            findings.error(
                ErrorCode::BallSpeedTooHigh,
                Severity::High,
                "ball.speed",
                format!("<= {}", self.bounds.max_ball_speed),
                describe(speed),
                "Ball is moving faster than allowed",
            );
        } else if state.is_running() && speed < self.bounds.min_ball_speed - GEOMETRY_EPSILON {
            findings.error(
                ErrorCode::BallSpeedTooLow,
                Severity::Medium,
                "ball.speed",
                format!(">= {}", self.bounds.min_ball_speed),
                describe(speed),
                "Ball is moving slower than allowed during play",
            );
        }
    }

    fn check_paddle(&self, state: &MatchState, slot: PlayerSlot, findings: &mut Findings) {
        let paddle = state.paddle(slot);
        let field = format!("paddles.{}", slot_name(slot));

        if !paddle.is_finite() {
            findings.error(
                ErrorCode::NonFiniteValue,
                Severity::Critical,
                field,
                "finite position and size",
                format!("y={} h={}", describe(paddle.y), describe(paddle.height)),
                "Paddle contains a non-finite value",
            );
            return;
        }

        let s = &self.settings;
        if paddle.height < s.min_paddle_height
            || paddle.height > s.max_paddle_height
            || paddle.width < s.min_paddle_width
            || paddle.width > s.max_paddle_width
        {
            findings.error(
                ErrorCode::InvalidPaddleSize,
                Severity::Medium,
                format!("{}.size", field),
                format!(
                    "{}..={} x {}..={}",
                    s.min_paddle_width, s.max_paddle_width, s.min_paddle_height, s.max_paddle_height
                ),
                format!("{}x{}", describe(paddle.width), describe(paddle.height)),
                "Paddle size outside plausible range",
            );
        }

        let canvas = &state.canvas;
        if paddle.y < -GEOMETRY_EPSILON || paddle.y + paddle.height > canvas.height + GEOMETRY_EPSILON {
            findings.error(
                ErrorCode::PaddleOutOfBounds,
                Severity::High,
                format!("{}.y", field),
                format!("0..={}", describe(canvas.height - paddle.height)),
                describe(paddle.y),
                "Paddle is outside the vertical bounds",
            );
        }
        if paddle.x < -GEOMETRY_EPSILON || paddle.x + paddle.width > canvas.width + GEOMETRY_EPSILON {
            findings.error(
                ErrorCode::PaddleOutOfBounds,
                Severity::High,
                format!("{}.x", field),
                format!("0..={}", describe(canvas.width - paddle.width)),
                describe(paddle.x),
                "Paddle is outside the horizontal bounds",
            );
        }
    }

    fn check_scores(score: &Score, players: &[PlayerRecord], findings: &mut Findings) {
        for slot in PlayerSlot::ALL {
            let value = score.get(slot);
            if value < 0 {
                findings.error(
                    ErrorCode::NegativeScore,
                    Severity::Critical,
                    format!("score.{}", slot_name(slot)),
                    ">= 0",
                    value.to_string(),
                    "Score cannot be negative",
                );
            }
        }

        for record in players {
            let value = score.get(record.slot);
            if value != record.score {
                findings.error(
                    ErrorCode::ScoreInconsistent,
                    Severity::Critical,
                    format!("score.{}", slot_name(record.slot)),
                    record.score.to_string(),
                    value.to_string(),
                    "Score does not match the player record",
                );
            }
        }
    }

    fn check_timestamp(&self, last_update: u64, now_ms: u64, findings: &mut Findings) {
        // Zero means the state has never been stamped.
        if last_update == 0 {
            return;
        }

        if last_update > now_ms + self.settings.future_skew_ms {
            findings.error(
                ErrorCode::FutureTimestamp,
                Severity::Medium,
                "last_update",
                format!("<= {}", now_ms),
                last_update.to_string(),
                "State timestamp is in the future",
            );
        } else if now_ms.saturating_sub(last_update) > self.settings.stale_after_ms {
            findings.warning(
                ErrorCode::StaleState,
                "last_update",
                format!(">= {}", now_ms.saturating_sub(self.settings.stale_after_ms)),
                last_update.to_string(),
                "State has not been updated recently",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000_000;

    fn validator() -> StateValidator {
        StateValidator::new(&ServerConfig::default()).unwrap()
    }

    fn playing_state() -> MatchState {
        let mut state = PhysicalBounds::default().initial_state();
        state.active = true;
        state.ball.vel_x = 5.0;
        state.last_update = NOW;
        state
    }

    #[test]
    fn test_fresh_state_is_clean() {
        let result = validator().validate_at(&playing_state(), &[], NOW);
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_negative_score_is_critical() {
        let mut state = playing_state();
        state.score = Score { one: -1, two: 3 };
        let result = validator().validate_at(&state, &[], NOW);
        assert!(!result.is_valid);
        assert!(result.has_critical());
        assert_eq!(result.error_codes(), vec![ErrorCode::NegativeScore]);
        assert_eq!(result.errors[0].field, "score.one");
        assert_eq!(result.errors[0].actual, "-1");
    }

    #[test]
    fn test_score_must_match_player_records() {
        let mut state = playing_state();
        state.score = Score { one: 2, two: 3 };
        let players = [
            PlayerRecord { slot: PlayerSlot::One, score: 2 },
            PlayerRecord { slot: PlayerSlot::Two, score: 4 },
        ];
        let result = validator().validate_at(&state, &players, NOW);
        assert!(!result.is_valid);
        assert_eq!(result.error_codes(), vec![ErrorCode::ScoreInconsistent]);
        assert_eq!(result.errors[0].expected, "4");
    }

    #[test]
    fn test_ball_just_outside_is_warning() {
        let mut state = playing_state();
        state.ball.y = -40.0;
        let result = validator().validate_at(&state, &[], NOW);
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.warning_codes(), vec![ErrorCode::BallOutOfBounds]);
        assert_eq!(result.warnings[0].field, "ball.y");
    }

    #[test]
    fn test_ball_partially_outside_is_fine() {
        let mut state = playing_state();
        state.ball.y = 5.0;
        let result = validator().validate_at(&state, &[], NOW);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_ball_far_outside_is_error() {
        let mut state = playing_state();
        state.ball.x = 1000.0;
        let result = validator().validate_at(&state, &[], NOW);
        assert!(!result.is_valid);
        assert_eq!(result.error_codes(), vec![ErrorCode::BallOutOfBounds]);
    }

    #[test]
    fn test_non_finite_ball_is_critical() {
        let mut state = playing_state();
        state.ball.vel_y = f32::NAN;
        let result = validator().validate_at(&state, &[], NOW);
        assert!(result.has_critical());
        assert_eq!(result.error_codes(), vec![ErrorCode::NonFiniteValue]);
    }

    #[test]
    fn test_ball_speed_band() {
        let mut state = playing_state();
        state.ball.vel_x = 30.0;
        let result = validator().validate_at(&state, &[], NOW);
        assert_eq!(result.error_codes(), vec![ErrorCode::BallSpeedTooHigh]);
        assert!(!result.is_valid);

        state.ball.vel_x = 1.0;
        let result = validator().validate_at(&state, &[], NOW);
        assert_eq!(result.error_codes(), vec![ErrorCode::BallSpeedTooLow]);
        assert!(result.is_valid);

        state.active = false;
        let result = validator().validate_at(&state, &[], NOW);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_paddle_out_of_bounds() {
        let mut state = playing_state();
        state.paddles[1].y = 550.0;
        let result = validator().validate_at(&state, &[], NOW);
        assert!(!result.is_valid);
        assert_eq!(result.error_codes(), vec![ErrorCode::PaddleOutOfBounds]);
        assert_eq!(result.errors[0].field, "paddles.two.y");
    }

    #[test]
    fn test_paddle_size_is_advisory() {
        let mut state = playing_state();
        state.paddles[0].height = 10.0;
        let result = validator().validate_at(&state, &[], NOW);
        assert!(result.is_valid);
        assert_eq!(result.error_codes(), vec![ErrorCode::InvalidPaddleSize]);
        assert_eq!(result.errors[0].severity, Severity::Medium);
    }

    #[test]
    fn test_canvas_range() {
        let mut state = playing_state();
        state.canvas.width = 100.0;
        let result = validator().validate_at(&state, &[], NOW);
        assert!(result.error_codes().contains(&ErrorCode::InvalidCanvas));
        assert!(!result.is_valid);
    }

    #[test]
    fn test_timestamp_checks() {
        let mut state = playing_state();
        state.last_update = NOW + 5_000;
        let result = validator().validate_at(&state, &[], NOW);
        assert_eq!(result.error_codes(), vec![ErrorCode::FutureTimestamp]);
        assert!(result.is_valid);

        state.last_update = NOW - 10_000;
        let result = validator().validate_at(&state, &[], NOW);
        assert!(result.errors.is_empty());
        assert_eq!(result.warning_codes(), vec![ErrorCode::StaleState]);
    }

    #[test]
    fn test_compare_identical_states() {
        let state = playing_state();
        let report = validator().compare(&state, &state.clone());
        assert_eq!(report.ball_distance, 0.0);
        assert_eq!(report.paddle_distances, [0.0, 0.0]);
        assert!(report.result.is_valid);
        assert!(report.result.errors.is_empty());
        assert!(report.result.warnings.is_empty());
    }

    #[test]
    fn test_compare_reports_desync() {
        let server = playing_state();
        let mut client = server.clone();
        client.ball.x += 30.0;
        client.ball.y += 40.0;
        client.paddles[0].y += 5.0;
        client.paddles[1].y += 25.0;

        let report = validator().compare(&client, &server);
        assert_eq!(report.ball_distance, 50.0);
        assert_eq!(report.paddle_distances, [5.0, 25.0]);
        assert!(report.result.is_valid);
        assert_eq!(
            report.result.warning_codes(),
            vec![ErrorCode::BallDesync, ErrorCode::PaddleDesync]
        );
    }

    #[test]
    fn test_compare_score_mismatch_is_critical() {
        let server = playing_state();
        let mut client = server.clone();
        client.score.two = 1;
        let report = validator().compare(&client, &server);
        assert!(!report.result.is_valid);
        assert_eq!(report.result.error_codes(), vec![ErrorCode::ScoreMismatch]);
        assert!(report.result.warnings.is_empty());
    }

    #[test]
    fn test_compare_non_finite_client() {
        let server = playing_state();
        let mut client = server.clone();
        client.ball.x = f32::INFINITY;
        let report = validator().compare(&client, &server);
        assert_eq!(report.ball_distance, f32::MAX);
        assert!(report.result.has_critical());
    }

    #[test]
    fn test_validate_does_not_mutate() {
        let mut state = playing_state();
        state.ball.y = -500.0;
        state.score.one = -3;
        let before = state.clone();
        let _ = validator().validate_at(&state, &[], NOW);
        assert_eq!(state, before);
    }

    #[test]
    fn test_history_is_bounded_and_diagnostic() {
        let mut validator = validator();
        let mut state = playing_state();
        for i in 0..40 {
            state.ball.x = 100.0 + i as f32 * 5.0;
            validator.record(&state);
        }
        assert_eq!(validator.history().len(), 32);
        assert_eq!(validator.history().max_ball_step(), Some(5.0));
        assert_eq!(validator.history().score_regressions(), 0);

        state.score.one = 4;
        validator.record(&state);
        state.score.one = 2;
        validator.record(&state);
        assert_eq!(validator.history().score_regressions(), 1);

        // History never influences validity.
        assert!(validator.validate_at(&state, &[], NOW).is_valid);

        validator.clear_history();
        assert!(validator.history().is_empty());
        assert_eq!(validator.history().max_ball_step(), None);
    }

    #[test]
    fn test_result_serializes() {
        let mut state = playing_state();
        state.score.one = -1;
        let result = validator().validate_at(&state, &[], NOW);

        let bytes = bincode::serialize(&result).unwrap();
        let decoded: ValidationResult = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, result);

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("NEGATIVE_SCORE"));
        assert!(json.contains("critical"));
    }
}
