//! Match rules applied to the authoritative state between synchronizer ticks:
//! ball travel, wall and paddle contact, scoring, serving and the winner.
//! Paddle positions are read here but only ever written by the synchronizer.

use crate::config::PhysicalBounds;
use crate::physics::{bounce_off_walls, deflect_from_paddle, hits_paddle};
use crate::random::RandomSource;
use log::info;
use serde::{Deserialize, Serialize};
use shared::{MatchState, PlayerSlot};

/// What happened to the ball during one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallOutcome {
    InPlay,
    Returned(PlayerSlot),
    Scored { scorer: PlayerSlot },
}

/// Places the ball at the centre moving toward `toward` at serve speed.
pub fn serve(state: &mut MatchState, toward: PlayerSlot, bounds: &PhysicalBounds, rng: &mut dyn RandomSource) {
    let ball = &mut state.ball;
    ball.x = state.canvas.width / 2.0;
    ball.y = state.canvas.height / 2.0;
    ball.radius = bounds.ball_radius;

    let vel_y = rng.symmetric() * bounds.serve_speed * 0.5;
    let vel_x = (bounds.serve_speed * bounds.serve_speed - vel_y * vel_y).sqrt();
    ball.vel_x = vel_x * toward.incoming_sign();
    ball.vel_y = vel_y;
}

/// Marks the match running and serves toward a random side.
pub fn start(state: &mut MatchState, bounds: &PhysicalBounds, rng: &mut dyn RandomSource) {
    state.active = true;
    state.paused = false;
    state.winner = None;
    let toward = if rng.chance(0.5) { PlayerSlot::One } else { PlayerSlot::Two };
    serve(state, toward, bounds, rng);
    info!("Match started, serving toward {:?}", toward);
}

/// Advances the ball by one tick. Does nothing unless the match is running.
pub fn advance_ball(state: &mut MatchState, bounds: &PhysicalBounds) -> BallOutcome {
    if !state.is_running() {
        return BallOutcome::InPlay;
    }

    state.ball.x += state.ball.vel_x;
    state.ball.y += state.ball.vel_y;
    bounce_off_walls(&mut state.ball, &state.canvas);

    for slot in PlayerSlot::ALL {
        let paddle = state.paddles[slot.index()];
        if hits_paddle(&state.ball, &paddle, slot) {
            deflect_from_paddle(
                &mut state.ball,
                &paddle,
                slot,
                bounds.max_bounce_speed,
                bounds.hit_speedup,
                bounds.max_ball_speed,
            );
            return BallOutcome::Returned(slot);
        }
    }

    if state.ball.x + state.ball.radius < 0.0 {
        return BallOutcome::Scored {
            scorer: PlayerSlot::Two,
        };
    }
    if state.ball.x - state.ball.radius > state.canvas.width {
        return BallOutcome::Scored {
            scorer: PlayerSlot::One,
        };
    }
    BallOutcome::InPlay
}

/// Credits `scorer` and either ends the match or serves toward the side that
/// conceded. Returns the winner when the match is over.
pub fn award_point(
    state: &mut MatchState,
    scorer: PlayerSlot,
    bounds: &PhysicalBounds,
    rng: &mut dyn RandomSource,
) -> Option<PlayerSlot> {
    state.score.increment(scorer);
    info!(
        "{:?} scored ({} - {})",
        scorer, state.score.one, state.score.two
    );

    if state.score.get(scorer) >= bounds.points_to_win as i32 {
        state.winner = Some(scorer);
        state.active = false;
        state.ball.vel_x = 0.0;
        state.ball.vel_y = 0.0;
        state.ball.x = state.canvas.width / 2.0;
        state.ball.y = state.canvas.height / 2.0;
        info!("{:?} wins the match", scorer);
        return Some(scorer);
    }

    serve(state, scorer.opponent(), bounds, rng);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;
    use assert_approx_eq::assert_approx_eq;

    fn running() -> (MatchState, PhysicalBounds) {
        let bounds = PhysicalBounds::default();
        let mut state = bounds.initial_state();
        state.active = true;
        (state, bounds)
    }

    #[test]
    fn test_serve_speed_and_direction() {
        let (mut state, bounds) = running();
        let mut rng = ScriptedRandom::constant(0.9);
        serve(&mut state, PlayerSlot::One, &bounds, &mut rng);
        assert!(state.ball.vel_x < 0.0);
        assert_approx_eq!(state.ball.speed(), bounds.serve_speed, 1e-4);
        assert_eq!(state.ball.x, 400.0);
    }

    #[test]
    fn test_paused_ball_does_not_move() {
        let (mut state, bounds) = running();
        state.paused = true;
        state.ball.vel_x = 5.0;
        let before = state.ball;
        assert_eq!(advance_ball(&mut state, &bounds), BallOutcome::InPlay);
        assert_eq!(state.ball, before);
    }

    #[test]
    fn test_right_paddle_returns_ball() {
        let (mut state, bounds) = running();
        state.ball.x = 755.0;
        state.ball.y = 300.0;
        state.ball.vel_x = 6.0;
        assert_eq!(advance_ball(&mut state, &bounds), BallOutcome::Returned(PlayerSlot::Two));
        assert!(state.ball.vel_x < 0.0);
    }

    #[test]
    fn test_missed_ball_scores_for_other_side() {
        let (mut state, bounds) = running();
        state.ball.x = -2.0;
        state.ball.y = 20.0;
        state.ball.vel_x = -10.0;
        state.ball.vel_y = 0.0;
        state.paddles[0].y = 400.0;
        assert_eq!(
            advance_ball(&mut state, &bounds),
            BallOutcome::Scored {
                scorer: PlayerSlot::Two
            }
        );
    }

    #[test]
    fn test_award_point_serves_to_conceding_side() {
        let (mut state, bounds) = running();
        let mut rng = ScriptedRandom::constant(0.5);
        assert_eq!(award_point(&mut state, PlayerSlot::One, &bounds, &mut rng), None);
        assert_eq!(state.score.one, 1);
        assert!(state.ball.vel_x > 0.0);
        assert!(state.active);
    }

    #[test]
    fn test_winner_ends_match() {
        let (mut state, bounds) = running();
        let mut rng = ScriptedRandom::constant(0.5);
        state.score.two = bounds.points_to_win as i32 - 1;
        assert_eq!(
            award_point(&mut state, PlayerSlot::Two, &bounds, &mut rng),
            Some(PlayerSlot::Two)
        );
        assert_eq!(state.winner, Some(PlayerSlot::Two));
        assert!(!state.active);
        assert_eq!(state.ball.speed(), 0.0);
    }

    #[test]
    fn test_start_activates() {
        let bounds = PhysicalBounds::default();
        let mut state = bounds.initial_state();
        let mut rng = ScriptedRandom::constant(0.2);
        start(&mut state, &bounds, &mut rng);
        assert!(state.is_running());
        assert!(state.ball.vel_x < 0.0);
    }
}
