//! Bounce-aware intercept prediction.
//!
//! The ball is followed segment by segment: for each segment the time to the
//! next horizontal wall is compared against the time left until the paddle
//! plane is crossed. This is O(bounces), never a frame-by-frame replay.

use serde::{Deserialize, Serialize};
use shared::Ball;

/// Where and when the ball reaches a paddle plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPrediction {
    pub intercept_y: f32,
    /// In ticks. Zero when the ball has no horizontal motion.
    pub time_to_intercept: f32,
    pub bounce_count: u32,
    /// False when the ball is moving away from the plane.
    pub incoming: bool,
}

/// Vertical limits the ball centre reflects off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Walls {
    pub top: f32,
    pub bottom: f32,
}

impl Walls {
    pub fn new(top: f32, bottom: f32) -> Self {
        Self { top, bottom }
    }

    /// Walls for a ball of `radius` on a canvas of `height`.
    pub fn for_ball(height: f32, radius: f32) -> Self {
        Self::new(radius, height - radius)
    }

    fn clamp(&self, y: f32) -> f32 {
        y.clamp(self.top.min(self.bottom), self.bottom.max(self.top))
    }
}

/// Predicts where `ball` crosses the vertical line `plane_x`, reflecting off
/// `walls` at most `max_bounces` times. Once the bounce budget is spent the
/// remaining travel is clamped to the walls instead of reflected.
///
/// A ball moving away from the plane yields its current height with
/// `incoming == false`; the time reported is the time to travel back from the
/// far side, assuming the opponent returns it from `far_x`.
pub fn predict_intercept(
    ball: &Ball,
    plane_x: f32,
    far_x: f32,
    walls: Walls,
    max_bounces: u32,
) -> TrajectoryPrediction {
    if ball.vel_x == 0.0 || !ball.is_finite() {
        return TrajectoryPrediction {
            intercept_y: walls.clamp(if ball.y.is_finite() { ball.y } else { (walls.top + walls.bottom) / 2.0 }),
            time_to_intercept: 0.0,
            bounce_count: 0,
            incoming: false,
        };
    }

    let remaining = (plane_x - ball.x) / ball.vel_x;
    if remaining < 0.0 {
        let travel = (ball.x - far_x).abs() + (plane_x - far_x).abs();
        return TrajectoryPrediction {
            intercept_y: ball.y,
            time_to_intercept: travel / ball.vel_x.abs(),
            bounce_count: 0,
            incoming: false,
        };
    }

    let mut y = ball.y;
    let mut vel_y = ball.vel_y;
    let mut time_left = remaining;
    let mut bounces = 0;

    loop {
        if vel_y == 0.0 {
            break;
        }

        let wall = if vel_y > 0.0 { walls.bottom } else { walls.top };
        let time_to_wall = ((wall - y) / vel_y).max(0.0);

        if time_to_wall >= time_left {
            y += vel_y * time_left;
            break;
        }

        if bounces >= max_bounces {
            y = walls.clamp(y + vel_y * time_left);
            break;
        }

        y = wall;
        vel_y = -vel_y;
        time_left -= time_to_wall;
        bounces += 1;
    }

    TrajectoryPrediction {
        intercept_y: y,
        time_to_intercept: remaining,
        bounce_count: bounces,
        incoming: true,
    }
}
