use serde::Serialize;
use shared::{Ball, Canvas, Paddle, PlayerSlot};

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, Serialize, Default, PartialEq)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down.
    pub y: f32,
}

impl Vector2 {
    pub fn new(x: f32, y: f32) -> Self {
        Vector2 { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the difference of two vectors.
    pub fn sub(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    ///Returns the Euclidean distance between two points.
    pub fn distance(&self, other: &Vector2) -> f32 {
        self.sub(other).magnitude()
    }
}

impl From<&Ball> for Vector2 {
    fn from(ball: &Ball) -> Self {
        Vector2::new(ball.x, ball.y)
    }
}

impl From<&Paddle> for Vector2 {
    fn from(paddle: &Paddle) -> Self {
        Vector2::new(paddle.x, paddle.y)
    }
}

///Reflects the ball off the top and bottom walls.
///Returns true if a wall was hit.
pub fn bounce_off_walls(ball: &mut Ball, canvas: &Canvas) -> bool {
    if ball.y - ball.radius <= 0.0 {
        ball.y = ball.radius;
        ball.vel_y = ball.vel_y.abs();
        true
    } else if ball.y + ball.radius >= canvas.height {
        ball.y = canvas.height - ball.radius;
        ball.vel_y = -ball.vel_y.abs();
        true
    } else {
        false
    }
}

///Checks whether the ball is striking the face of `paddle` belonging to `side`.
///Only a ball travelling toward the paddle can collide with it.
pub fn hits_paddle(ball: &Ball, paddle: &Paddle, side: PlayerSlot) -> bool {
    let (left, top, right, bottom) = paddle.get_bounds();
    let vertical_overlap = ball.y + ball.radius >= top && ball.y - ball.radius <= bottom;
    if !vertical_overlap {
        return false;
    }

    match side {
        PlayerSlot::One => {
            ball.vel_x < 0.0 && ball.x - ball.radius <= right && ball.x + ball.radius >= left
        }
        PlayerSlot::Two => {
            ball.vel_x > 0.0 && ball.x + ball.radius >= left && ball.x - ball.radius <= right
        }
    }
}

///Sends the ball back from `paddle`. The vertical speed depends on where the
///ball struck relative to the paddle centre; the horizontal speed grows by
///`speedup` and the total speed is capped at `max_speed`.
pub fn deflect_from_paddle(
    ball: &mut Ball,
    paddle: &Paddle,
    side: PlayerSlot,
    max_bounce_speed: f32,
    speedup: f32,
    max_speed: f32,
) {
    let relative = ((ball.y - paddle.center_y()) / (paddle.height / 2.0)).clamp(-1.0, 1.0);
    let outward = -side.incoming_sign();

    ball.vel_x = ball.vel_x.abs() * speedup * outward;
    ball.vel_y = relative * max_bounce_speed;

    let speed = ball.speed();
    if speed > max_speed {
        let scale = max_speed / speed;
        ball.vel_x *= scale;
        ball.vel_y *= scale;
    }

    ball.x = match side {
        PlayerSlot::One => paddle.x + paddle.width + ball.radius,
        PlayerSlot::Two => paddle.x - ball.radius,
    };
}
