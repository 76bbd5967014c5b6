use serde::{Deserialize, Serialize};

pub const CANVAS_WIDTH: f32 = 800.0;
pub const CANVAS_HEIGHT: f32 = 600.0;
pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 100.0;
pub const PADDLE_INSET: f32 = 20.0;
pub const BALL_RADIUS: f32 = 10.0;
pub const TICK_RATE_HZ: u32 = 60;

/// One of the two sides of a match. `One` plays on the left, `Two` on the right.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    pub const ALL: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

    pub fn index(self) -> usize {
        match self {
            PlayerSlot::One => 0,
            PlayerSlot::Two => 1,
        }
    }

    pub fn opponent(self) -> PlayerSlot {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }

    /// Horizontal sign of the direction the ball travels when heading toward this side.
    pub fn incoming_sign(self) -> f32 {
        match self {
            PlayerSlot::One => -1.0,
            PlayerSlot::Two => 1.0,
        }
    }
}

/// Vertical paddle command. Screen coordinates grow downward, so `Up` decreases y.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Up,
    Down,
    #[default]
    None,
}

impl Direction {
    pub fn sign(self) -> f32 {
        match self {
            Direction::Up => -1.0,
            Direction::Down => 1.0,
            Direction::None => 0.0,
        }
    }

    pub fn reversed(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::None => Direction::None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Human,
    Ai,
}

/// A discrete directional command with provenance.
///
/// `timestamp` is in milliseconds since the Unix epoch. `intensity` scales the
/// commanded paddle speed (clamped to `0..=1` by the synchronizer) and
/// `duration` extends how long the intent stays relevant after it was issued.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MoveIntent {
    pub direction: Direction,
    pub source: InputSource,
    pub timestamp: u64,
    pub intensity: Option<f32>,
    pub duration: Option<u64>,
}

impl MoveIntent {
    pub fn new(direction: Direction, source: InputSource, timestamp: u64) -> Self {
        Self {
            direction,
            source,
            timestamp,
            intensity: None,
            duration: None,
        }
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = Some(intensity);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub radius: f32,
}

impl Ball {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            radius,
        }
    }

    pub fn speed(&self) -> f32 {
        (self.vel_x * self.vel_x + self.vel_y * self.vel_y).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.vel_x.is_finite()
            && self.vel_y.is_finite()
            && self.radius.is_finite()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub x: f32,
    /// Top edge.
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub vel_y: f32,
}

impl Paddle {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            vel_y: 0.0,
        }
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn get_bounds(&self) -> (f32, f32, f32, f32) {
        (self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.vel_y.is_finite()
    }
}

/// Scores are signed so that corrupted reports can be represented and rejected.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Score {
    pub one: i32,
    pub two: i32,
}

impl Score {
    pub fn get(&self, slot: PlayerSlot) -> i32 {
        match slot {
            PlayerSlot::One => self.one,
            PlayerSlot::Two => self.two,
        }
    }

    pub fn increment(&mut self, slot: PlayerSlot) {
        match slot {
            PlayerSlot::One => self.one += 1,
            PlayerSlot::Two => self.two += 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: f32,
    pub height: f32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
        }
    }
}

/// The single authoritative record of one game instance.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MatchState {
    pub ball: Ball,
    pub paddles: [Paddle; 2],
    pub score: Score,
    pub canvas: Canvas,
    pub active: bool,
    pub paused: bool,
    pub winner: Option<PlayerSlot>,
    pub last_update: u64,
}

impl MatchState {
    /// Builds a centred state for the given canvas and paddle geometry.
    pub fn new(canvas: Canvas, paddle_width: f32, paddle_height: f32, inset: f32, ball_radius: f32) -> Self {
        let paddle_y = (canvas.height - paddle_height) / 2.0;
        Self {
            ball: Ball::new(canvas.width / 2.0, canvas.height / 2.0, ball_radius),
            paddles: [
                Paddle::new(inset, paddle_y, paddle_width, paddle_height),
                Paddle::new(canvas.width - inset - paddle_width, paddle_y, paddle_width, paddle_height),
            ],
            score: Score::default(),
            canvas,
            active: false,
            paused: false,
            winner: None,
            last_update: 0,
        }
    }

    pub fn paddle(&self, slot: PlayerSlot) -> &Paddle {
        &self.paddles[slot.index()]
    }

    pub fn paddle_mut(&mut self, slot: PlayerSlot) -> &mut Paddle {
        &mut self.paddles[slot.index()]
    }

    /// Active and not paused.
    pub fn is_running(&self) -> bool {
        self.active && !self.paused
    }

    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new(Canvas::default(), PADDLE_WIDTH, PADDLE_HEIGHT, PADDLE_INSET, BALL_RADIUS)
    }
}
