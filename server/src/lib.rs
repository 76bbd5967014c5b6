//! # Match Authority Library
//!
//! This library provides the authoritative real-time core of a two-player
//! paddle-and-ball game. It decides what the computer opponent does, folds
//! noisy, asynchronous player input into one consistent physical state, and
//! checks that state for anything forged or nonsensical.
//!
//! ## Core Responsibilities
//!
//! ### Opponent Decisions
//! The opponent samples the match at a fixed cadence, predicts where the ball
//! will cross its paddle plane (including wall bounces up to a difficulty
//! dependent depth), biases the target by score and difficulty, and emits a
//! timed sequence of simulated key presses.
//!
//! ### Input Synchronization
//! Human and opponent inputs travel the same path: a bounded per-player buffer
//! drained on a fixed tick into velocity-limited paddle movement. Nothing else
//! writes paddle positions.
//!
//! ### State Validation
//! Every field of the match state is checked against physical bounds and the
//! players' score records. Client-reported states are compared against the
//! authority and positional drift is reported as desync. Findings are data,
//! never exceptions.
//!
//! ## Architecture Design
//!
//! ### One Actor Per Match
//! Each match is a tokio task owning its state, synchronizer, opponent and
//! validator. Ticks, opponent deadlines and commands are branches of a single
//! `select!` loop, so they never interleave and cancelling a pending opponent
//! decision is a matter of clearing its deadline.
//!
//! ### Registry Ownership
//! The [`registry::MatchRegistry`] is the only owner of running matches and
//! hands out opaque [`registry::MatchId`]s. Matches share nothing mutable.
//!
//! ## Module Organization
//!
//! ### Configuration (`config`, `difficulty`)
//! - Physical bounds, timing and difficulty profiles
//! - JSON loading with defaults for missing sections
//! - Startup validation; invalid configuration is fatal
//!
//! ### Opponent (`opponent`, `trajectory`, `events`, `random`)
//! - Cadence gate and decision cycle
//! - Closed-form intercept prediction with wall reflection
//! - Typed subscriber interface for opponent events
//! - Injectable randomness for deterministic tests
//!
//! ### Synchronizer (`sync`)
//! - Per-player bounded input buffers
//! - Target positions, acceleration, decay and clamping
//!
//! ### Validator (`validation`)
//! - Field checks, score cross-checks, client comparison
//! - Bounded diagnostic snapshot history
//!
//! ### Match Hosting (`game`, `physics`, `session`, `registry`)
//! - Ball travel, paddle contact, scoring and serves
//! - Per-match actor and its command/event channels
//! - Match creation, lookup and teardown
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::registry::MatchRegistry;
//! use server::session::{MatchCommand, MatchEvent, MatchOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = MatchRegistry::new(ServerConfig::default())?;
//!
//!     // Human on slot one, "standard" opponent on slot two
//!     let (id, mut events) = registry.create_match(&MatchOptions::default())?;
//!     registry.get(id)?.send(MatchCommand::Start)?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let MatchEvent::Finished { winner } = event {
//!             println!("{:?} won", winner);
//!             break;
//!         }
//!     }
//!
//!     registry.destroy(id).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod difficulty;
pub mod events;
pub mod game;
pub mod opponent;
pub mod physics;
pub mod random;
pub mod registry;
pub mod session;
pub mod sync;
pub mod trajectory;
pub mod utils;
pub mod validation;
