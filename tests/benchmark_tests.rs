//! Performance benchmarks for the per-tick and per-decision hot paths

use server::config::ServerConfig;
use server::opponent::{OpponentEngine, SampleOutcome};
use server::random::make_source;
use server::sync::InputSynchronizer;
use server::trajectory::{predict_intercept, Walls};
use server::validation::StateValidator;
use rand::Rng;
use shared::{Ball, Direction, InputSource, MoveIntent, PlayerSlot};
use std::time::{Duration, Instant};

/// Benchmarks intercept prediction with a deep bounce budget
#[test]
fn benchmark_trajectory_prediction() {
    let walls = Walls::for_ball(600.0, 10.0);
    let mut rng = rand::thread_rng();
    let balls: Vec<Ball> = (0..1_000)
        .map(|_| {
            let mut ball = Ball::new(40.0, rng.gen_range(10.0..590.0), 10.0);
            ball.vel_x = rng.gen_range(2.0..12.0);
            ball.vel_y = rng.gen_range(-18.0..18.0);
            ball
        })
        .collect();

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let prediction = predict_intercept(&balls[i % balls.len()], 770.0, 30.0, walls, 8);
        assert!(prediction.intercept_y.is_finite());
    }

    let duration = start.elapsed();
    println!(
        "Trajectory prediction: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks full opponent decision cycles
#[test]
fn benchmark_opponent_decisions() {
    let config = ServerConfig::default();
    let mut engine = OpponentEngine::new(&config, "expert", PlayerSlot::Two, make_source(Some(5))).unwrap();
    engine.activate();

    let mut state = config.bounds.initial_state();
    state.active = true;
    state.ball.vel_x = 7.0;
    state.ball.vel_y = 5.0;

    let iterations = 10_000;
    let base = Instant::now();
    let start = Instant::now();
    let mut decisions = 0;

    for i in 0..iterations {
        state.ball.y = 20.0 + (i % 560) as f32;
        let now = base + config.opponent.cadence() * i as u32;
        if let SampleOutcome::Accepted { cycle, .. } = engine.observe(&state, now) {
            if engine.decide(cycle, i as u64).is_some() {
                decisions += 1;
            }
        }
    }

    let duration = start.elapsed();
    println!(
        "Opponent decisions: {} cycles in {:?} ({:.2} μs/cycle)",
        decisions,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(decisions, iterations);
    assert_eq!(engine.performance_stats().skipped, 0);
    assert!(duration < Duration::from_secs(2));
}

/// Benchmarks synchronizer ticks with a steady input stream
#[test]
fn benchmark_sync_ticks() {
    let mut sync = InputSynchronizer::new(&ServerConfig::default()).unwrap();
    let iterations = 100_000u64;
    let start = Instant::now();

    for tick in 0..iterations {
        let now = tick * 16;
        let direction = if (tick / 30) % 2 == 0 { Direction::Up } else { Direction::Down };
        sync.add_input(PlayerSlot::One, MoveIntent::new(direction, InputSource::Human, now));
        sync.tick(now);
    }

    let duration = start.elapsed();
    println!(
        "Sync ticks: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(sync.tick_count(), iterations);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks state validation throughput
#[test]
fn benchmark_validation() {
    let config = ServerConfig::default();
    let validator = StateValidator::new(&config).unwrap();
    let mut state = config.bounds.initial_state();
    state.active = true;
    state.ball.vel_x = 5.0;

    let iterations = 50_000;
    let start = Instant::now();
    let mut valid = 0;

    for i in 0..iterations {
        state.ball.y = (i % 700) as f32 - 50.0;
        if validator.validate_at(&state, &[], 0).is_valid {
            valid += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Validation: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(valid, iterations);
    assert!(duration.as_millis() < 2000);
}
