use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{debug, error, info, trace, warn};
use server::config::ServerConfig;
use server::registry::MatchRegistry;
use server::session::{MatchCommand, MatchEvent, MatchOptions};
use shared::PlayerSlot;
use std::path::PathBuf;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

/// Which slot the computer opponent plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AiSlot {
    One,
    Two,
    None,
}

impl AiSlot {
    fn slot(self) -> Option<PlayerSlot> {
        match self {
            AiSlot::One => Some(PlayerSlot::One),
            AiSlot::Two => Some(PlayerSlot::Two),
            AiSlot::None => None,
        }
    }
}

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// JSON configuration file; built-in defaults when omitted
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Opponent difficulty tier
    #[clap(short, long, default_value = "standard")]
    difficulty: String,
    /// Synchronizer tick rate (ticks per second), overrides the config file
    #[clap(short, long)]
    tick_rate: Option<u32>,
    /// Seed for reproducible opponent behaviour
    #[clap(short, long)]
    seed: Option<u64>,
    /// Stop the demo after this many seconds
    #[clap(long, default_value = "60")]
    duration_secs: u64,
    /// Slot played by the opponent
    #[clap(long, value_enum, default_value = "two")]
    ai_slot: AiSlot,
    /// Log level when RUST_LOG is not set
    #[clap(long, default_value = "info")]
    log_level: String,
}

/// Runs one demo match: the opponent against a scripted player that follows
/// the ball. Events are logged as they arrive.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str())).init();

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path).map_err(|e| {
            error!("Failed to load {}: {}", path.display(), e);
            e
        })?,
        None => ServerConfig::default(),
    };
    if let Some(tick_rate) = args.tick_rate {
        config.sync.tick_rate_hz = tick_rate;
    }

    let mut registry = MatchRegistry::new(config).map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    let options = MatchOptions {
        difficulty: args.difficulty.clone(),
        ai_slot: args.ai_slot.slot(),
        seed: args.seed,
    };
    let (id, mut events) = registry.create_match(&options)?;
    let human_slots: Vec<PlayerSlot> = PlayerSlot::ALL
        .into_iter()
        .filter(|slot| Some(*slot) != options.ai_slot)
        .collect();

    let handle = registry.get(id)?;
    handle.send(MatchCommand::Start)?;
    info!(
        "Demo match {} running for {}s ({} opponent)",
        id, args.duration_secs, args.difficulty
    );

    let mut follow = interval(Duration::from_millis(50));
    follow.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = sleep(Duration::from_secs(args.duration_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("Match {} closed its event stream", id);
                    break;
                };
                match event {
                    MatchEvent::Scored { scorer, score } => {
                        info!("{:?} scored: {} - {}", scorer, score.one, score.two);
                    }
                    MatchEvent::Finished { winner } => {
                        info!("Match {} won by {:?}", id, winner);
                        break;
                    }
                    MatchEvent::ResyncRequired { reason } => {
                        warn!("Resync required: {}; resuming", reason);
                        handle.send(MatchCommand::SetPaused(false))?;
                    }
                    MatchEvent::Validation(result) => {
                        if !result.errors.is_empty() || !result.warnings.is_empty() {
                            debug!(
                                "Validation: {} errors, {} warnings",
                                result.errors.len(),
                                result.warnings.len()
                            );
                        }
                    }
                    MatchEvent::Timing(stats) => {
                        debug!(
                            "Opponent: {} accepted, {} skipped, {:.1}us per decision",
                            stats.accepted, stats.skipped, stats.average_decision_micros
                        );
                    }
                    MatchEvent::Opponent(event) => trace!("Opponent event: {:?}", event),
                    MatchEvent::State(_) => {}
                }
            },

            _ = follow.tick() => {
                let state = handle.snapshot().await?;
                for slot in &human_slots {
                    let paddle = state.paddle(*slot);
                    handle.send(MatchCommand::SetTarget {
                        slot: *slot,
                        y: state.ball.y - paddle.height / 2.0,
                    })?;
                }
            },

            _ = &mut deadline => {
                info!("Demo time elapsed");
                break;
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            },
        }
    }

    if let Some(stats) = handle.stats().await? {
        info!(
            "Opponent compliance {:.1}% over {} samples",
            stats.compliance_rate * 100.0,
            stats.accepted + stats.skipped
        );
    }
    registry.shutdown_all().await;
    Ok(())
}
