//! minigame-runner binary
//!
//! Loads a content definition from JSON and drives one headless playthrough
//! (no camera hardware, no renderer).  Useful for smoke-testing definitions
//! produced by the authoring pipeline.
//!
//! ## Configuration (flags or env)
//!
//! | Key                            | Default | Description                      |
//! |--------------------------------|---------|----------------------------------|
//! | `MINIGAME_DEFINITION`          | –       | Path to a JSON content definition |
//! | `MINIGAME_TICK_RATE_HZ`        | `30`    | Simulation tick rate             |
//! | `MINIGAME_SEED`                | `42`    | Procedural engine rng seed       |
//! | `MINIGAME_MUTED`               | `false` | Host-level mute switch           |
//! | `MINIGAME_CAMERA_TIMEOUT_SECS` | `5`     | Permission prompt ceiling        |
//! | `MINIGAME_RAW_DURATION_SECS`   | `60`    | Countdown for raw-content games  |

use anyhow::{Context, Result};
use clap::Parser;
use minigame_host::camera::{CameraAcquisition, NoCameraProvider};
use minigame_host::runner::{RunnerConfig, SessionRunner};
use minigame_host::session::GameSession;
use minigame_host::types::{ContentDefinition, SessionConfig};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "minigame-runner", about = "Embedded mini-game host", version)]
struct Args {
    /// Path to a JSON content definition
    #[arg(long, env = "MINIGAME_DEFINITION")]
    definition: PathBuf,

    /// Tick rate (Hz)
    #[arg(long, env = "MINIGAME_TICK_RATE_HZ", default_value_t = 30.0)]
    tick_rate_hz: f32,

    /// Procedural engine rng seed
    #[arg(long, env = "MINIGAME_SEED", default_value_t = 42)]
    seed: u64,

    /// Host-level mute switch
    #[arg(long, env = "MINIGAME_MUTED", default_value_t = false)]
    muted: bool,

    /// Camera permission prompt ceiling in seconds
    #[arg(long, env = "MINIGAME_CAMERA_TIMEOUT_SECS", default_value_t = 5.0)]
    camera_timeout_secs: f32,

    /// Countdown length for raw-content games in seconds
    #[arg(long, env = "MINIGAME_RAW_DURATION_SECS", default_value_t = 60.0)]
    raw_duration_secs: f32,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("minigame_host=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.definition)
        .with_context(|| format!("failed to read {}", args.definition.display()))?;
    let definition: ContentDefinition =
        serde_json::from_str(&raw).context("invalid content definition")?;

    log::info!(
        "starting playthrough (definition='{}', tick_rate={}Hz, seed={})",
        args.definition.display(),
        args.tick_rate_hz,
        args.seed,
    );

    let session_config = SessionConfig {
        sound_enabled: !args.muted,
        seed: args.seed,
        raw_duration_seconds: args.raw_duration_secs,
    };

    let mut session = GameSession::new(definition, session_config);
    session.set_on_score(Box::new(|score| log::info!("score: {score}")));
    session.set_on_complete(Box::new(|final_score| {
        log::info!("playthrough complete: final score {final_score}")
    }));
    let session = Arc::new(Mutex::new(session));

    // Headless: no camera hardware; the session plays over the fallback
    // background.
    let camera = CameraAcquisition::new(Arc::new(NoCameraProvider))
        .with_timeout(Duration::from_secs_f32(args.camera_timeout_secs));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let runner = SessionRunner::new(
        RunnerConfig {
            tick_rate_hz: args.tick_rate_hz,
        },
        session,
        camera,
    );

    let final_score = runner.run(shutdown_rx).await?;
    log::info!("done – final score {final_score}");
    Ok(())
}
