//! Loopcast command-line entry point.
//!
//! `loopcast probe` frames the configured files and prints a summary.
//! `loopcast play` runs one full session against counting sinks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use loopcast_media::{MediaKind, Pacer, SleepPacer, Unpaced};
use tracing_subscriber::EnvFilter;

use loopcast_server::config::{Config, DEADLINE_SECS};
use loopcast_server::probe;
use loopcast_server::session::{SessionCoordinator, SessionSinks};
use loopcast_server::stats_sink::StatsSink;

#[derive(Parser, Debug)]
#[command(name = "loopcast", version, about = "Fixed-file audio/video loop streamer")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Override `media.audio_path`.
    #[arg(long, global = true)]
    audio: Option<PathBuf>,

    /// Override `media.video_path`.
    #[arg(long, global = true)]
    video: Option<PathBuf>,

    /// Override `session.deadline_secs`.
    #[arg(long, global = true)]
    deadline_secs: Option<u64>,

    /// Override `media.scanner` (aligned | byte).
    #[arg(long, global = true)]
    scanner: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Frame both files without pacing and print what a session would send.
    Probe,
    /// Run one session against counting sinks. Ctrl-C closes it early.
    Play {
        /// Push as fast as the files can be read.
        #[arg(long)]
        unpaced: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Probe => {
            let report = probe::probe(&config.media)?;
            println!("{report}");
        }
        Command::Play { unpaced } => play(config, unpaced).await?,
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(path) = &cli.audio {
        config.media.audio_path = path.clone();
    }
    if let Some(path) = &cli.video {
        config.media.video_path = path.clone();
    }
    if let Some(secs) = cli.deadline_secs {
        if !DEADLINE_SECS.contains(&secs) {
            anyhow::bail!(
                "--deadline-secs must be in {}..={}",
                DEADLINE_SECS.start(),
                DEADLINE_SECS.end()
            );
        }
        config.session.deadline = Duration::from_secs(secs);
    }
    if let Some(scanner) = &cli.scanner {
        config.media.scanner = scanner.parse().map_err(anyhow::Error::msg)?;
    }
    Ok(config)
}

async fn play(config: Config, unpaced: bool) -> anyhow::Result<()> {
    let pacer: Arc<dyn Pacer> = if unpaced {
        Arc::new(Unpaced)
    } else {
        Arc::new(SleepPacer)
    };
    let coordinator = SessionCoordinator::with_pacer(config.media, config.session, pacer);

    let sources = coordinator.open_sources()?;
    let audio = Arc::new(StatsSink::new(MediaKind::Audio));
    let video = Arc::new(StatsSink::new(MediaKind::Video));
    let sinks = SessionSinks {
        audio: audio.clone(),
        video: video.clone(),
    };

    let closed = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let handle = coordinator.start(sources, sinks, closed);
    tracing::info!(session_id = handle.id(), "dry-run session running");

    let report = handle.wait().await?;
    report.log();

    let (a, v) = (audio.snapshot(), video.snapshot());
    println!(
        "session {} {}: audio {} samples / {} bytes / {:.2}s, video {} samples / {} bytes / {:.2}s",
        report.session_id,
        report.state,
        a.samples,
        a.bytes,
        a.media_time.as_secs_f64(),
        v.samples,
        v.bytes,
        v.media_time.as_secs_f64()
    );
    Ok(())
}
