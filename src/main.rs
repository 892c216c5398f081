//! pinchray - point at targets with a tracked hand, pinch to toggle them.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use pinchray::backend::{self, BackendType, LiveConfig, RunOptions};
use pinchray::state::{InteractionConfig, InteractionState};

#[derive(Parser, Debug)]
#[command(name = "pinchray", about = "Hand pointing ray caster with pinch toggles")]
struct Cli {
    /// Backend to use: replay, live, or auto
    #[arg(long, default_value = "auto")]
    backend: String,

    /// Recorded session to replay (default: stdin)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Write a CSV metrics export on exit
    #[arg(long)]
    export: Option<PathBuf>,

    /// Print interaction events to stdout
    #[arg(long)]
    events: bool,

    /// Pinch strength that starts a pinch
    #[arg(long)]
    pinch_start: Option<f32>,

    /// Pinch strength below which a pinch is released
    #[arg(long)]
    pinch_release: Option<f32>,

    /// Minimum pointing time (ms) for a dwell to count
    #[arg(long)]
    min_dwell_ms: Option<f64>,

    /// Ray-to-target gap that still counts as a near miss
    #[arg(long)]
    near_miss: Option<f32>,

    /// Maximum events kept in the metrics log
    #[arg(long)]
    log_capacity: Option<usize>,

    /// Frame interval in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_interval_ms: u64,

    /// Exit after N seconds (live backend)
    #[arg(long)]
    exit_after: Option<u64>,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

impl Cli {
    fn interaction_config(&self) -> InteractionConfig {
        let mut config = InteractionConfig::default();
        if let Some(v) = self.pinch_start {
            config.pinch.start_threshold = v;
        }
        if let Some(v) = self.pinch_release {
            config.pinch.release_threshold = v;
        }
        if let Some(v) = self.min_dwell_ms {
            config.correlator.min_dwell_ms = v;
        }
        if let Some(v) = self.near_miss {
            config.metrics.near_miss_distance = v;
        }
        if let Some(v) = self.log_capacity {
            config.metrics.log_capacity = v;
        }
        config
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("pinchray {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Logs go to stderr; stdout carries the console protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinchray=info".into()),
        )
        .init();

    info!("pinchray v{} starting", env!("CARGO_PKG_VERSION"));

    let backend_type = match cli.backend.as_str() {
        "auto" => {
            if cli.input.is_some() {
                info!("auto-detected: input file given, using replay backend");
                BackendType::Replay
            } else {
                info!("auto-detected: no input file, using live backend");
                BackendType::Live
            }
        }
        other => match other.parse::<BackendType>() {
            Ok(b) => b,
            Err(_) => {
                eprintln!("Unknown backend: {other}. Use: replay, live, or auto");
                std::process::exit(1);
            }
        },
    };
    info!("backend: {}", backend_type.as_str());

    let mut state = InteractionState::new(cli.interaction_config(), 0.0)?;
    state.pinch.set_observer(|e| {
        info!(
            "Pinch {} (strength {:.2}{})",
            e.kind.as_str(),
            e.strength,
            if e.synthetic { ", hand lost" } else { "" }
        );
    });

    let options = RunOptions {
        input: cli.input,
        export: cli.export,
        print_events: cli.events,
        live: LiveConfig {
            frame_interval_ms: cli.frame_interval_ms,
            exit_after: cli.exit_after,
            print_events: cli.events,
        },
    };
    backend::run(backend_type, &mut state, options)?;
    Ok(())
}
