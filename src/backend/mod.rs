//! Backend abstraction — recorded replay and live stdin input.

pub mod live;
pub mod replay;

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use tracing::info;

use crate::metrics::{write_export, MetricsSummary};
use crate::state::InteractionState;

pub use live::LiveConfig;
pub use replay::ReplayStats;

/// Backend type selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Replay,
    Live,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replay => "replay",
            Self::Live => "live",
        }
    }
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replay" => Ok(Self::Replay),
            "live" => Ok(Self::Live),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// Options shared by both backends.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Replay input file; stdin when absent.
    pub input: Option<PathBuf>,
    /// Write a CSV export at shutdown.
    pub export: Option<PathBuf>,
    pub print_events: bool,
    pub live: LiveConfig,
}

/// Run the pipeline with the selected backend and report the final summary.
pub fn run(
    backend: BackendType,
    state: &mut InteractionState,
    options: RunOptions,
) -> anyhow::Result<MetricsSummary> {
    let end_ms = match backend {
        BackendType::Replay => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let interval = options.live.frame_interval_ms as f64;
            let stats = match &options.input {
                Some(path) => {
                    let file = File::open(path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    replay::replay(state, BufReader::new(file), &mut out, interval, options.print_events)?
                }
                None => {
                    let stdin = std::io::stdin();
                    replay::replay(state, stdin.lock(), &mut out, interval, options.print_events)?
                }
            };
            state.stop();
            stats.end_ms
        }
        BackendType::Live => {
            let mut live = options.live.clone();
            live.print_events = options.print_events;
            live::run(state, live)?
        }
    };

    finish(state, end_ms, options.export)
}

fn finish(
    state: &InteractionState,
    end_ms: f64,
    export: Option<PathBuf>,
) -> anyhow::Result<MetricsSummary> {
    let summary = state.metrics.summary(end_ms);
    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "(:type :session-end :summary {})",
        state.metrics.summary_sexp(end_ms)
    )?;
    out.flush()?;

    if let Some(path) = export {
        write_export(&state.metrics, end_ms, &path)?;
        info!("Metrics exported to {}", path.display());
    }
    info!(
        "Session ended: {} attempts, {:.2}% accuracy",
        summary.total_attempts, summary.accuracy_pct
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_roundtrip() {
        for b in [BackendType::Replay, BackendType::Live] {
            assert_eq!(b.as_str().parse::<BackendType>(), Ok(b));
        }
        assert!("winit".parse::<BackendType>().is_err());
    }

    #[test]
    fn test_replay_file_with_export() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("session.sexp");
        let export = dir.path().join("session.csv");
        std::fs::write(
            &input,
            "(:type :frame :t 0 :landmarks nil)\n(:type :frame :t 16 :landmarks nil)\n",
        )
        .unwrap();

        let mut state =
            InteractionState::new(crate::state::InteractionConfig::default(), 0.0).unwrap();
        let options = RunOptions {
            input: Some(input),
            export: Some(export.clone()),
            ..Default::default()
        };
        let summary = run(BackendType::Replay, &mut state, options).unwrap();
        assert_eq!(summary.total_attempts, 0);
        assert!(!state.running);

        let parsed = crate::metrics::read_export(&export).unwrap();
        assert_eq!(parsed.summary, summary);
    }

    #[test]
    fn test_missing_input_file() {
        let mut state =
            InteractionState::new(crate::state::InteractionConfig::default(), 0.0).unwrap();
        let options = RunOptions {
            input: Some(PathBuf::from("/nonexistent/pinchray/session.sexp")),
            ..Default::default()
        };
        assert!(run(BackendType::Replay, &mut state, options).is_err());
    }
}
