//! Replay backend — deterministic playback of a recorded session.
//!
//! Reads console messages line by line. Each frame's `:t` drives the clock
//! and is followed by exactly one tick, so a recording always produces the
//! same events and metrics. Lines starting with `;` are comments.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::ipc::{self, dispatch};
use crate::state::InteractionState;

/// Playback counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayStats {
    pub lines: u64,
    pub frames: u64,
    pub commands: u64,
    pub errors: u64,
    pub interaction_events: u64,
    /// Clock value after the last line.
    pub end_ms: f64,
}

/// Play `reader` into `state`, writing responses (and events when
/// `print_events`) to `out`.
pub fn replay<R: BufRead, W: Write>(
    state: &mut InteractionState,
    reader: R,
    out: &mut W,
    frame_interval_ms: f64,
    print_events: bool,
) -> Result<ReplayStats> {
    let mut stats = ReplayStats {
        end_ms: state.last_tick_ms(),
        ..Default::default()
    };
    let mut clock_ms = stats.end_ms;
    let mut seen_frame = false;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read replay line {}", line_no + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        stats.lines += 1;

        let value = match ipc::parse_message(line) {
            Ok(v) => v,
            Err(reason) => {
                stats.errors += 1;
                writeln!(out, "{}", error_line(line_no + 1, &reason))?;
                continue;
            }
        };

        if ipc::message_type(&value).as_deref() == Some("frame") {
            let t = dispatch::frame_time(&value).unwrap_or(if seen_frame {
                clock_ms + frame_interval_ms
            } else {
                clock_ms
            });
            // The clock never runs backwards.
            clock_ms = t.max(clock_ms);
            seen_frame = true;
            stats.frames += 1;

            if let Some(resp) = ipc::handle_value(state, &value, clock_ms) {
                stats.errors += 1;
                writeln!(out, "{}", resp)?;
            }
            let events = state.tick(clock_ms);
            stats.interaction_events += events.len() as u64;
            if print_events {
                for e in &events {
                    writeln!(out, "{}", e.to_sexp())?;
                }
            }
        } else {
            stats.commands += 1;
            if let Some(resp) = ipc::handle_value(state, &value, clock_ms) {
                if resp.contains(":status :error") {
                    stats.errors += 1;
                }
                writeln!(out, "{}", resp)?;
            }
        }
        debug!("replay line {} processed at {:.0}ms", line_no + 1, clock_ms);
    }

    stats.end_ms = clock_ms;
    info!(
        "Replay finished: {} frames, {} commands, {} errors, {} interaction events",
        stats.frames, stats.commands, stats.errors, stats.interaction_events
    );
    Ok(stats)
}

fn error_line(line_no: usize, reason: &str) -> String {
    format!(
        "(:type :response :id 0 :status :error :reason \"line {}: {}\")",
        line_no,
        reason.replace('\\', "\\\\").replace('"', "\\\"")
    )
}
