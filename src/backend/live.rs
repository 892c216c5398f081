//! Live backend — wall-clock frame loop fed from stdin.
//!
//! A reader thread forwards console lines into a calloop channel; a
//! timer ticks the pipeline at a fixed interval. Frames arriving between
//! ticks overwrite each other, so only the latest one is processed.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use calloop::channel::{channel, Event};
use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use tracing::{debug, info, warn};

use crate::ipc;
use crate::state::InteractionState;

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Tick interval in milliseconds.
    pub frame_interval_ms: u64,
    /// Stop after N seconds.
    pub exit_after: Option<u64>,
    /// Print interaction events to stdout.
    pub print_events: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            exit_after: None,
            print_events: false,
        }
    }
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn emit(line: &str) {
    let mut out = std::io::stdout().lock();
    if writeln!(out, "{}", line).and_then(|_| out.flush()).is_err() {
        debug!("stdout closed, dropping output");
    }
}

/// Run until stdin closes, a signal arrives, or the exit timer fires.
///
/// Returns the session clock (ms since start) at shutdown.
pub fn run(state: &mut InteractionState, config: LiveConfig) -> anyhow::Result<f64> {
    let mut event_loop = EventLoop::<InteractionState>::try_new()?;
    let start = Instant::now();

    // Console input
    let (sender, lines) = channel::<String>();
    std::thread::Builder::new()
        .name("pinchray-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(l) => {
                        if sender.send(l).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
        })?;

    event_loop
        .handle()
        .insert_source(lines, move |event, _, state: &mut InteractionState| match event {
            Event::Msg(line) => {
                let line = line.trim();
                if line.is_empty() || line.starts_with(';') {
                    return;
                }
                if let Some(resp) = ipc::handle_message(state, line, elapsed_ms(start)) {
                    emit(&resp);
                }
            }
            Event::Closed => {
                info!("stdin closed");
                state.stop();
            }
        })
        .map_err(|e| anyhow!("failed to insert stdin source: {:?}", e))?;

    // Frame timer
    let interval = Duration::from_millis(config.frame_interval_ms.max(1));
    let print_events = config.print_events;
    event_loop
        .handle()
        .insert_source(
            Timer::from_duration(interval),
            move |_, _, state: &mut InteractionState| {
                if !state.running {
                    return TimeoutAction::Drop;
                }
                for e in state.tick(elapsed_ms(start)) {
                    if print_events {
                        emit(&e.to_sexp());
                    }
                }
                TimeoutAction::ToDuration(interval)
            },
        )
        .map_err(|e| anyhow!("failed to insert frame timer: {:?}", e))?;

    install_signal_handlers();
    let exit_duration = config.exit_after.map(Duration::from_secs);
    info!(
        "Live backend running (frame interval {}ms)",
        config.frame_interval_ms
    );

    while state.running {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("Shutdown signal received, exiting");
            state.stop();
            break;
        }
        if let Some(dur) = exit_duration {
            if start.elapsed() >= dur {
                info!("Exit timer fired after {}s", dur.as_secs());
                state.stop();
                break;
            }
        }
        event_loop.dispatch(Some(interval), state)?;
    }

    Ok(elapsed_ms(start))
}
