//! Interaction state — the central struct owning the per-frame pipeline.
//!
//! A single `InteractionState` owns the scene, pinch classifier, correlator,
//! and metrics session. Backends feed it frames and call `tick` once per
//! frame; console handlers borrow it mutably between ticks.

use anyhow::{bail, ensure, Result};
use tracing::{debug, info};

use crate::hand::{HandFrame, PinchClassifier, PinchConfig};
use crate::interaction::{
    cast_ray, pointing_ray, CorrelatorConfig, Hit, InteractionCorrelator, InteractionEvent,
};
use crate::metrics::{MetricsAggregator, MetricsConfig};
use crate::scene::{default_targets, Camera, Target};

/// Startup configuration for the whole pipeline.
#[derive(Debug, Clone, Default)]
pub struct InteractionConfig {
    pub pinch: PinchConfig,
    pub correlator: CorrelatorConfig,
    pub metrics: MetricsConfig,
}

/// Central interaction state.
#[derive(Debug)]
pub struct InteractionState {
    /// `None` until a camera is configured; casting yields no hit.
    pub camera: Option<Camera>,
    pub targets: Vec<Target>,
    pub pinch: PinchClassifier,
    pub correlator: InteractionCorrelator,
    pub metrics: MetricsAggregator,

    latest_frame: Option<HandFrame>,
    current_hit: Option<Hit>,
    frames_received: u64,
    ticks: u64,
    last_tick_ms: f64,

    // Shutdown flag
    pub running: bool,
}

impl InteractionState {
    /// Build the pipeline with the default camera and demo targets.
    pub fn new(config: InteractionConfig, now_ms: f64) -> Result<Self> {
        config.pinch.validate()?;
        ensure!(
            config.correlator.min_dwell_ms >= 0.0,
            "min dwell must not be negative"
        );
        let targets = default_targets();
        info!(
            "InteractionState initialized ({} targets, dwell {:.0}ms)",
            targets.len(),
            config.correlator.min_dwell_ms
        );
        Ok(Self {
            camera: Some(Camera::default()),
            targets,
            pinch: PinchClassifier::new(config.pinch),
            correlator: InteractionCorrelator::new(config.correlator),
            metrics: MetricsAggregator::new(config.metrics, now_ms),
            latest_frame: None,
            current_hit: None,
            frames_received: 0,
            ticks: 0,
            last_tick_ms: now_ms,
            running: true,
        })
    }

    // ── Input ──

    /// Store the most recent frame. `None` means the source saw no hand.
    pub fn submit_frame(&mut self, frame: Option<HandFrame>) {
        if !self.running {
            return;
        }
        self.frames_received += 1;
        self.latest_frame = frame;
    }

    pub fn latest_frame(&self) -> Option<&HandFrame> {
        self.latest_frame.as_ref()
    }

    /// Target under the pointing ray as of the last tick.
    pub fn current_hit(&self) -> Option<&Hit> {
        self.current_hit.as_ref()
    }

    pub fn last_tick_ms(&self) -> f64 {
        self.last_tick_ms
    }

    // ── Frame step ──

    /// Run one frame: pinch classification, ray cast, correlation, metrics.
    ///
    /// Does nothing once stopped.
    pub fn tick(&mut self, now_ms: f64) -> Vec<InteractionEvent> {
        if !self.running {
            return Vec::new();
        }
        self.ticks += 1;
        self.last_tick_ms = now_ms;
        self.metrics.tick_frame(now_ms);

        let frame = self.latest_frame.as_ref();
        let captured_ms = frame.map(|f| f.captured_ms).unwrap_or(now_ms);
        let pinch_event = self.pinch.update(frame.and_then(|f| f.hand()), captured_ms);

        let point = frame.and_then(|f| f.index_tip_xy());
        let ray = pointing_ray(self.camera.as_ref(), point);
        let hit = ray.as_ref().and_then(|r| cast_ray(r, &self.targets));
        self.current_hit = hit;

        let events = self.correlator.update(
            now_ms,
            hit.as_ref(),
            pinch_event.as_ref(),
            ray.as_ref(),
            &mut self.targets,
            &mut self.metrics,
        );
        if !events.is_empty() {
            debug!("Tick {}: {} interaction event(s)", self.ticks, events.len());
        }
        events
    }

    /// Stop ticking. No state changes after this.
    pub fn stop(&mut self) {
        if self.running {
            info!(
                "Interaction loop stopped after {} ticks, {} frames",
                self.ticks, self.frames_received
            );
        }
        self.running = false;
    }

    /// Start a new metrics session at `now_ms`.
    pub fn reset_session(&mut self, now_ms: f64) {
        self.metrics.reset(now_ms);
        self.correlator.reset();
    }

    // ── Scene management ──

    pub fn next_target_id(&self) -> u64 {
        self.targets.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    pub fn add_target(&mut self, target: Target) -> Result<()> {
        if self.targets.iter().any(|t| t.id == target.id) {
            bail!("target {} already exists", target.id);
        }
        if target.pick_bounds().is_none() {
            bail!("target {} has invalid bounds", target.id);
        }
        info!("Target added: {} ({})", target.id, target.label);
        self.targets.push(target);
        Ok(())
    }

    /// Remove a target. Returns whether it existed.
    pub fn remove_target(&mut self, id: u64) -> bool {
        let before = self.targets.len();
        self.targets.retain(|t| t.id != id);
        let removed = self.targets.len() != before;
        if removed {
            info!("Target removed: {}", id);
        }
        removed
    }

    pub fn set_camera(&mut self, camera: Option<Camera>) -> Result<()> {
        if let Some(cam) = &camera {
            ensure!(cam.is_valid(), "camera parameters are invalid");
        }
        info!("Camera {}", if camera.is_some() { "set" } else { "cleared" });
        self.camera = camera;
        Ok(())
    }

    pub fn targets_sexp(&self) -> String {
        let items: Vec<String> = self.targets.iter().map(|t| t.to_sexp()).collect();
        format!("({})", items.join(" "))
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:running {} :ticks {} :frames {} :hand {} :hit {} :pinch {} :correlator {} :fps {})",
            if self.running { "t" } else { "nil" },
            self.ticks,
            self.frames_received,
            if self.latest_frame.as_ref().and_then(|f| f.hand()).is_some() {
                "t"
            } else {
                "nil"
            },
            self.current_hit
                .map(|h| h.to_sexp())
                .unwrap_or_else(|| "nil".to_string()),
            self.pinch.status_sexp(),
            self.correlator.status_sexp(),
            self.metrics.frame_rate().status_sexp(),
        )
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Hand whose index tip sits at normalized (x, y) with the given pinch gap.
#[cfg(test)]
pub(crate) fn hand_pointing_at(x: f32, y: f32, pinch_distance: f32) -> Vec<crate::hand::Landmark> {
    use crate::hand::landmarks::{INDEX_TIP, THUMB_TIP};
    use crate::hand::Landmark;
    let mut hand = crate::hand::pinch::hand_with_pinch_distance(0.1);
    hand[INDEX_TIP] = Landmark::new(x, y, 0.0);
    hand[THUMB_TIP] = Landmark::new(x - pinch_distance, y, 0.0);
    hand
}
