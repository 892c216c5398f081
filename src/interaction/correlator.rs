//! Interaction correlation — combines pinch edges with ray hits.
//!
//! Runs once per frame after the ray cast and pinch classifier:
//! pointing transitions (dwell tracking) first, then the pinch edge.
//! A pinch start on a hit target toggles it and records a success; on empty
//! space it records a miss with the nearest-approach gap. A pinch end
//! records how the gesture resolved.

use tracing::{debug, info};

use super::raycast::{nearest_approach, Hit};
use crate::hand::{PinchEvent, PinchEventKind};
use crate::metrics::MetricsAggregator;
use crate::scene::{Ray, Target};

// ── Config ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Pointing intervals shorter than this are not dwell samples.
    pub min_dwell_ms: f64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self { min_dwell_ms: 500.0 }
    }
}

impl CorrelatorConfig {
    pub fn to_sexp(&self) -> String {
        format!("(:min-dwell-ms {:.0})", self.min_dwell_ms)
    }
}

// ── Events ─────────────────────────────────────────────────

/// Outcome of one frame's correlation.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    PointingStarted {
        target_id: u64,
    },
    PointingEnded {
        target_id: u64,
        dwell_ms: f64,
        /// Whether the interval counted as a dwell sample.
        counted: bool,
    },
    Toggled {
        target_id: u64,
        now_on: bool,
        latency_ms: f64,
    },
    Missed {
        nearest_target: Option<u64>,
        distance: Option<f32>,
        near_miss: bool,
    },
    GestureResolved {
        success: bool,
    },
}

impl InteractionEvent {
    pub fn to_sexp(&self) -> String {
        match self {
            Self::PointingStarted { target_id } => {
                format!("(:type :event :event :pointing-started :target {})", target_id)
            }
            Self::PointingEnded {
                target_id,
                dwell_ms,
                counted,
            } => format!(
                "(:type :event :event :pointing-ended :target {} :dwell-ms {:.0} :counted {})",
                target_id,
                dwell_ms,
                if *counted { "t" } else { "nil" }
            ),
            Self::Toggled {
                target_id,
                now_on,
                latency_ms,
            } => format!(
                "(:type :event :event :target-toggled :target {} :on {} :latency-ms {:.1})",
                target_id,
                if *now_on { "t" } else { "nil" },
                latency_ms
            ),
            Self::Missed {
                nearest_target,
                distance,
                near_miss,
            } => format!(
                "(:type :event :event :pinch-missed :nearest {} :distance {} :near-miss {})",
                nearest_target
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "nil".to_string()),
                distance
                    .map(|d| format!("{:.3}", d))
                    .unwrap_or_else(|| "nil".to_string()),
                if *near_miss { "t" } else { "nil" }
            ),
            Self::GestureResolved { success } => format!(
                "(:type :event :event :gesture-resolved :success {})",
                if *success { "t" } else { "nil" }
            ),
        }
    }
}

// ── Correlator ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InteractionCorrelator {
    pub config: CorrelatorConfig,
    /// Target currently pointed at and when pointing began.
    pointing: Option<(u64, f64)>,
    /// Outcome of the gesture in progress, set on pinch start.
    gesture: Option<bool>,
}

impl InteractionCorrelator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Self {
            config,
            pointing: None,
            gesture: None,
        }
    }

    pub fn pointed_target(&self) -> Option<u64> {
        self.pointing.map(|(id, _)| id)
    }

    /// Whether a pinch started and has not yet ended.
    pub fn gesture_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Correlate one frame.
    pub fn update(
        &mut self,
        now_ms: f64,
        hit: Option<&Hit>,
        pinch: Option<&PinchEvent>,
        ray: Option<&Ray>,
        targets: &mut [Target],
        metrics: &mut MetricsAggregator,
    ) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        self.track_pointing(now_ms, hit.map(|h| h.target_id), metrics, &mut events);

        if let Some(pinch) = pinch {
            match pinch.kind {
                PinchEventKind::Start => {
                    events.push(self.on_pinch_start(now_ms, pinch, hit, ray, targets, metrics));
                }
                PinchEventKind::End => match self.gesture.take() {
                    Some(success) => {
                        metrics.record_pinch_end(now_ms, success);
                        events.push(InteractionEvent::GestureResolved { success });
                    }
                    // The matching start belongs to an earlier session.
                    None => debug!("Pinch end without a start in this session, ignored"),
                },
            }
        }
        events
    }

    fn track_pointing(
        &mut self,
        now_ms: f64,
        current: Option<u64>,
        metrics: &mut MetricsAggregator,
        events: &mut Vec<InteractionEvent>,
    ) {
        if self.pointed_target() == current {
            return;
        }
        if let Some((target_id, since)) = self.pointing.take() {
            let dwell_ms = (now_ms - since).max(0.0);
            let counted = dwell_ms > self.config.min_dwell_ms;
            metrics.record_pointing_end(now_ms, target_id, counted.then_some(dwell_ms));
            debug!(
                "Pointing ended: target {} after {:.0}ms{}",
                target_id,
                dwell_ms,
                if counted { "" } else { " (below dwell threshold)" }
            );
            events.push(InteractionEvent::PointingEnded {
                target_id,
                dwell_ms,
                counted,
            });
        }
        if let Some(target_id) = current {
            self.pointing = Some((target_id, now_ms));
            metrics.record_pointing_start(now_ms, target_id);
            debug!("Pointing started: target {}", target_id);
            events.push(InteractionEvent::PointingStarted { target_id });
        }
    }

    fn on_pinch_start(
        &mut self,
        now_ms: f64,
        pinch: &PinchEvent,
        hit: Option<&Hit>,
        ray: Option<&Ray>,
        targets: &mut [Target],
        metrics: &mut MetricsAggregator,
    ) -> InteractionEvent {
        metrics.record_pinch_start(now_ms, pinch.distance);

        let hit_target = hit.and_then(|h| {
            targets
                .iter_mut()
                .find(|t| t.id == h.target_id)
                .map(|t| (t, h.distance))
        });

        if let Some((target, distance)) = hit_target {
            target.toggle();
            let latency_ms = (now_ms - pinch.timestamp_ms).max(0.0);
            metrics.record_toggle_success(now_ms, target.id, latency_ms, distance);
            info!(
                "Pinch toggled target {} ({}) {}",
                target.id,
                target.label,
                if target.on { "on" } else { "off" }
            );
            self.gesture = Some(true);
            return InteractionEvent::Toggled {
                target_id: target.id,
                now_on: target.on,
                latency_ms,
            };
        }

        let nearest = ray.and_then(|r| nearest_approach(r, targets));
        let near_miss = metrics.record_miss(now_ms, nearest);
        debug!("Pinch missed: nearest {:?}", nearest);
        self.gesture = Some(false);
        InteractionEvent::Missed {
            nearest_target: nearest.map(|(id, _)| id),
            distance: nearest.map(|(_, d)| d),
            near_miss,
        }
    }

    /// Forget pointing and gesture state without recording anything.
    pub fn reset(&mut self) {
        self.pointing = None;
        self.gesture = None;
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:pointing {} :gesture {} :config {})",
            self.pointed_target()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "nil".to_string()),
            match self.gesture {
                Some(true) => ":hit",
                Some(false) => ":miss",
                None => "nil",
            },
            self.config.to_sexp(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricEventKind;
    use crate::scene::{default_targets, Vec3};

    fn hit(target_id: u64) -> Hit {
        Hit {
            target_id,
            point: Vec3::ZERO,
            distance: 4.4,
        }
    }

    fn pinch(kind: PinchEventKind, timestamp_ms: f64) -> PinchEvent {
        PinchEvent {
            kind,
            strength: 0.9,
            distance: Some(0.025),
            thumb_tip: None,
            index_tip: None,
            timestamp_ms,
            synthetic: false,
        }
    }

    fn dwell_after(interval_ms: f64) -> Vec<InteractionEvent> {
        let mut c = InteractionCorrelator::default();
        let mut m = MetricsAggregator::default();
        let mut targets = default_targets();
        c.update(1000.0, Some(&hit(2)), None, None, &mut targets, &mut m);
        c.update(1000.0 + interval_ms, None, None, None, &mut targets, &mut m)
    }

    #[test]
    fn test_short_dwell_not_counted() {
        let events = dwell_after(300.0);
        assert_eq!(
            events,
            vec![InteractionEvent::PointingEnded {
                target_id: 2,
                dwell_ms: 300.0,
                counted: false
            }]
        );
    }

    #[test]
    fn test_long_dwell_counted() {
        let mut c = InteractionCorrelator::default();
        let mut m = MetricsAggregator::default();
        let mut targets = default_targets();
        c.update(1000.0, Some(&hit(2)), None, None, &mut targets, &mut m);
        c.update(1300.0, Some(&hit(2)), None, None, &mut targets, &mut m);
        let events = c.update(1600.0, Some(&hit(3)), None, None, &mut targets, &mut m);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            InteractionEvent::PointingEnded { target_id: 2, counted: true, .. }
        ));
        assert_eq!(events[1], InteractionEvent::PointingStarted { target_id: 3 });
        assert_eq!(m.summary(1600.0).average_dwell_ms, 600.0);
        assert_eq!(c.pointed_target(), Some(3));
    }

    #[test]
    fn test_same_target_emits_nothing() {
        let mut c = InteractionCorrelator::default();
        let mut m = MetricsAggregator::default();
        let mut targets = default_targets();
        assert_eq!(c.update(0.0, Some(&hit(1)), None, None, &mut targets, &mut m).len(), 1);
        for i in 1..10 {
            let t = i as f64 * 16.0;
            assert!(c.update(t, Some(&hit(1)), None, None, &mut targets, &mut m).is_empty());
        }
    }

    #[test]
    fn test_pinch_on_target_toggles() {
        let mut c = InteractionCorrelator::default();
        let mut m = MetricsAggregator::default();
        let mut targets = default_targets();
        let start = pinch(PinchEventKind::Start, 990.0);
        let events = c.update(1000.0, Some(&hit(2)), Some(&start), None, &mut targets, &mut m);
        assert_eq!(
            events.last(),
            Some(&InteractionEvent::Toggled {
                target_id: 2,
                now_on: true,
                latency_ms: 10.0
            })
        );
        assert!(targets[1].on);
        assert!(!targets[0].on);
        assert!(c.gesture_active());

        let end = pinch(PinchEventKind::End, 1200.0);
        let events = c.update(1200.0, Some(&hit(2)), Some(&end), None, &mut targets, &mut m);
        assert_eq!(events, vec![InteractionEvent::GestureResolved { success: true }]);
        assert!(!c.gesture_active());

        let s = m.summary(1200.0);
        assert_eq!(s.successful_hits, 1);
        assert_eq!(s.average_latency_ms, 10.0);
    }

    #[test]
    fn test_pinch_on_empty_space_misses() {
        let mut c = InteractionCorrelator::default();
        let mut m = MetricsAggregator::default();
        let mut targets = default_targets();
        // Passes 0.3 above the center sphere (radius 0.6).
        let ray = Ray::new(Vec3::new(0.0, 0.9, 5.0), Vec3::NEG_Z);
        let start = pinch(PinchEventKind::Start, 0.0);
        let events = c.update(0.0, None, Some(&start), Some(&ray), &mut targets, &mut m);
        match &events[0] {
            InteractionEvent::Missed {
                nearest_target,
                distance,
                near_miss,
            } => {
                assert_eq!(*nearest_target, Some(2));
                assert!((distance.unwrap_or(f32::MAX) - 0.3).abs() < 1e-4);
                assert!(*near_miss);
            }
            other => panic!("expected miss, got {:?}", other),
        }
        assert!(targets.iter().all(|t| !t.on));

        let end = pinch(PinchEventKind::End, 100.0);
        let events = c.update(100.0, None, Some(&end), None, &mut targets, &mut m);
        assert_eq!(events, vec![InteractionEvent::GestureResolved { success: false }]);
        assert_eq!(m.summary(100.0).near_misses, 1);
    }

    #[test]
    fn test_end_without_start_is_ignored() {
        let mut c = InteractionCorrelator::default();
        let mut m = MetricsAggregator::default();
        let mut targets = default_targets();
        let end = pinch(PinchEventKind::End, 0.0);
        let events = c.update(0.0, None, Some(&end), None, &mut targets, &mut m);
        assert!(events.is_empty());
        assert_eq!(m.event_log().len(), 0);
    }

    #[test]
    fn test_dwell_at_threshold_not_counted() {
        let events = dwell_after(500.0);
        assert_eq!(
            events,
            vec![InteractionEvent::PointingEnded {
                target_id: 2,
                dwell_ms: 500.0,
                counted: false
            }]
        );
    }

    #[test]
    fn test_stale_hit_counts_as_miss() {
        let mut c = InteractionCorrelator::default();
        let mut m = MetricsAggregator::default();
        let mut targets = default_targets();
        let start = pinch(PinchEventKind::Start, 0.0);
        let events = c.update(0.0, Some(&hit(99)), Some(&start), None, &mut targets, &mut m);
        assert!(matches!(events.last(), Some(InteractionEvent::Missed { .. })));
    }

    #[test]
    fn test_seven_hits_three_misses() {
        let mut c = InteractionCorrelator::default();
        let mut m = MetricsAggregator::default();
        let mut targets = default_targets();
        let mut t = 0.0;
        for i in 0..10 {
            let h = if i < 7 { Some(hit(1)) } else { None };
            let start = pinch(PinchEventKind::Start, t);
            c.update(t, h.as_ref(), Some(&start), None, &mut targets, &mut m);
            t += 100.0;
            let end = pinch(PinchEventKind::End, t);
            c.update(t, h.as_ref(), Some(&end), None, &mut targets, &mut m);
            t += 100.0;
        }
        let s = m.summary(t);
        assert_eq!(s.accuracy_pct, 70.0);
        assert_eq!(s.miss_to_hit_ratio, 0.43);
        // Seven toggles leave target 1 on.
        assert!(targets[0].on);
        let kinds: Vec<_> = m.events().map(|e| e.kind).collect();
        assert_eq!(kinds.iter().filter(|k| **k == MetricEventKind::PinchEnd).count(), 10);
    }
}
