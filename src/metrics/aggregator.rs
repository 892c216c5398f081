//! Session metrics — counters, latency/dwell samples, derived summary.

use tracing::{debug, info};

use super::event_log::{EventLog, EventPayload, MetricEvent, MetricEventKind};
use super::frame_rate::FrameRateTracker;

// ── Config ─────────────────────────────────────────────────

/// Tunables for metrics aggregation.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// A miss whose nearest-target gap is at most this is also a near miss.
    pub near_miss_distance: f32,
    /// Event log capacity before FIFO eviction.
    pub log_capacity: usize,
    /// Rolling fps window size.
    pub fps_window: usize,
    /// Samples required before fps statistics are reported.
    pub fps_min_samples: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            near_miss_distance: 0.5,
            log_capacity: 1000,
            fps_window: 60,
            fps_min_samples: 10,
        }
    }
}

impl MetricsConfig {
    pub fn to_sexp(&self) -> String {
        format!(
            "(:near-miss-distance {:.3} :log-capacity {} :fps-window {} :fps-min-samples {})",
            self.near_miss_distance, self.log_capacity, self.fps_window, self.fps_min_samples
        )
    }
}

// ── Summary ────────────────────────────────────────────────

/// Derived session summary, rounded to reporting precision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSummary {
    /// Percent, 2 dp.
    pub accuracy_pct: f64,
    pub total_attempts: u64,
    pub successful_hits: u64,
    pub misses: u64,
    pub near_misses: u64,
    /// misses / hits, or raw misses when there are no hits. 2 dp.
    pub miss_to_hit_ratio: f64,
    /// Milliseconds, 2 dp.
    pub average_latency_ms: f64,
    /// Milliseconds, 2 dp.
    pub average_dwell_ms: f64,
    pub average_fps: f64,
    /// Coefficient of variation, 3 dp.
    pub fps_stability: f64,
    /// Whole seconds.
    pub session_duration_s: u64,
    pub total_events: u64,
}

impl MetricsSummary {
    pub fn to_sexp(&self) -> String {
        format!(
            "(:accuracy {:.2} :attempts {} :hits {} :misses {} :near-misses {} :miss-to-hit {:.2} :avg-latency-ms {:.2} :avg-dwell-ms {:.2} :fps {:.0} :fps-stability {:.3} :duration-s {} :events {})",
            self.accuracy_pct,
            self.total_attempts,
            self.successful_hits,
            self.misses,
            self.near_misses,
            self.miss_to_hit_ratio,
            self.average_latency_ms,
            self.average_dwell_ms,
            self.average_fps,
            self.fps_stability,
            self.session_duration_s,
            self.total_events,
        )
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

// ── Aggregator ─────────────────────────────────────────────

/// Owns one session's worth of metrics.
#[derive(Debug)]
pub struct MetricsAggregator {
    pub config: MetricsConfig,
    log: EventLog,
    frame_rate: FrameRateTracker,
    hits: u64,
    misses: u64,
    near_misses: u64,
    latencies_ms: Vec<f64>,
    dwell_samples_ms: Vec<f64>,
    session_start_ms: f64,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(MetricsConfig::default(), 0.0)
    }
}

impl MetricsAggregator {
    pub fn new(config: MetricsConfig, now_ms: f64) -> Self {
        let log = EventLog::new(config.log_capacity);
        let frame_rate = FrameRateTracker::new(config.fps_window, config.fps_min_samples);
        Self {
            config,
            log,
            frame_rate,
            hits: 0,
            misses: 0,
            near_misses: 0,
            latencies_ms: Vec::new(),
            dwell_samples_ms: Vec::new(),
            session_start_ms: now_ms,
        }
    }

    fn relative(&self, now_ms: f64) -> f64 {
        (now_ms - self.session_start_ms).max(0.0)
    }

    fn push(&mut self, kind: MetricEventKind, now_ms: f64, payload: EventPayload) -> u64 {
        let ts = self.relative(now_ms);
        self.log.push(kind, ts, payload)
    }

    // ── Recording ──

    pub fn record_pointing_start(&mut self, now_ms: f64, target_id: u64) {
        self.push(
            MetricEventKind::PointingStart,
            now_ms,
            EventPayload {
                target_id: Some(target_id),
                ..Default::default()
            },
        );
    }

    /// `dwell_ms` is `Some` only for intervals long enough to count.
    pub fn record_pointing_end(&mut self, now_ms: f64, target_id: u64, dwell_ms: Option<f64>) {
        if let Some(dwell) = dwell_ms {
            self.dwell_samples_ms.push(dwell);
        }
        self.push(
            MetricEventKind::PointingEnd,
            now_ms,
            EventPayload {
                target_id: Some(target_id),
                dwell_ms,
                ..Default::default()
            },
        );
    }

    pub fn record_pinch_start(&mut self, now_ms: f64, distance: Option<f32>) {
        self.push(
            MetricEventKind::PinchStart,
            now_ms,
            EventPayload {
                distance: distance.map(f64::from),
                ..Default::default()
            },
        );
    }

    pub fn record_pinch_end(&mut self, now_ms: f64, success: bool) {
        self.push(
            MetricEventKind::PinchEnd,
            now_ms,
            EventPayload {
                success: Some(success),
                ..Default::default()
            },
        );
    }

    pub fn record_toggle_success(&mut self, now_ms: f64, target_id: u64, latency_ms: f64, distance: f32) {
        self.hits += 1;
        self.latencies_ms.push(latency_ms);
        self.push(
            MetricEventKind::ToggleSuccess,
            now_ms,
            EventPayload {
                target_id: Some(target_id),
                latency_ms: Some(latency_ms),
                distance: Some(f64::from(distance)),
                success: Some(true),
                ..Default::default()
            },
        );
    }

    /// Record a failed attempt. Returns whether it also counts as a near miss.
    pub fn record_miss(&mut self, now_ms: f64, nearest: Option<(u64, f32)>) -> bool {
        self.misses += 1;
        let near = nearest.is_some_and(|(_, d)| d <= self.config.near_miss_distance);
        if near {
            self.near_misses += 1;
            debug!("Near miss: {:?}", nearest);
        }
        self.push(
            MetricEventKind::Miss,
            now_ms,
            EventPayload {
                target_id: nearest.map(|(id, _)| id),
                distance: nearest.map(|(_, d)| f64::from(d)),
                success: Some(false),
                ..Default::default()
            },
        );
        near
    }

    /// Record a rendered frame for fps statistics.
    pub fn tick_frame(&mut self, now_ms: f64) {
        self.frame_rate.tick(now_ms);
    }

    // ── Queries ──

    pub fn attempts(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn events(&self) -> impl Iterator<Item = &MetricEvent> {
        self.log.iter()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn frame_rate(&self) -> &FrameRateTracker {
        &self.frame_rate
    }

    pub fn session_start_ms(&self) -> f64 {
        self.session_start_ms
    }

    /// Derive the summary as of `now_ms`.
    pub fn summary(&self, now_ms: f64) -> MetricsSummary {
        let attempts = self.attempts();
        let accuracy = if attempts > 0 {
            self.hits as f64 / attempts as f64 * 100.0
        } else {
            0.0
        };
        let ratio = if self.hits > 0 {
            self.misses as f64 / self.hits as f64
        } else {
            self.misses as f64
        };
        MetricsSummary {
            accuracy_pct: round_to(accuracy, 2),
            total_attempts: attempts,
            successful_hits: self.hits,
            misses: self.misses,
            near_misses: self.near_misses,
            miss_to_hit_ratio: round_to(ratio, 2),
            average_latency_ms: round_to(mean(&self.latencies_ms), 2),
            average_dwell_ms: round_to(mean(&self.dwell_samples_ms), 2),
            average_fps: self.frame_rate.average_fps(),
            fps_stability: round_to(self.frame_rate.stability(), 3),
            session_duration_s: (self.relative(now_ms) / 1000.0).floor() as u64,
            total_events: self.log.len() as u64,
        }
    }

    pub fn summary_sexp(&self, now_ms: f64) -> String {
        self.summary(now_ms).to_sexp()
    }

    /// Clear all session data and restart the session clock at `now_ms`.
    pub fn reset(&mut self, now_ms: f64) {
        info!(
            "Metrics reset after {} events ({} attempts)",
            self.log.len(),
            self.attempts()
        );
        self.log.clear();
        self.frame_rate.reset();
        self.hits = 0;
        self.misses = 0;
        self.near_misses = 0;
        self.latencies_ms.clear();
        self.dwell_samples_ms.clear();
        self.session_start_ms = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary() {
        let m = MetricsAggregator::default();
        let s = m.summary(0.0);
        assert_eq!(s.accuracy_pct, 0.0);
        assert_eq!(s.miss_to_hit_ratio, 0.0);
        assert_eq!(s.average_latency_ms, 0.0);
        assert_eq!(s.total_events, 0);
    }

    #[test]
    fn test_accuracy_and_ratio() {
        let mut m = MetricsAggregator::default();
        for i in 0..7 {
            m.record_toggle_success(i as f64 * 100.0, 1, 20.0, 4.0);
        }
        for i in 0..3 {
            m.record_miss(1000.0 + i as f64, None);
        }
        let s = m.summary(2000.0);
        assert_eq!(s.total_attempts, 10);
        assert_eq!(s.accuracy_pct, 70.0);
        assert_eq!(s.miss_to_hit_ratio, 0.43);
        assert_eq!(format!("{:.2}", s.accuracy_pct), "70.00");
    }

    #[test]
    fn test_ratio_without_hits_is_raw_misses() {
        let mut m = MetricsAggregator::default();
        m.record_miss(0.0, None);
        m.record_miss(1.0, None);
        assert_eq!(m.summary(2.0).miss_to_hit_ratio, 2.0);
    }

    #[test]
    fn test_near_miss_is_also_a_miss() {
        let mut m = MetricsAggregator::default();
        assert!(m.record_miss(0.0, Some((2, 0.3))));
        assert!(m.record_miss(0.0, Some((2, 0.5))));
        assert!(!m.record_miss(0.0, Some((2, 0.9))));
        assert!(!m.record_miss(0.0, None));
        let s = m.summary(0.0);
        assert_eq!(s.misses, 4);
        assert_eq!(s.near_misses, 2);
    }

    #[test]
    fn test_averages() {
        let mut m = MetricsAggregator::default();
        m.record_toggle_success(0.0, 1, 10.0, 1.0);
        m.record_toggle_success(0.0, 1, 15.0, 1.0);
        m.record_pointing_end(0.0, 1, Some(600.0));
        m.record_pointing_end(0.0, 1, None);
        m.record_pointing_end(0.0, 1, Some(700.0));
        let s = m.summary(0.0);
        assert_eq!(s.average_latency_ms, 12.5);
        assert_eq!(s.average_dwell_ms, 650.0);
    }

    #[test]
    fn test_session_duration_whole_seconds() {
        let m = MetricsAggregator::new(MetricsConfig::default(), 1000.0);
        assert_eq!(m.summary(3999.0).session_duration_s, 2);
        assert_eq!(m.summary(500.0).session_duration_s, 0);
    }

    #[test]
    fn test_timestamps_relative_to_session() {
        let mut m = MetricsAggregator::new(MetricsConfig::default(), 5000.0);
        m.record_pinch_start(5250.0, Some(0.03));
        let e = m.events().next().cloned();
        assert_eq!(e.map(|e| e.timestamp_ms), Some(250.0));
    }

    #[test]
    fn test_fps_in_summary() {
        let mut m = MetricsAggregator::default();
        for i in 0..=20 {
            m.tick_frame(i as f64 * 20.0);
        }
        let s = m.summary(400.0);
        assert_eq!(s.average_fps, 50.0);
        assert_eq!(s.fps_stability, 0.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut m = MetricsAggregator::default();
        m.record_toggle_success(10.0, 1, 10.0, 1.0);
        m.record_miss(20.0, Some((1, 0.1)));
        for i in 0..20 {
            m.tick_frame(i as f64 * 16.0);
        }
        m.reset(10_000.0);
        let s = m.summary(10_000.0);
        assert_eq!(s, MetricsSummary::default());
        assert_eq!(m.session_start_ms(), 10_000.0);
        assert!(m.frame_rate().samples.is_empty());
        assert_eq!(m.event_log().evicted(), 0);
        m.record_miss(10_100.0, None);
        let first = m.events().next().cloned();
        assert_eq!(first.as_ref().map(|e| e.id), Some(1));
        assert_eq!(first.map(|e| e.timestamp_ms), Some(100.0));
    }

    #[test]
    fn test_summary_sexp() {
        let mut m = MetricsAggregator::default();
        m.record_toggle_success(0.0, 1, 10.0, 1.0);
        let sexp = m.summary_sexp(0.0);
        assert!(sexp.starts_with("(:accuracy 100.00"));
        assert!(sexp.contains(":hits 1"));
    }
}
