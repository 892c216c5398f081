//! Bounded, ordered log of interaction events.

use std::collections::VecDeque;
use std::str::FromStr;

use tracing::debug;

// ── Event kinds ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricEventKind {
    PointingStart,
    PointingEnd,
    PinchStart,
    PinchEnd,
    ToggleSuccess,
    Miss,
}

impl MetricEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PointingStart => "pointing_start",
            Self::PointingEnd => "pointing_end",
            Self::PinchStart => "pinch_start",
            Self::PinchEnd => "pinch_end",
            Self::ToggleSuccess => "toggle_success",
            Self::Miss => "miss",
        }
    }
}

impl FromStr for MetricEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pointing_start" => Ok(Self::PointingStart),
            "pointing_end" => Ok(Self::PointingEnd),
            "pinch_start" => Ok(Self::PinchStart),
            "pinch_end" => Ok(Self::PinchEnd),
            "toggle_success" => Ok(Self::ToggleSuccess),
            "miss" => Ok(Self::Miss),
            other => Err(format!("unknown event type {other:?}")),
        }
    }
}

// ── Event record ───────────────────────────────────────────

/// Type-specific fields; absent ones stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPayload {
    pub target_id: Option<u64>,
    pub latency_ms: Option<f64>,
    pub dwell_ms: Option<f64>,
    pub distance: Option<f64>,
    pub success: Option<bool>,
}

/// Immutable log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    pub id: u64,
    pub kind: MetricEventKind,
    /// Milliseconds since session start.
    pub timestamp_ms: f64,
    pub payload: EventPayload,
}

impl MetricEvent {
    pub fn to_sexp(&self) -> String {
        let mut s = format!(
            "(:id {} :type :{} :t {:.0}",
            self.id,
            self.kind.as_str().replace('_', "-"),
            self.timestamp_ms
        );
        let p = &self.payload;
        if let Some(id) = p.target_id {
            s.push_str(&format!(" :target {id}"));
        }
        if let Some(v) = p.latency_ms {
            s.push_str(&format!(" :latency-ms {v:.1}"));
        }
        if let Some(v) = p.dwell_ms {
            s.push_str(&format!(" :dwell-ms {v:.1}"));
        }
        if let Some(v) = p.distance {
            s.push_str(&format!(" :distance {v:.3}"));
        }
        if let Some(ok) = p.success {
            s.push_str(if ok { " :success t" } else { " :success nil" });
        }
        s.push(')');
        s
    }
}

// ── Log ────────────────────────────────────────────────────

/// FIFO log; the oldest entry is evicted once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<MetricEvent>,
    capacity: usize,
    next_id: u64,
    evicted: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
            evicted: 0,
        }
    }

    /// Append an event and return its id.
    pub fn push(&mut self, kind: MetricEventKind, timestamp_ms: f64, payload: EventPayload) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.entries.len() >= self.capacity {
            if let Some(old) = self.entries.pop_front() {
                self.evicted += 1;
                debug!("Event log full, evicted event {}", old.id);
            }
        }
        self.entries.push_back(MetricEvent {
            id,
            kind,
            timestamp_ms,
            payload,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries dropped since the last clear.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricEvent> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&MetricEvent> {
        self.entries.back()
    }

    /// Drop every entry and restart id numbering.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_id = 1;
        self.evicted = 0;
    }
}
