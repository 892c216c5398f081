//! Interaction telemetry — event log, frame rate, session summary, export.

pub mod aggregator;
pub mod event_log;
pub mod export;
pub mod frame_rate;

pub use aggregator::{MetricsAggregator, MetricsConfig, MetricsSummary};
pub use event_log::{EventLog, EventPayload, MetricEvent, MetricEventKind};
pub use export::{parse_export, read_export, write_export, ParsedExport};
pub use frame_rate::FrameRateTracker;
