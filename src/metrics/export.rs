//! Tabular text export of a metrics session, and its parser.
//!
//! Layout: a `Metric,Value,Unit,Description` table with fixed rows, a blank
//! line, then an `Event ID,Type,Timestamp,Target ID,Latency,Dwell Time,
//! Distance,Success` table with one row per logged event. Absent fields are
//! empty; success is `true`/`false`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use super::aggregator::{MetricsAggregator, MetricsSummary};
use super::event_log::{EventPayload, MetricEvent, MetricEventKind};

pub const SUMMARY_HEADER: &str = "Metric,Value,Unit,Description";
pub const EVENT_HEADER: &str =
    "Event ID,Type,Timestamp,Target ID,Latency,Dwell Time,Distance,Success";

/// A parsed export file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExport {
    pub summary: MetricsSummary,
    /// Wall-clock export time, Unix milliseconds.
    pub exported_at_unix_ms: u64,
    pub events: Vec<MetricEvent>,
}

pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ── Writing ────────────────────────────────────────────────

fn field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn opt<T>(value: Option<T>, fmt: impl Fn(T) -> String) -> String {
    value.map(fmt).unwrap_or_default()
}

fn row(fields: &[String]) -> String {
    fields.iter().map(|f| field(f)).collect::<Vec<_>>().join(",")
}

/// Render `summary` and `events` as export text.
pub fn render<'a>(
    summary: &MetricsSummary,
    events: impl IntoIterator<Item = &'a MetricEvent>,
    exported_at_unix_ms: u64,
) -> String {
    let s = summary;
    let metrics: [(&str, String, &str, &str); 13] = [
        ("Accuracy", format!("{:.2}", s.accuracy_pct), "%", "Successful hits / total attempts"),
        ("Total Attempts", s.total_attempts.to_string(), "count", "Pinch gestures started"),
        ("Successful Hits", s.successful_hits.to_string(), "count", "Pinches that toggled a target"),
        ("Misses", s.misses.to_string(), "count", "Pinches with no target under the ray"),
        ("Near Misses", s.near_misses.to_string(), "count", "Misses within the near-miss distance"),
        ("Miss-to-Hit Ratio", format!("{:.2}", s.miss_to_hit_ratio), "ratio", "Misses per successful hit"),
        ("Average Latency", format!("{:.2}", s.average_latency_ms), "ms", "Pinch start to toggle"),
        ("Average Dwell Time", format!("{:.2}", s.average_dwell_ms), "ms", "Mean counted pointing interval"),
        ("Average FPS", format!("{:.0}", s.average_fps), "fps", "Rolling frame rate"),
        ("FPS Stability", format!("{:.3}", s.fps_stability), "cv", "Std dev / mean fps (lower is steadier)"),
        ("Session Duration", s.session_duration_s.to_string(), "s", "Time since session start"),
        ("Total Events", s.total_events.to_string(), "count", "Events in the log"),
        ("Timestamp", exported_at_unix_ms.to_string(), "unix-ms", "Export time"),
    ];

    let mut out = String::new();
    out.push_str(SUMMARY_HEADER);
    out.push('\n');
    for (name, value, unit, desc) in metrics {
        out.push_str(&row(&[name.into(), value, unit.into(), desc.into()]));
        out.push('\n');
    }
    out.push('\n');
    out.push_str(EVENT_HEADER);
    out.push('\n');
    for e in events {
        let p = &e.payload;
        out.push_str(&row(&[
            e.id.to_string(),
            e.kind.as_str().to_string(),
            format!("{:.1}", e.timestamp_ms),
            opt(p.target_id, |v| v.to_string()),
            opt(p.latency_ms, |v| format!("{v:.2}")),
            opt(p.dwell_ms, |v| format!("{v:.2}")),
            opt(p.distance, |v| format!("{v:.3}")),
            opt(p.success, |v| v.to_string()),
        ]));
        out.push('\n');
    }
    out
}

/// Render the aggregator's current session.
pub fn export_text(metrics: &MetricsAggregator, now_ms: f64) -> String {
    render(&metrics.summary(now_ms), metrics.events(), unix_now_ms())
}

/// Write the current session to `path`.
pub fn write_export(metrics: &MetricsAggregator, now_ms: f64, path: &Path) -> Result<()> {
    let text = export_text(metrics, now_ms);
    std::fs::write(path, text)
        .with_context(|| format!("failed to write metrics export to {}", path.display()))?;
    info!(
        "Exported {} events to {}",
        metrics.event_log().len(),
        path.display()
    );
    Ok(())
}

// ── Parsing ────────────────────────────────────────────────

fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    fields.push(cur);
    fields
}

fn parse_opt<T: std::str::FromStr>(s: &str, what: &str, line_no: usize) -> Result<Option<T>> {
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<T>()
        .map(Some)
        .map_err(|_| anyhow::anyhow!("line {line_no}: invalid {what} {s:?}"))
}

fn parse_req<T: std::str::FromStr>(s: &str, what: &str, line_no: usize) -> Result<T> {
    parse_opt(s, what, line_no)?.with_context(|| format!("line {line_no}: missing {what}"))
}

/// Parse text produced by [`render`].
pub fn parse_export(text: &str) -> Result<ParsedExport> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim_end_matches('\r')));

    match lines.next() {
        Some((_, SUMMARY_HEADER)) => {}
        other => bail!("expected summary header, found {:?}", other.map(|(_, l)| l)),
    }

    let mut summary = MetricsSummary::default();
    let mut exported_at_unix_ms: u64 = 0;
    let mut seen = 0usize;
    for (line_no, line) in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        let fields = split_fields(line);
        if fields.len() < 2 {
            bail!("line {line_no}: expected metric row, found {line:?}");
        }
        let value = fields[1].as_str();
        match fields[0].as_str() {
            "Accuracy" => summary.accuracy_pct = parse_req(value, "accuracy", line_no)?,
            "Total Attempts" => summary.total_attempts = parse_req(value, "attempts", line_no)?,
            "Successful Hits" => summary.successful_hits = parse_req(value, "hits", line_no)?,
            "Misses" => summary.misses = parse_req(value, "misses", line_no)?,
            "Near Misses" => summary.near_misses = parse_req(value, "near misses", line_no)?,
            "Miss-to-Hit Ratio" => summary.miss_to_hit_ratio = parse_req(value, "ratio", line_no)?,
            "Average Latency" => summary.average_latency_ms = parse_req(value, "latency", line_no)?,
            "Average Dwell Time" => summary.average_dwell_ms = parse_req(value, "dwell", line_no)?,
            "Average FPS" => summary.average_fps = parse_req(value, "fps", line_no)?,
            "FPS Stability" => summary.fps_stability = parse_req(value, "stability", line_no)?,
            "Session Duration" => summary.session_duration_s = parse_req(value, "duration", line_no)?,
            "Total Events" => summary.total_events = parse_req(value, "event count", line_no)?,
            "Timestamp" => exported_at_unix_ms = parse_req(value, "timestamp", line_no)?,
            other => bail!("line {line_no}: unknown metric {other:?}"),
        }
        seen += 1;
    }
    if seen != 13 {
        bail!("expected 13 metric rows, found {seen}");
    }

    match lines.next() {
        Some((_, EVENT_HEADER)) => {}
        other => bail!("expected event header, found {:?}", other.map(|(_, l)| l)),
    }

    let mut events = Vec::new();
    for (line_no, line) in lines {
        if line.is_empty() {
            continue;
        }
        let f = split_fields(line);
        if f.len() != 8 {
            bail!("line {line_no}: expected 8 event fields, found {}", f.len());
        }
        let kind = f[1]
            .parse::<MetricEventKind>()
            .map_err(|e| anyhow!("line {line_no}: {e}"))?;
        let success = match f[7].as_str() {
            "" => None,
            "true" => Some(true),
            "false" => Some(false),
            other => bail!("line {line_no}: invalid success flag {other:?}"),
        };
        events.push(MetricEvent {
            id: parse_req(&f[0], "event id", line_no)?,
            kind,
            timestamp_ms: parse_req(&f[2], "timestamp", line_no)?,
            payload: EventPayload {
                target_id: parse_opt(&f[3], "target id", line_no)?,
                latency_ms: parse_opt(&f[4], "latency", line_no)?,
                dwell_ms: parse_opt(&f[5], "dwell", line_no)?,
                distance: parse_opt(&f[6], "distance", line_no)?,
                success,
            },
        });
    }

    Ok(ParsedExport {
        summary,
        exported_at_unix_ms,
        events,
    })
}

/// Read and parse an export file.
pub fn read_export(path: &Path) -> Result<ParsedExport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read metrics export {}", path.display()))?;
    parse_export(&text).with_context(|| format!("malformed metrics export {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> MetricsAggregator {
        let mut m = MetricsAggregator::default();
        let mut t = 0.0;
        for i in 0..30 {
            t += if i % 2 == 0 { 11.0 } else { 33.0 };
            m.tick_frame(t);
        }
        m.record_pointing_start(100.0, 2);
        m.record_pinch_start(200.0, Some(0.031));
        m.record_toggle_success(216.0, 2, 16.0, 4.4);
        m.record_pinch_end(400.0, true);
        m.record_pointing_end(900.0, 2, Some(800.0));
        m.record_pinch_start(1000.0, Some(0.029));
        m.record_miss(1016.0, Some((3, 0.25)));
        m.record_pinch_end(1200.0, false);
        m
    }

    #[test]
    fn test_layout() {
        let m = sample_session();
        let text = render(&m.summary(2500.0), m.events(), 42);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], SUMMARY_HEADER);
        assert!(lines[1].starts_with("Accuracy,50.00,%,"));
        assert_eq!(lines[13], "Timestamp,42,unix-ms,Export time");
        assert_eq!(lines[14], "");
        assert_eq!(lines[15], EVENT_HEADER);
        assert_eq!(lines.len(), 16 + 8);
        assert_eq!(lines[16], "1,pointing_start,100.0,2,,,,");
        assert_eq!(lines[19], "4,pinch_end,400.0,,,,,true");
    }

    #[test]
    fn test_round_trip() {
        let m = sample_session();
        let summary = m.summary(2500.0);
        let text = render(&summary, m.events(), 1_700_000_000_000);
        let parsed = parse_export(&text).unwrap();
        assert_eq!(parsed.summary, summary);
        assert_eq!(parsed.exported_at_unix_ms, 1_700_000_000_000);
        assert_eq!(parsed.events.len(), 8);
        for (a, b) in parsed.events.iter().zip(m.events()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.payload.target_id, b.payload.target_id);
            assert_eq!(a.payload.success, b.payload.success);
            assert!((a.timestamp_ms - b.timestamp_ms).abs() < 0.05);
            match (a.payload.distance, b.payload.distance) {
                (Some(x), Some(y)) => assert!((x - y).abs() < 1e-3),
                (x, y) => assert_eq!(x, y),
            }
        }
    }

    #[test]
    fn test_quoted_fields() {
        assert_eq!(field("a,b"), "\"a,b\"");
        assert_eq!(split_fields("x,\"a,b\",\"say \"\"hi\"\"\","), vec!["x", "a,b", "say \"hi\"", ""]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_export("").is_err());
        assert!(parse_export("not,a,header\n").is_err());
        let m = MetricsAggregator::default();
        let text = render(&m.summary(0.0), m.events(), 0);
        let broken = text.replace("pointing_start", "x") + "1,teleport,0.0,,,,,\n";
        assert!(parse_export(&broken).is_err());
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let m = sample_session();
        write_export(&m, 2500.0, &path).unwrap();
        let parsed = read_export(&path).unwrap();
        assert_eq!(parsed.summary, m.summary(2500.0));
        assert!(parsed.exported_at_unix_ms > 0);
    }
}
