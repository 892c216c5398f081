//! Console message dispatch — parse s-expressions and route to handlers.
//!
//! One message per line. Frames carry landmarks and produce no response;
//! every other message gets a `(:type :response :id N :status ...)` reply.

use std::path::Path;

use lexpr::Value;
use tracing::{debug, warn};

use crate::hand::{HandFrame, Landmark};
use crate::metrics::write_export;
use crate::scene::{Bounds, Camera, Target, Vec3};
use crate::state::InteractionState;

/// Parse an s-expression message and dispatch it.
/// Returns an optional response string (s-expression).
pub fn handle_message(state: &mut InteractionState, raw: &str, now_ms: f64) -> Option<String> {
    match parse_message(raw) {
        Ok(value) => handle_value(state, &value, now_ms),
        Err(reason) => Some(error_response(0, &reason)),
    }
}

/// Parse one console line.
pub fn parse_message(raw: &str) -> Result<Value, String> {
    lexpr::from_str(raw).map_err(|e| {
        warn!("malformed s-expression: {}", e);
        format!("malformed s-expression: {e}")
    })
}

/// The `:type` of a parsed message.
pub fn message_type(value: &Value) -> Option<String> {
    get_keyword(value, "type")
}

/// Recorded frame time (`:t`), used by replay as the session clock.
pub fn frame_time(value: &Value) -> Option<f64> {
    get_float(value, "t")
}

/// Dispatch an already parsed message.
pub fn handle_value(state: &mut InteractionState, value: &Value, now_ms: f64) -> Option<String> {
    let msg_type = message_type(value);
    let msg_id = get_int(value, "id").unwrap_or(0);

    match msg_type.as_deref() {
        Some("frame") => handle_frame(state, msg_id, value, now_ms),
        Some("ping") => handle_ping(state, msg_id, now_ms),
        Some("status") => handle_status(state, msg_id),
        Some("metrics-summary") => handle_metrics_summary(state, msg_id, now_ms),
        Some("metrics-reset") => handle_metrics_reset(state, msg_id, now_ms),
        Some("metrics-export") => handle_metrics_export(state, msg_id, value, now_ms),
        Some("metrics-config") => handle_metrics_config(state, msg_id, value),
        Some("pinch-status") => handle_pinch_status(state, msg_id),
        Some("pinch-config") => handle_pinch_config(state, msg_id, value),
        Some("dwell-config") => handle_dwell_config(state, msg_id, value),
        Some("target-list") => handle_target_list(state, msg_id),
        Some("target-add") => handle_target_add(state, msg_id, value),
        Some("target-remove") => handle_target_remove(state, msg_id, value),
        Some("camera-set") => handle_camera_set(state, msg_id, value),
        Some(other) => {
            warn!("unknown message type: {}", other);
            Some(error_response(msg_id, &format!("unknown message type: {other}")))
        }
        None => Some(error_response(msg_id, "missing :type")),
    }
}

// ── Frames ─────────────────────────────────────────────────

fn handle_frame(
    state: &mut InteractionState,
    msg_id: i64,
    value: &Value,
    now_ms: f64,
) -> Option<String> {
    let captured_ms = get_float(value, "captured").unwrap_or(now_ms);
    match parse_landmarks(get_value(value, "landmarks")) {
        Ok(Some(landmarks)) => {
            state.submit_frame(Some(HandFrame::new(landmarks, captured_ms)));
            None
        }
        Ok(None) => {
            state.submit_frame(None);
            None
        }
        Err(reason) => {
            warn!("rejected frame: {}", reason);
            // An unreadable frame reads as no hand.
            state.submit_frame(None);
            Some(error_response(msg_id, &reason))
        }
    }
}

/// `None`, `nil`, or `()` mean no hand. Each point is `(x y z)`.
fn parse_landmarks(value: Option<&Value>) -> Result<Option<Vec<Landmark>>, String> {
    let Some(value) = value else {
        return Ok(None);
    };
    if is_nil(value) {
        return Ok(None);
    }
    let points = list_items(value).ok_or_else(|| "landmarks must be a list".to_string())?;
    points
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            parse_vec3(p)
                .map(|v| Landmark::new(v.x, v.y, v.z))
                .ok_or_else(|| format!("landmark {i} is not (x y z)"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

// ── Status & metrics ───────────────────────────────────────

fn handle_ping(state: &mut InteractionState, msg_id: i64, now_ms: f64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :version \"{}\" :running {} :time-ms {:.0})",
        msg_id,
        env!("CARGO_PKG_VERSION"),
        if state.running { "t" } else { "nil" },
        now_ms
    ))
}

fn handle_status(state: &mut InteractionState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :state {})",
        msg_id,
        state.status_sexp()
    ))
}

fn handle_metrics_summary(state: &mut InteractionState, msg_id: i64, now_ms: f64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :summary {})",
        msg_id,
        state.metrics.summary_sexp(now_ms)
    ))
}

fn handle_metrics_reset(state: &mut InteractionState, msg_id: i64, now_ms: f64) -> Option<String> {
    state.reset_session(now_ms);
    Some(ok_response(msg_id))
}

fn handle_metrics_export(
    state: &mut InteractionState,
    msg_id: i64,
    value: &Value,
    now_ms: f64,
) -> Option<String> {
    let path = match get_string(value, "path") {
        Some(p) if !p.is_empty() => p,
        _ => return Some(error_response(msg_id, "missing :path")),
    };
    match write_export(&state.metrics, now_ms, Path::new(&path)) {
        Ok(()) => Some(format!(
            "(:type :response :id {} :status :ok :path \"{}\" :events {})",
            msg_id,
            escape_string(&path),
            state.metrics.event_log().len()
        )),
        Err(e) => {
            warn!("metrics export failed: {:#}", e);
            Some(error_response(msg_id, &format!("{e:#}")))
        }
    }
}

fn handle_metrics_config(state: &mut InteractionState, msg_id: i64, value: &Value) -> Option<String> {
    if let Some(d) = get_float(value, "near-miss-distance") {
        if d < 0.0 {
            return Some(error_response(msg_id, "near-miss-distance must be >= 0"));
        }
        state.metrics.config.near_miss_distance = d as f32;
    }
    Some(format!(
        "(:type :response :id {} :status :ok :metrics {})",
        msg_id,
        state.metrics.config.to_sexp()
    ))
}

// ── Pinch & dwell ──────────────────────────────────────────

fn handle_pinch_status(state: &mut InteractionState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :pinch {})",
        msg_id,
        state.pinch.status_sexp()
    ))
}

fn handle_pinch_config(state: &mut InteractionState, msg_id: i64, value: &Value) -> Option<String> {
    let mut config = state.pinch.config.clone();
    if let Some(v) = get_float(value, "start") {
        config.start_threshold = v as f32;
    }
    if let Some(v) = get_float(value, "release") {
        config.release_threshold = v as f32;
    }
    if let Some(v) = get_float(value, "min-distance") {
        config.min_distance = v as f32;
    }
    if let Some(v) = get_float(value, "max-distance") {
        config.max_distance = v as f32;
    }
    if let Err(e) = state.pinch.set_config(config) {
        return Some(error_response(msg_id, &e.to_string()));
    }
    Some(format!(
        "(:type :response :id {} :status :ok :pinch {})",
        msg_id,
        state.pinch.status_sexp()
    ))
}

fn handle_dwell_config(state: &mut InteractionState, msg_id: i64, value: &Value) -> Option<String> {
    if let Some(ms) = get_float(value, "min-dwell-ms") {
        if ms < 0.0 {
            return Some(error_response(msg_id, "min-dwell-ms must be >= 0"));
        }
        state.correlator.config.min_dwell_ms = ms;
        debug!("Dwell threshold set to {:.0}ms", ms);
    }
    Some(format!(
        "(:type :response :id {} :status :ok :dwell {})",
        msg_id,
        state.correlator.config.to_sexp()
    ))
}

// ── Targets & camera ───────────────────────────────────────

fn handle_target_list(state: &mut InteractionState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :targets {})",
        msg_id,
        state.targets_sexp()
    ))
}

fn handle_target_add(state: &mut InteractionState, msg_id: i64, value: &Value) -> Option<String> {
    let id = match get_int(value, "target") {
        Some(id) if id > 0 => id as u64,
        Some(_) => return Some(error_response(msg_id, "target id must be positive")),
        None => state.next_target_id(),
    };
    let label = get_string(value, "label").unwrap_or_else(|| format!("target-{id}"));
    let shape = get_keyword(value, "shape").unwrap_or_else(|| "sphere".to_string());

    let bounds = match shape.as_str() {
        "sphere" => {
            let center = get_value(value, "center").and_then(parse_vec3);
            let radius = get_float(value, "radius");
            match (center, radius) {
                (Some(center), Some(radius)) => Bounds::Sphere {
                    center,
                    radius: radius as f32,
                },
                _ => return Some(error_response(msg_id, "sphere needs :center (x y z) and :radius")),
            }
        }
        "box" => {
            let min = get_value(value, "min").and_then(parse_vec3);
            let max = get_value(value, "max").and_then(parse_vec3);
            match (min, max) {
                (Some(min), Some(max)) => Bounds::Aabb { min, max },
                _ => return Some(error_response(msg_id, "box needs :min and :max (x y z)")),
            }
        }
        other => return Some(error_response(msg_id, &format!("unknown shape: {other}"))),
    };

    match state.add_target(Target::new(id, label, bounds)) {
        Ok(()) => Some(format!(
            "(:type :response :id {} :status :ok :target {})",
            msg_id, id
        )),
        Err(e) => Some(error_response(msg_id, &e.to_string())),
    }
}

fn handle_target_remove(state: &mut InteractionState, msg_id: i64, value: &Value) -> Option<String> {
    let id = match get_int(value, "target") {
        Some(id) if id > 0 => id as u64,
        _ => return Some(error_response(msg_id, "missing :target")),
    };
    if state.remove_target(id) {
        Some(ok_response(msg_id))
    } else {
        Some(error_response(msg_id, &format!("target {id} not found")))
    }
}

fn handle_camera_set(state: &mut InteractionState, msg_id: i64, value: &Value) -> Option<String> {
    let current = state.camera.clone().unwrap_or_default();
    let position = get_value(value, "position")
        .and_then(parse_vec3)
        .unwrap_or(current.position);
    let look_at = get_value(value, "look-at")
        .and_then(parse_vec3)
        .unwrap_or(current.position + current.forward);
    let fov = get_float(value, "fov").map(|f| f as f32).unwrap_or(current.fov_y_deg);
    let aspect = get_float(value, "aspect")
        .map(|a| a as f32)
        .unwrap_or(current.aspect);

    let camera = Camera::look_at(position, look_at, Vec3::Y, fov, aspect);
    if let Err(e) = state.set_camera(Some(camera)) {
        return Some(error_response(msg_id, &e.to_string()));
    }
    Some(format!(
        "(:type :response :id {} :status :ok :camera {})",
        msg_id,
        state
            .camera
            .as_ref()
            .map(|c| c.to_sexp())
            .unwrap_or_else(|| "nil".to_string())
    ))
}

// ── Helpers ────────────────────────────────────────────────

fn ok_response(id: i64) -> String {
    format!("(:type :response :id {} :status :ok)", id)
}

fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason \"{}\")",
        id,
        escape_string(reason)
    )
}

/// Escape a string for s-expression output.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn is_key(car: &Value, key: &str) -> bool {
    match car {
        Value::Keyword(k) => k.as_ref() == key,
        Value::Symbol(s) => s.strip_prefix(':') == Some(key),
        _ => false,
    }
}

/// The raw value following `:key` in a plist.
fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;
    while let Value::Cons(pair) = current {
        if is_key(pair.car(), key) {
            return match pair.cdr() {
                Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Extract a keyword value from an s-expression plist as text.
/// Handles both `Value::Keyword("key")` and `Value::Symbol(":key")` forms.
fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let val = get_value(value, key)?;
    Some(match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s: &str = v;
            s.strip_prefix(':').unwrap_or(s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "t" } else { "nil" }.to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        _ => val.to_string(),
    })
}

/// Extract an integer value from an s-expression plist.
fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a string value from an s-expression plist.
fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}

/// Extract a floating-point value from an s-expression plist.
fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|f| f.is_finite())
}

fn is_nil(value: &Value) -> bool {
    match value {
        Value::Null | Value::Nil => true,
        Value::Symbol(s) => s.as_ref() == "nil",
        _ => false,
    }
}

/// Elements of a proper list (or vector).
fn list_items(value: &Value) -> Option<Vec<&Value>> {
    if let Value::Vector(items) = value {
        return Some(items.iter().collect());
    }
    let mut items = Vec::new();
    let mut current = value;
    loop {
        match current {
            Value::Cons(pair) => {
                items.push(pair.car());
                current = pair.cdr();
            }
            Value::Null | Value::Nil => return Some(items),
            _ => return None,
        }
    }
}

fn as_number(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32).filter(|f| f.is_finite()),
        _ => None,
    }
}

/// `(x y z)` as a vector.
fn parse_vec3(value: &Value) -> Option<Vec3> {
    let items = list_items(value)?;
    if items.len() != 3 {
        return None;
    }
    Some(Vec3::new(
        as_number(items[0])?,
        as_number(items[1])?,
        as_number(items[2])?,
    ))
}
