//! Pinch recognition from thumb/index fingertip distance.
//!
//! Maps the thumb-index distance to a continuous strength in [0, 1] and
//! runs a two-threshold hysteresis state machine over it, emitting exactly
//! one event per rising edge (start) and one per falling edge (end).
//! Losing the hand while pinching emits a synthetic end.

use tracing::{debug, info};

use super::landmarks::{complete_hand, Landmark, INDEX_TIP, THUMB_TIP};

// ── Phase ──────────────────────────────────────────────────

/// Hysteresis state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinchPhase {
    Open,
    Pinching,
}

impl PinchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pinching => "pinching",
        }
    }
}

// ── Events ─────────────────────────────────────────────────

/// Edge direction of a pinch transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinchEventKind {
    Start,
    End,
}

impl PinchEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "pinch_start",
            Self::End => "pinch_end",
        }
    }
}

/// A pinch transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PinchEvent {
    pub kind: PinchEventKind,
    /// Strength at the moment of the transition.
    pub strength: f32,
    /// Thumb-index distance; `None` for a synthetic release.
    pub distance: Option<f32>,
    pub thumb_tip: Option<Landmark>,
    pub index_tip: Option<Landmark>,
    /// Capture time (ms) of the frame that produced the edge.
    pub timestamp_ms: f64,
    /// True when the hand disappeared mid-pinch.
    pub synthetic: bool,
}

impl PinchEvent {
    pub fn to_sexp(&self) -> String {
        format!(
            "(:type :event :event :{} :strength {:.3} :distance {} :synthetic {})",
            self.kind.as_str().replace('_', "-"),
            self.strength,
            self.distance
                .map(|d| format!("{:.4}", d))
                .unwrap_or_else(|| "nil".to_string()),
            if self.synthetic { "t" } else { "nil" },
        )
    }
}

// ── Config ─────────────────────────────────────────────────

/// Calibration and hysteresis thresholds.
#[derive(Debug, Clone)]
pub struct PinchConfig {
    /// Distance at (or below) which strength is 1.0.
    pub min_distance: f32,
    /// Distance at (or above) which strength is 0.0.
    pub max_distance: f32,
    /// Strength above which Open becomes Pinching.
    pub start_threshold: f32,
    /// Strength below which Pinching becomes Open.
    pub release_threshold: f32,
}

impl Default for PinchConfig {
    fn default() -> Self {
        Self {
            min_distance: 0.02,
            max_distance: 0.08,
            start_threshold: 0.7,
            release_threshold: 0.5,
        }
    }
}

impl PinchConfig {
    /// Reject configurations that would break the hysteresis band.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.min_distance < self.max_distance,
            "pinch min distance {} must be below max distance {}",
            self.min_distance,
            self.max_distance
        );
        anyhow::ensure!(
            self.release_threshold < self.start_threshold,
            "pinch release threshold {} must be below start threshold {}",
            self.release_threshold,
            self.start_threshold
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.start_threshold)
                && (0.0..=1.0).contains(&self.release_threshold),
            "pinch thresholds must lie within [0, 1]"
        );
        Ok(())
    }

    pub fn to_sexp(&self) -> String {
        format!(
            "(:min-distance {:.3} :max-distance {:.3} :start-threshold {:.2} :release-threshold {:.2})",
            self.min_distance, self.max_distance, self.start_threshold, self.release_threshold,
        )
    }
}

// ── Free functions ─────────────────────────────────────────

/// Thumb tip to index tip distance; `None` unless a complete hand is given.
pub fn pinch_distance(landmarks: &[Landmark]) -> Option<f32> {
    let hand = complete_hand(landmarks)?;
    let d = hand[THUMB_TIP].distance(&hand[INDEX_TIP]);
    d.is_finite().then_some(d)
}

/// Linear strength mapping, clamped to [0, 1].
pub fn pinch_strength(distance: f32, min_distance: f32, max_distance: f32) -> f32 {
    let span = max_distance - min_distance;
    if span <= 0.0 {
        return if distance <= min_distance { 1.0 } else { 0.0 };
    }
    1.0 - ((distance - min_distance) / span).clamp(0.0, 1.0)
}

// ── Classifier ─────────────────────────────────────────────

type PinchObserver = Box<dyn FnMut(&PinchEvent)>;

/// Per-hand pinch classifier with a single replaceable observer.
pub struct PinchClassifier {
    pub config: PinchConfig,
    phase: PinchPhase,
    strength: f32,
    distance: Option<f32>,
    observer: Option<PinchObserver>,
}

impl std::fmt::Debug for PinchClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinchClassifier")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("strength", &self.strength)
            .field("distance", &self.distance)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for PinchClassifier {
    fn default() -> Self {
        Self::new(PinchConfig::default())
    }
}

impl PinchClassifier {
    pub fn new(config: PinchConfig) -> Self {
        Self {
            config,
            phase: PinchPhase::Open,
            strength: 0.0,
            distance: None,
            observer: None,
        }
    }

    /// Register the transition observer, replacing any previous one.
    pub fn set_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&PinchEvent) + 'static,
    {
        if self.observer.is_some() {
            debug!("Pinch observer replaced");
        }
        self.observer = Some(Box::new(observer));
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    pub fn phase(&self) -> PinchPhase {
        self.phase
    }

    pub fn is_pinching(&self) -> bool {
        self.phase == PinchPhase::Pinching
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn distance(&self) -> Option<f32> {
        self.distance
    }

    /// Process one frame. `None` or an incomplete hand counts as no hand.
    ///
    /// Returns the transition event, if any, after notifying the observer.
    pub fn update(
        &mut self,
        landmarks: Option<&[Landmark]>,
        timestamp_ms: f64,
    ) -> Option<PinchEvent> {
        let hand = landmarks.and_then(complete_hand);
        let distance = hand.and_then(pinch_distance);

        let Some(distance) = distance else {
            self.distance = None;
            self.strength = 0.0;
            if self.phase == PinchPhase::Pinching {
                self.phase = PinchPhase::Open;
                debug!("Hand lost while pinching, releasing");
                return self.emit(PinchEvent {
                    kind: PinchEventKind::End,
                    strength: 0.0,
                    distance: None,
                    thumb_tip: None,
                    index_tip: None,
                    timestamp_ms,
                    synthetic: true,
                });
            }
            return None;
        };

        let strength = pinch_strength(
            distance,
            self.config.min_distance,
            self.config.max_distance,
        );
        self.distance = Some(distance);
        self.strength = strength;

        let kind = match self.phase {
            PinchPhase::Open if strength > self.config.start_threshold => {
                self.phase = PinchPhase::Pinching;
                PinchEventKind::Start
            }
            PinchPhase::Pinching if strength < self.config.release_threshold => {
                self.phase = PinchPhase::Open;
                PinchEventKind::End
            }
            _ => return None,
        };

        debug!(
            "Pinch {}: strength={:.2} distance={:.4}",
            kind.as_str(),
            strength,
            distance
        );

        // `hand` is Some whenever a distance was computed.
        let (thumb_tip, index_tip) = match hand {
            Some(h) => (Some(h[THUMB_TIP]), Some(h[INDEX_TIP])),
            None => (None, None),
        };
        self.emit(PinchEvent {
            kind,
            strength,
            distance: Some(distance),
            thumb_tip,
            index_tip,
            timestamp_ms,
            synthetic: false,
        })
    }

    fn emit(&mut self, event: PinchEvent) -> Option<PinchEvent> {
        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }
        Some(event)
    }

    /// Replace thresholds after validation.
    pub fn set_config(&mut self, config: PinchConfig) -> anyhow::Result<()> {
        config.validate()?;
        info!(
            "Pinch thresholds set: start {:.2}, release {:.2}, distance {:.3}..{:.3}",
            config.start_threshold,
            config.release_threshold,
            config.min_distance,
            config.max_distance
        );
        self.config = config;
        Ok(())
    }

    /// Return to Open without emitting events. The observer is kept.
    pub fn reset(&mut self) {
        self.phase = PinchPhase::Open;
        self.strength = 0.0;
        self.distance = None;
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:phase :{} :strength {:.3} :distance {} :observer {} :config {})",
            self.phase.as_str(),
            self.strength,
            self.distance
                .map(|d| format!("{:.4}", d))
                .unwrap_or_else(|| "nil".to_string()),
            if self.observer.is_some() { "t" } else { "nil" },
            self.config.to_sexp(),
        )
    }
}

// ── Test helpers ───────────────────────────────────────────

/// A full hand whose thumb and index tips are `distance` apart along x.
#[cfg(test)]
pub(crate) fn hand_with_pinch_distance(distance: f32) -> Vec<Landmark> {
    let mut hand = super::landmarks::test_hand();
    hand[THUMB_TIP] = Landmark::new(0.4, 0.4, 0.0);
    hand[INDEX_TIP] = Landmark::new(0.4 + distance, 0.4, 0.0);
    hand
}

/// Distance that yields the requested strength under the default config.
#[cfg(test)]
fn distance_for_strength(strength: f32) -> f32 {
    let c = PinchConfig::default();
    c.min_distance + (1.0 - strength) * (c.max_distance - c.min_distance)
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn feed(classifier: &mut PinchClassifier, strengths: &[f32]) -> Vec<PinchEvent> {
        strengths
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                let hand = hand_with_pinch_distance(distance_for_strength(*s));
                classifier.update(Some(&hand), i as f64 * 16.0)
            })
            .collect()
    }

    #[test]
    fn test_strength_mapping() {
        assert!((pinch_strength(0.02, 0.02, 0.08) - 1.0).abs() < 1e-6);
        assert!((pinch_strength(0.08, 0.02, 0.08)).abs() < 1e-6);
        assert!((pinch_strength(0.05, 0.02, 0.08) - 0.5).abs() < 1e-6);
        assert_eq!(pinch_strength(0.0, 0.02, 0.08), 1.0);
        assert_eq!(pinch_strength(0.5, 0.02, 0.08), 0.0);
    }

    #[test]
    fn test_strength_degenerate_span() {
        assert_eq!(pinch_strength(0.01, 0.05, 0.05), 1.0);
        assert_eq!(pinch_strength(0.10, 0.05, 0.05), 0.0);
    }

    #[test]
    fn test_pinch_distance() {
        let hand = hand_with_pinch_distance(0.03);
        let d = pinch_distance(&hand).unwrap();
        assert!((d - 0.03).abs() < 1e-5, "got {}", d);
    }

    #[test]
    fn test_pinch_distance_short_hand() {
        let hand = hand_with_pinch_distance(0.03);
        assert!(pinch_distance(&hand[..20]).is_none());
        assert!(pinch_distance(&[]).is_none());
    }

    #[test]
    fn test_hysteresis_band_never_starts() {
        let mut c = PinchClassifier::default();
        // Crosses release (0.5) repeatedly but never exceeds start (0.7).
        let events = feed(&mut c, &[0.3, 0.6, 0.4, 0.69, 0.45, 0.65, 0.2]);
        assert!(events.is_empty(), "unexpected events {:?}", events);
        assert!(!c.is_pinching());
    }

    #[test]
    fn test_hysteresis_single_start_and_end() {
        let mut c = PinchClassifier::default();
        let events = feed(
            &mut c,
            &[0.1, 0.8, 0.9, 0.6, 0.55, 0.75, 0.52, 0.65, 0.3, 0.2, 0.45],
        );
        assert_eq!(events.len(), 2, "got {:?}", events);
        assert_eq!(events[0].kind, PinchEventKind::Start);
        assert_eq!(events[1].kind, PinchEventKind::End);
        assert!(!c.is_pinching());
    }

    #[test]
    fn test_start_requires_strictly_above_threshold() {
        let mut c = PinchClassifier::default();
        c.config.start_threshold = 1.0;
        // Touching tips give exactly 1.0, which is not above 1.0.
        let hand = hand_with_pinch_distance(0.0);
        assert!(c.update(Some(&hand), 0.0).is_none());
        assert_eq!(c.strength(), 1.0);
        assert!(!c.is_pinching());
    }

    #[test]
    fn test_event_payload() {
        let mut c = PinchClassifier::default();
        let hand = hand_with_pinch_distance(0.02);
        let event = c.update(Some(&hand), 42.0).unwrap();
        assert_eq!(event.kind, PinchEventKind::Start);
        assert!((event.strength - 1.0).abs() < 1e-4);
        assert!((event.distance.unwrap() - 0.02).abs() < 1e-5);
        assert_eq!(event.thumb_tip, Some(hand[THUMB_TIP]));
        assert_eq!(event.index_tip, Some(hand[INDEX_TIP]));
        assert_eq!(event.timestamp_ms, 42.0);
        assert!(!event.synthetic);
    }

    #[test]
    fn test_hand_loss_releases() {
        let mut c = PinchClassifier::default();
        let hand = hand_with_pinch_distance(0.02);
        c.update(Some(&hand), 0.0);
        assert!(c.is_pinching());

        let event = c.update(None, 16.0).unwrap();
        assert_eq!(event.kind, PinchEventKind::End);
        assert!(event.synthetic);
        assert!(event.distance.is_none());
        assert_eq!(c.strength(), 0.0);
        assert!(!c.is_pinching());

        // No repeated release while the hand stays away.
        assert!(c.update(None, 32.0).is_none());
    }

    #[test]
    fn test_short_frame_counts_as_no_hand() {
        let mut c = PinchClassifier::default();
        let hand = hand_with_pinch_distance(0.02);
        c.update(Some(&hand), 0.0);
        let event = c.update(Some(&hand[..10]), 16.0).unwrap();
        assert!(event.synthetic);
        assert!(c.distance().is_none());
    }

    #[test]
    fn test_no_hand_while_open_is_silent() {
        let mut c = PinchClassifier::default();
        assert!(c.update(None, 0.0).is_none());
        assert_eq!(c.phase(), PinchPhase::Open);
    }

    #[test]
    fn test_observer_called_once_per_edge() {
        let mut c = PinchClassifier::default();
        let seen: Rc<RefCell<Vec<PinchEventKind>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        c.set_observer(move |e| sink.borrow_mut().push(e.kind));

        feed(&mut c, &[0.9, 0.95, 0.9, 0.1, 0.1, 0.9]);
        assert_eq!(
            *seen.borrow(),
            vec![
                PinchEventKind::Start,
                PinchEventKind::End,
                PinchEventKind::Start
            ]
        );
    }

    #[test]
    fn test_observer_last_registration_wins() {
        let mut c = PinchClassifier::default();
        let first = Rc::new(RefCell::new(0u32));
        let second = Rc::new(RefCell::new(0u32));
        let f = Rc::clone(&first);
        c.set_observer(move |_| *f.borrow_mut() += 1);
        let s = Rc::clone(&second);
        c.set_observer(move |_| *s.borrow_mut() += 1);

        feed(&mut c, &[0.9]);
        assert_eq!(*first.borrow(), 0);
        assert_eq!(*second.borrow(), 1);

        c.clear_observer();
        assert!(!c.has_observer());
        feed(&mut c, &[0.1]);
        assert_eq!(*second.borrow(), 1);
    }

    #[test]
    fn test_config_validation() {
        assert!(PinchConfig::default().validate().is_ok());

        let inverted = PinchConfig {
            release_threshold: 0.8,
            ..PinchConfig::default()
        };
        assert!(inverted.validate().is_err());

        let equal = PinchConfig {
            release_threshold: 0.7,
            ..PinchConfig::default()
        };
        assert!(equal.validate().is_err());

        let bad_distance = PinchConfig {
            min_distance: 0.1,
            ..PinchConfig::default()
        };
        assert!(bad_distance.validate().is_err());
    }

    #[test]
    fn test_set_config_rejects_invalid() {
        let mut c = PinchClassifier::default();
        let bad = PinchConfig {
            release_threshold: 0.9,
            ..PinchConfig::default()
        };
        assert!(c.set_config(bad).is_err());
        assert!((c.config.release_threshold - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_reset_keeps_observer() {
        let mut c = PinchClassifier::default();
        c.set_observer(|_| {});
        feed(&mut c, &[0.9]);
        c.reset();
        assert!(!c.is_pinching());
        assert!(c.has_observer());
    }

    #[test]
    fn test_status_sexp() {
        let c = PinchClassifier::default();
        let sexp = c.status_sexp();
        assert!(sexp.contains(":phase :open"));
        assert!(sexp.contains(":distance nil"));
        assert!(sexp.contains(":start-threshold 0.70"));
        assert!(sexp.contains(":release-threshold 0.50"));
    }

    #[test]
    fn test_event_sexp() {
        let mut c = PinchClassifier::default();
        let hand = hand_with_pinch_distance(0.02);
        let e = c.update(Some(&hand), 0.0).unwrap();
        let sexp = e.to_sexp();
        assert!(sexp.starts_with("(:type :event :event :pinch-start"));
        assert!(sexp.contains(":synthetic nil"));
    }
}
