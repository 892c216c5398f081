//! Hand landmark data structures.
//!
//! Models the 21-point hand skeleton emitted by the external landmark
//! pipeline (one hand, normalized image coordinates plus relative depth).
//! A frame with any other landmark count is treated as "no hand".

// ── Landmark indices ───────────────────────────────────────

/// Total number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Fingertip indices, thumb first.
pub const FINGERTIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

// ── Landmark ───────────────────────────────────────────────

/// A single tracked hand point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    /// Horizontal position, 0.0 (left) to 1.0 (right).
    pub x: f32,
    /// Vertical position, 0.0 (top) to 1.0 (bottom).
    pub y: f32,
    /// Depth relative to the wrist.
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another landmark in landmark units.
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Whether all three coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_sexp(&self) -> String {
        format!("({:.4} {:.4} {:.4})", self.x, self.y, self.z)
    }
}

/// Return the slice only if it is a complete hand.
pub fn complete_hand(landmarks: &[Landmark]) -> Option<&[Landmark]> {
    if landmarks.len() == LANDMARK_COUNT {
        Some(landmarks)
    } else {
        None
    }
}

// ── Hand frame ─────────────────────────────────────────────

/// One inbound frame from the landmark source.
#[derive(Debug, Clone)]
pub struct HandFrame {
    /// Landmarks as delivered; may be empty or short when no hand is visible.
    pub landmarks: Vec<Landmark>,
    /// Session-clock time (ms) at which the frame was acquired.
    pub captured_ms: f64,
}

impl HandFrame {
    pub fn new(landmarks: Vec<Landmark>, captured_ms: f64) -> Self {
        Self {
            landmarks,
            captured_ms,
        }
    }

    /// The hand landmarks, or `None` unless exactly 21 are present.
    pub fn hand(&self) -> Option<&[Landmark]> {
        complete_hand(&self.landmarks)
    }

    /// Normalized (x, y) of the index fingertip, if a hand is present.
    pub fn index_tip_xy(&self) -> Option<(f32, f32)> {
        let hand = self.hand()?;
        let tip = hand[INDEX_TIP];
        if !tip.is_finite() {
            return None;
        }
        Some((tip.x, tip.y))
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
pub(crate) fn test_hand() -> Vec<Landmark> {
    (0..LANDMARK_COUNT)
        .map(|i| Landmark::new(0.5, 0.5 + i as f32 * 0.001, 0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Landmark::new(0.0, 0.0, 0.0);
        let b = Landmark::new(3.0, 4.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_distance_uses_depth() {
        let a = Landmark::new(0.0, 0.0, 0.0);
        let b = Landmark::new(0.0, 0.0, 2.0);
        assert!((a.distance(&b) - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_complete_hand() {
        let hand = test_hand();
        assert!(complete_hand(&hand).is_some());
        assert!(complete_hand(&hand[..20]).is_none());
        assert!(complete_hand(&[]).is_none());
    }

    #[test]
    fn test_frame_index_tip() {
        let mut hand = test_hand();
        hand[INDEX_TIP] = Landmark::new(0.25, 0.75, 0.0);
        let frame = HandFrame::new(hand, 10.0);
        assert_eq!(frame.index_tip_xy(), Some((0.25, 0.75)));
    }

    #[test]
    fn test_empty_frame_has_no_hand() {
        let frame = HandFrame::new(Vec::new(), 0.0);
        assert!(frame.hand().is_none());
        assert!(frame.index_tip_xy().is_none());
    }

    #[test]
    fn test_non_finite_tip_rejected() {
        let mut hand = test_hand();
        hand[INDEX_TIP] = Landmark::new(f32::NAN, 0.5, 0.0);
        let frame = HandFrame::new(hand, 0.0);
        assert!(frame.index_tip_xy().is_none());
    }

    #[test]
    fn test_fingertip_indices() {
        assert_eq!(FINGERTIPS, [4, 8, 12, 16, 20]);
        assert_eq!(WRIST, 0);
    }

    #[test]
    fn test_landmark_sexp() {
        let l = Landmark::new(0.1, 0.2, -0.3);
        assert_eq!(l.to_sexp(), "(0.1000 0.2000 -0.3000)");
    }
}
