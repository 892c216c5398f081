//! Rolling frame-rate statistics.

/// Rolling window of instantaneous fps samples.
#[derive(Debug, Clone)]
pub struct FrameRateTracker {
    /// Most recent samples, oldest first.
    pub samples: Vec<f64>,
    /// Maximum number of samples to keep.
    pub window_size: usize,
    /// Samples required before statistics are reported.
    pub min_samples: usize,
    last_tick_ms: Option<f64>,
}

impl Default for FrameRateTracker {
    fn default() -> Self {
        Self::new(60, 10)
    }
}

impl FrameRateTracker {
    pub fn new(window_size: usize, min_samples: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            samples: Vec::with_capacity(window_size),
            window_size,
            min_samples: min_samples.min(window_size),
            last_tick_ms: None,
        }
    }

    /// Record a frame at `now_ms`. The first tick only seeds the clock.
    pub fn tick(&mut self, now_ms: f64) {
        if let Some(last) = self.last_tick_ms {
            let delta = now_ms - last;
            if delta > 0.0 {
                self.push_fps(1000.0 / delta);
            }
        }
        self.last_tick_ms = Some(now_ms);
    }

    /// Push an fps sample directly.
    pub fn push_fps(&mut self, fps: f64) {
        if !fps.is_finite() {
            return;
        }
        self.samples.push(fps);
        if self.samples.len() > self.window_size {
            self.samples.remove(0);
        }
    }

    fn ready(&self) -> bool {
        !self.samples.is_empty() && self.samples.len() >= self.min_samples
    }

    fn mean(&self) -> f64 {
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Rounded mean fps; 0 until enough samples exist.
    pub fn average_fps(&self) -> f64 {
        if !self.ready() {
            return 0.0;
        }
        self.mean().round()
    }

    /// Coefficient of variation (population std dev / mean).
    ///
    /// Lower is steadier. 1.0 when the mean is zero; 0 until enough samples.
    pub fn stability(&self) -> f64 {
        if !self.ready() {
            return 0.0;
        }
        let mean = self.mean();
        if mean == 0.0 {
            return 1.0;
        }
        let variance = self
            .samples
            .iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / self.samples.len() as f64;
        variance.sqrt() / mean
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.last_tick_ms = None;
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:fps {:.0} :stability {:.3} :samples {})",
            self.average_fps(),
            self.stability(),
            self.samples.len()
        )
    }
}
