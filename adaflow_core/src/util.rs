//! Common time/period helpers for adaflow_core.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;
/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Compute the period in microseconds for a given tick rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Compute the period in milliseconds for a given tick rate in Hz.
#[inline]
pub fn period_ms(hz: u32) -> u64 {
    (MILLIS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Exponential moving average with first-sample initialization, matching the
/// smoothing stage of the flow estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ema {
    alpha: f32,
    prev: Option<f32>,
}

impl Ema {
    pub fn new(alpha: f32) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { alpha, prev: None }
    }

    /// Feed one sample; alpha of 0 makes this a passthrough.
    pub fn update(&mut self, x: f32) -> f32 {
        let y = match self.prev {
            None => x,
            Some(prev) if self.alpha > 0.0 => self.alpha * x + (1.0 - self.alpha) * prev,
            Some(_) => x,
        };
        self.prev = Some(y);
        y
    }

    pub fn value(&self) -> Option<f32> {
        self.prev
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}
