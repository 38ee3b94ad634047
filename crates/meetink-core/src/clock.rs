//! Wall-clock helpers and z-index allocation.

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Hands out wall-clock derived z-indices that strictly increase per instance,
/// even when called several times within the same millisecond.
#[derive(Debug, Clone, Default)]
pub struct ZIndexAllocator {
    last: f64,
}

impl ZIndexAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next z-index, never lower than anything already observed.
    pub fn next(&mut self) -> f64 {
        let candidate = now_ms().floor();
        self.last = if candidate > self.last {
            candidate
        } else {
            self.last + 1.0
        };
        self.last
    }

    /// Record a z-index coming from elsewhere (remote peers, hydration).
    pub fn observe(&mut self, z_index: f64) {
        if z_index.is_finite() && z_index > self.last {
            self.last = z_index;
        }
    }

    /// Lowest z-index strictly below `min`, for send-to-back.
    pub fn below(min: f64) -> f64 {
        min - 1.0
    }
}
