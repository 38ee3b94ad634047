//! One Euro filter: adaptive low-pass smoothing for pointer jitter.
//!
//! Slow movement is smoothed heavily, fast movement barely at all, so strokes lose jitter
//! without lagging behind quick flicks.

use kurbo::Point;

use crate::config::FilterConfig;

/// Sample period assumed when timestamps do not advance.
const FALLBACK_DT: f64 = 1.0 / 60.0;

fn smoothing_factor(dt: f64, cutoff: f64) -> f64 {
    let tau = 1.0 / (2.0 * std::f64::consts::PI * cutoff.max(f64::EPSILON));
    1.0 / (1.0 + tau / dt)
}

#[derive(Debug, Clone, Default)]
struct AxisFilter {
    value: Option<f64>,
    derivative: f64,
}

impl AxisFilter {
    fn filter(&mut self, raw: f64, dt: f64, config: &FilterConfig) -> f64 {
        let Some(prev) = self.value else {
            self.value = Some(raw);
            self.derivative = 0.0;
            return raw;
        };

        let raw_derivative = (raw - prev) / dt;
        let a_d = smoothing_factor(dt, config.d_cutoff);
        self.derivative = a_d * raw_derivative + (1.0 - a_d) * self.derivative;

        let cutoff = config.min_cutoff + config.beta * self.derivative.abs();
        let a = smoothing_factor(dt, cutoff);
        let value = a * raw + (1.0 - a) * prev;
        self.value = Some(value);
        value
    }
}

/// Two-axis One Euro filter over pointer samples.
#[derive(Debug, Clone, Default)]
pub struct OneEuroFilter {
    config: FilterConfig,
    x: AxisFilter,
    y: AxisFilter,
    last_time_ms: Option<f64>,
}

impl OneEuroFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Forget all history; the next sample passes through unchanged.
    pub fn reset(&mut self) {
        self.x = AxisFilter::default();
        self.y = AxisFilter::default();
        self.last_time_ms = None;
    }

    /// Filter one sample taken at `time_ms`.
    pub fn filter(&mut self, point: Point, time_ms: f64) -> Point {
        let dt = match self.last_time_ms {
            Some(last) if time_ms > last => (time_ms - last) / 1000.0,
            _ => FALLBACK_DT,
        };
        self.last_time_ms = Some(time_ms);
        Point::new(
            self.x.filter(point.x, dt, &self.config),
            self.y.filter(point.y, dt, &self.config),
        )
    }
}
