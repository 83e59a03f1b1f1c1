use foundation::time::Time;

use crate::view::ViewState;

/// Easing curves mapping linear progress `t` in `[0, 1]` to eased progress.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Easing {
    Linear,
    /// Cubic ease-out: fast start, gentle landing.
    EaseOut,
    /// Smoothstep (`3t^2 - 2t^3`).
    #[default]
    InAndOut,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseOut => 1.0 - (1.0 - t).powi(3),
            Easing::InAndOut => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// One in-flight interpolation between two view states.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Animation {
    pub from: ViewState,
    pub to: ViewState,
    pub start: Time,
    pub duration_ms: u64,
    pub easing: Easing,
}

impl Animation {
    pub fn new(from: ViewState, to: ViewState, start: Time, duration_ms: u64, easing: Easing) -> Self {
        Self {
            from,
            to,
            start,
            duration_ms,
            easing,
        }
    }

    /// Linear progress at `now`, in `[0, 1]`.
    pub fn progress(&self, now: Time) -> f64 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        (now.since(self.start) * 1000.0 / self.duration_ms as f64).min(1.0)
    }

    pub fn is_finished(&self, now: Time) -> bool {
        self.progress(now) >= 1.0
    }

    pub fn sample(&self, now: Time) -> ViewState {
        let t = self.progress(now);
        if t >= 1.0 {
            return self.to;
        }
        self.from.lerp(self.to, self.easing.apply(t))
    }
}
