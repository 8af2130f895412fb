//! Easing strategies handed to the animation driver.
//!
//! The driver owns interpolation; this module only names the timing curves a
//! task can request: linear, the CSS-named cubic beziers, custom beziers, and
//! stepped curves.

use serde::{Deserialize, Serialize};

/// Timing curve for a task.
///
/// Maps linear progress (0.0 to 1.0) to eased progress. Bezier outputs may
/// leave the unit range for overshooting curves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Easing {
    /// No easing.
    Linear,
    /// CSS `ease`: cubic-bezier(0.25, 0.1, 0.25, 1.0).
    Ease,
    /// CSS `ease-in`: cubic-bezier(0.42, 0, 1, 1).
    EaseIn,
    /// CSS `ease-out`: cubic-bezier(0, 0, 0.58, 1).
    EaseOut,
    /// CSS `ease-in-out`: cubic-bezier(0.42, 0, 0.58, 1).
    EaseInOut,
    /// Custom cubic bezier; x control points must lie in [0, 1].
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },
    /// Stepped curve with `count` intervals. `jump_start` jumps at the start
    /// of each interval instead of the end.
    Steps { count: u32, jump_start: bool },
}

impl Default for Easing {
    fn default() -> Self {
        Self::Ease
    }
}

impl Easing {
    /// Evaluate the curve at linear progress `t` (clamped to [0, 1]).
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match *self {
            Self::Linear => t,
            Self::Ease => Bezier::new(0.25, 0.1, 0.25, 1.0).y_at_x(t),
            Self::EaseIn => Bezier::new(0.42, 0.0, 1.0, 1.0).y_at_x(t),
            Self::EaseOut => Bezier::new(0.0, 0.0, 0.58, 1.0).y_at_x(t),
            Self::EaseInOut => Bezier::new(0.42, 0.0, 0.58, 1.0).y_at_x(t),
            Self::CubicBezier { x1, y1, x2, y2 } => Bezier::new(x1, y1, x2, y2).y_at_x(t),
            Self::Steps { count, jump_start } => stepped(count, jump_start, t),
        }
    }

    /// Custom cubic bezier. Returns `None` when an x control point is
    /// outside [0, 1] (the curve would not be a function of progress).
    pub fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Option<Self> {
        if (0.0..=1.0).contains(&x1) && (0.0..=1.0).contains(&x2) {
            Some(Self::CubicBezier { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    /// Look up a curve by its CSS-style name (used for config defaults).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Self::Linear),
            "ease" => Some(Self::Ease),
            "ease-in" => Some(Self::EaseIn),
            "ease-out" => Some(Self::EaseOut),
            "ease-in-out" => Some(Self::EaseInOut),
            _ => None,
        }
    }
}

/// Unit cubic bezier with implicit endpoints (0,0) and (1,1).
#[derive(Clone, Copy)]
struct Bezier {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl Bezier {
    fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Sample the y coordinate for a given x by inverting the x polynomial
    /// with Newton-Raphson, falling back on the endpoints at the boundaries.
    fn y_at_x(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        let t = self.solve_t(x);
        sample(self.y1, self.y2, t)
    }

    fn solve_t(&self, target_x: f64) -> f64 {
        let mut t = target_x;
        for _ in 0..8 {
            let err = sample(self.x1, self.x2, t) - target_x;
            if err.abs() < 1e-7 {
                break;
            }
            let slope = sample_derivative(self.x1, self.x2, t);
            if slope.abs() < 1e-7 {
                break;
            }
            t = (t - err / slope).clamp(0.0, 1.0);
        }
        t
    }
}

/// One bezier coordinate at parameter t: 3(1-t)²t·p1 + 3(1-t)t²·p2 + t³.
#[inline]
fn sample(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * p1 + 3.0 * mt * t * t * p2 + t * t * t
}

#[inline]
fn sample_derivative(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * p1 + 6.0 * mt * t * (p2 - p1) + 3.0 * t * t * (1.0 - p2)
}

fn stepped(count: u32, jump_start: bool, t: f64) -> f64 {
    if count == 0 {
        return t;
    }
    let count = count as f64;
    if jump_start {
        (t * count).ceil() / count
    } else {
        ((t * count).floor() / count).min(1.0)
    }
}
