//! Swipe detection from pointer samples.
//!
//! Velocity is measured over a short trailing window so a slow drag that
//! ends with a flick still counts as a swipe.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeConfig {
    /// Trailing window used for velocity, in milliseconds.
    pub window_ms: f64,
    /// Minimum travel in pixels to count as a swipe regardless of speed.
    pub distance_threshold: f64,
    /// Minimum speed in pixels per millisecond to count as a flick.
    pub velocity_threshold: f64,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            window_ms: 100.0,
            distance_threshold: 80.0,
            velocity_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
}

impl Velocity {
    pub fn magnitude(self) -> f64 {
        self.x.hypot(self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeOutcome {
    /// `None` when neither threshold was crossed.
    pub direction: Option<SwipeDirection>,
    pub velocity: Velocity,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    x: f64,
    y: f64,
    time_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SwipeTracker {
    config: SwipeConfig,
    origin: Option<Sample>,
    samples: VecDeque<Sample>,
}

impl SwipeTracker {
    pub fn new(config: SwipeConfig) -> Self {
        Self {
            config,
            origin: None,
            samples: VecDeque::new(),
        }
    }

    /// Begin a gesture, discarding any previous one.
    pub fn start(&mut self, x: f64, y: f64, time_ms: f64) {
        let sample = Sample { x, y, time_ms };
        self.origin = Some(sample);
        self.samples.clear();
        self.samples.push_back(sample);
    }

    pub fn record(&mut self, x: f64, y: f64, time_ms: f64) {
        if self.origin.is_none() {
            self.start(x, y, time_ms);
            return;
        }
        // Out-of-order events would produce negative spans.
        if self
            .samples
            .back()
            .is_some_and(|last| time_ms < last.time_ms)
        {
            return;
        }
        self.samples.push_back(Sample { x, y, time_ms });
        self.prune(time_ms);
    }

    pub fn is_tracking(&self) -> bool {
        self.origin.is_some()
    }

    fn prune(&mut self, now_ms: f64) {
        // Keep one sample at or before the window edge to span it fully.
        while self.samples.len() > 2
            && self
                .samples
                .get(1)
                .is_some_and(|next| now_ms - next.time_ms >= self.config.window_ms)
        {
            self.samples.pop_front();
        }
    }

    /// Velocity over the trailing window, in pixels per millisecond.
    pub fn velocity(&self) -> Velocity {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return Velocity { x: 0.0, y: 0.0 };
        };
        let elapsed = last.time_ms - first.time_ms;
        if elapsed <= 0.0 {
            return Velocity { x: 0.0, y: 0.0 };
        }
        Velocity {
            x: (last.x - first.x) / elapsed,
            y: (last.y - first.y) / elapsed,
        }
    }

    /// Finish the gesture at the given point and classify it.
    pub fn release(&mut self, x: f64, y: f64, time_ms: f64) -> SwipeOutcome {
        self.record(x, y, time_ms);
        let velocity = self.velocity();
        let origin = self.origin.take().unwrap_or(Sample { x, y, time_ms });
        self.samples.clear();

        let dx = x - origin.x;
        let dy = y - origin.y;
        let distance = dx.hypot(dy);
        let crossed = distance >= self.config.distance_threshold
            || velocity.magnitude() >= self.config.velocity_threshold;

        let direction = crossed.then(|| {
            // Flicks are classified by their velocity, long drags by travel.
            let (hx, hy) = if distance >= self.config.distance_threshold {
                (dx, dy)
            } else {
                (velocity.x, velocity.y)
            };
            if hx.abs() >= hy.abs() {
                if hx >= 0.0 {
                    SwipeDirection::Right
                } else {
                    SwipeDirection::Left
                }
            } else if hy >= 0.0 {
                SwipeDirection::Down
            } else {
                SwipeDirection::Up
            }
        });

        tracing::trace!(?direction, distance, speed = velocity.magnitude(), "Swipe released");
        SwipeOutcome {
            direction,
            velocity,
            distance,
        }
    }
}
