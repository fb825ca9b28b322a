//! Per-emitter RSSI noise filters
//!
//! Two interchangeable strategies share the `NoiseFilter` capability:
//! - `RecursiveFilter`: scalar Kalman filter treating the true RSSI as a
//!   slowly varying hidden state
//! - `WindowFilter`: exact moving average over the last W samples
//!
//! `FilterState` is the tagged variant the tracker stores per emitter, picked
//! once from configuration.

use crate::config::{FilterConfig, FilterKind};

pub trait NoiseFilter {
    /// Feed one valid measurement and return the new estimate
    fn update(&mut self, measurement: f64) -> f64;

    /// Latest estimate without feeding anything
    fn current_estimate(&self) -> f64;

    /// Time update for a cycle, applied whether or not a measurement arrives.
    /// Filters without a motion model ignore it.
    fn predict(&mut self) {}

    /// Measurement update only, for callers that already ran `predict`
    fn correct(&mut self, measurement: f64) -> f64 {
        self.update(measurement)
    }
}

/// Noise parameters shared by every recursive filter in a tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecursiveParams {
    pub process_noise: f64,
    pub measurement_noise: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecursiveFilter {
    estimate: f64,
    error_estimate: f64,
    params: RecursiveParams,
}

impl RecursiveFilter {
    /// Seed the filter with a prior estimate and its uncertainty.
    /// `initial_error` must be positive.
    pub fn new(initial_estimate: f64, initial_error: f64, params: RecursiveParams) -> Self {
        RecursiveFilter {
            estimate: initial_estimate,
            error_estimate: initial_error,
            params,
        }
    }

    pub fn error_estimate(&self) -> f64 {
        self.error_estimate
    }
}

impl NoiseFilter for RecursiveFilter {
    fn update(&mut self, measurement: f64) -> f64 {
        self.predict();
        self.correct(measurement)
    }

    fn current_estimate(&self) -> f64 {
        self.estimate
    }

    fn predict(&mut self) {
        self.error_estimate += self.params.process_noise;
    }

    fn correct(&mut self, measurement: f64) -> f64 {
        // gain stays in (0, 1) for positive noise, so error_estimate never hits 0
        let gain = self.error_estimate / (self.error_estimate + self.params.measurement_noise);
        self.estimate += gain * (measurement - self.estimate);
        self.error_estimate *= 1.0 - gain;
        self.estimate
    }
}

/// Moving average over the last `capacity` measurements.
///
/// Keeps a ring buffer plus a running sum so each update is O(1). The
/// running sum always equals the sum of the live slots.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFilter {
    ring: Vec<f64>,
    cursor: usize,
    count: usize,
    sum: f64,
}

impl WindowFilter {
    /// A zero window is treated as a window of one sample.
    pub fn new(window_size: usize) -> Self {
        WindowFilter {
            ring: vec![0.0; window_size.max(1)],
            cursor: 0,
            count: 0,
            sum: 0.0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    pub fn sample_count(&self) -> usize {
        self.count
    }

    pub fn running_sum(&self) -> f64 {
        self.sum
    }

    /// Live samples, in ring order (not insertion order once wrapped)
    pub fn samples(&self) -> &[f64] {
        &self.ring[..self.count]
    }
}

impl NoiseFilter for WindowFilter {
    fn update(&mut self, measurement: f64) -> f64 {
        if self.count < self.ring.len() {
            self.count += 1;
        } else {
            self.sum -= self.ring[self.cursor];
        }

        self.ring[self.cursor] = measurement;
        self.sum += measurement;
        self.cursor = (self.cursor + 1) % self.ring.len();

        self.current_estimate()
    }

    fn current_estimate(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterState {
    Recursive(RecursiveFilter),
    Window(WindowFilter),
}

impl FilterState {
    pub fn from_config(config: &FilterConfig) -> Self {
        match config.kind {
            FilterKind::Recursive => FilterState::Recursive(RecursiveFilter::new(
                config.initial_estimate,
                config.initial_error,
                RecursiveParams {
                    process_noise: config.process_noise,
                    measurement_noise: config.measurement_noise,
                },
            )),
            FilterKind::Window => FilterState::Window(WindowFilter::new(config.window_size)),
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterState::Recursive(_) => FilterKind::Recursive,
            FilterState::Window(_) => FilterKind::Window,
        }
    }
}

impl NoiseFilter for FilterState {
    fn update(&mut self, measurement: f64) -> f64 {
        match self {
            FilterState::Recursive(f) => f.update(measurement),
            FilterState::Window(f) => f.update(measurement),
        }
    }

    fn current_estimate(&self) -> f64 {
        match self {
            FilterState::Recursive(f) => f.current_estimate(),
            FilterState::Window(f) => f.current_estimate(),
        }
    }

    fn predict(&mut self) {
        match self {
            FilterState::Recursive(f) => f.predict(),
            FilterState::Window(f) => f.predict(),
        }
    }

    fn correct(&mut self, measurement: f64) -> f64 {
        match self {
            FilterState::Recursive(f) => f.correct(measurement),
            FilterState::Window(f) => f.correct(measurement),
        }
    }
}
