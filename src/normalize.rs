//! Adaptive Min/Max Normalization
//!
//! Each metric component keeps a capped FIFO history of its smoothed value
//! and a pair of slowly adapting bounds. Normalization maps the smoothed
//! value into 0–1 against those bounds, so a quiet source and a loud source
//! both end up exercising the full visual range after the bounds settle.
//!
//! The bounds are seeded from the first full cold-start window and then
//! nudged a small fraction of the way toward the current window extremes
//! every tick. Degenerate ranges (a constant signal) normalize to 0.5
//! rather than dividing by a collapsed span.

use crate::metrics::{MetricId, MetricSet};
use std::collections::{BTreeMap, VecDeque};

/// Rolling history capacity (~30 s at 60 Hz)
pub const DEFAULT_HISTORY_CAPACITY: usize = 1800;

/// Samples required before bounds adaptation begins
pub const DEFAULT_COLD_START_LEN: usize = 10;

/// Fraction of the distance toward the window extremes adopted per tick
pub const DEFAULT_ADAPT_RATE: f64 = 0.01;

/// Minimum span between bounds; anything narrower is degenerate
const RANGE_EPSILON: f64 = 1e-6;

/// Tuning for the adaptive normalizer
#[derive(Debug, Clone, Copy)]
pub struct NormalizerConfig {
    pub history_capacity: usize,
    pub cold_start_len: usize,
    pub adapt_rate: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            cold_start_len: DEFAULT_COLD_START_LEN,
            adapt_rate: DEFAULT_ADAPT_RATE,
        }
    }
}

/// Adaptively tracked bounds for one metric component.
///
/// Invariant: `min < max` always holds; adaptation that would collapse the
/// range pushes `max` to `min + ε` instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxBounds {
    pub min: f64,
    pub max: f64,
}

impl MinMaxBounds {
    fn seeded(min: f64, max: f64) -> Self {
        let mut bounds = Self { min, max };
        bounds.enforce_order();
        bounds
    }

    fn nudge_toward(&mut self, window_min: f64, window_max: f64, rate: f64) {
        self.min = ema_toward(self.min, window_min, rate);
        self.max = ema_toward(self.max, window_max, rate);
        self.enforce_order();
    }

    fn enforce_order(&mut self) {
        if self.max <= self.min {
            self.max = self.min + RANGE_EPSILON;
        }
    }

    fn is_degenerate(&self) -> bool {
        self.max - self.min <= RANGE_EPSILON
    }
}

#[inline]
fn ema_toward(current: f64, target: f64, rate: f64) -> f64 {
    current * (1.0 - rate) + target * rate
}

#[derive(Debug, Clone, Default)]
struct MetricTracker {
    history: VecDeque<f64>,
    bounds: Option<MinMaxBounds>,
}

impl MetricTracker {
    fn observe(&mut self, value: f64, config: &NormalizerConfig) {
        self.history.push_back(value);
        while self.history.len() > config.history_capacity {
            self.history.pop_front();
        }
        if self.history.len() < config.cold_start_len {
            return;
        }

        let mut window_min = f64::INFINITY;
        let mut window_max = f64::NEG_INFINITY;
        for &v in &self.history {
            window_min = window_min.min(v);
            window_max = window_max.max(v);
        }

        match &mut self.bounds {
            None => self.bounds = Some(MinMaxBounds::seeded(window_min, window_max)),
            Some(bounds) => bounds.nudge_toward(window_min, window_max, config.adapt_rate),
        }
    }

    fn normalize(&self, value: f64) -> f64 {
        match self.bounds {
            // Cold start: identity against the metric's nominal 0-1 range
            None => value.clamp(0.0, 1.0),
            Some(bounds) if bounds.is_degenerate() => 0.5,
            Some(bounds) => ((value - bounds.min) / (bounds.max - bounds.min)).clamp(0.0, 1.0),
        }
    }
}

/// Per-metric rolling history and adaptive bounds.
///
/// Consumes the smoothed metric set every tick and produces the normalized
/// set for diagnostics. State persists for the lifetime of a capture
/// session; [`reset`] must accompany a session restart so stale statistics
/// never bleed into the new stream.
///
/// [`reset`]: AdaptiveNormalizer::reset
#[derive(Debug, Default)]
pub struct AdaptiveNormalizer {
    config: NormalizerConfig,
    trackers: BTreeMap<MetricId, MetricTracker>,
}

impl AdaptiveNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            config,
            trackers: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Current bounds for a metric, if adaptation has started
    pub fn bounds(&self, id: MetricId) -> Option<MinMaxBounds> {
        self.trackers.get(&id).and_then(|t| t.bounds)
    }

    /// Number of history samples currently held for a metric
    pub fn history_len(&self, id: MetricId) -> usize {
        self.trackers.get(&id).map_or(0, |t| t.history.len())
    }

    /// Drop all histories and bounds
    pub fn reset(&mut self) {
        self.trackers.clear();
    }

    /// Fold in one smoothed set and produce the normalized set.
    ///
    /// Unipolar metrics normalize into 0–1. Bipolar pan components are
    /// remapped to 0–1 for history and bounds tracking, then mapped back so
    /// the normalized set keeps pan on its natural −1..1 axis.
    pub fn process(&mut self, smoothed: &MetricSet) -> MetricSet {
        let mut normalized = MetricSet::zeroed(smoothed.channels);
        for id in MetricId::ALL {
            let Some(value) = smoothed.value(id) else {
                continue;
            };
            let tracked = if id.is_bipolar() {
                (value + 1.0) / 2.0
            } else {
                value
            };

            let tracker = self.trackers.entry(id).or_default();
            tracker.observe(tracked, &self.config);
            let mut out = tracker.normalize(tracked);
            if id.is_bipolar() {
                out = out * 2.0 - 1.0;
            }
            normalized.set_value(id, out);
        }
        normalized
    }
}
