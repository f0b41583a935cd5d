//! Temporal Smoothing
//!
//! One exponential moving average, applied with a single shared factor to
//! every scalar and vector component of the metric set. The first tick
//! after a (re)start snaps the smoothed state to the raw values directly —
//! ramping up from a zero baseline would smear a multi-second warm-up
//! artifact across every downstream consumer.

use crate::metrics::{Band3, MetricSet};

/// Default smoothing factor (fraction of the previous value retained)
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.7;

/// One EMA step: `old * factor + input * (1 - factor)`
#[inline]
pub fn ema(old: f64, input: f64, factor: f64) -> f64 {
    old * factor + input * (1.0 - factor)
}

/// Whole-set exponential smoother with snap-to-first initialization.
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    factor: f64,
    state: MetricSet,
    initialized: bool,
}

impl TemporalSmoother {
    pub fn new(factor: f64) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
            state: MetricSet::neutral(),
            initialized: false,
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// The smoothed set as of the last [`apply`] call
    ///
    /// [`apply`]: TemporalSmoother::apply
    pub fn smoothed(&self) -> &MetricSet {
        &self.state
    }

    /// Clear the snap flag so the next frame re-initializes the state.
    /// Must be called whenever capture restarts.
    pub fn reset(&mut self) {
        self.initialized = false;
    }

    /// Fold one raw metric set into the smoothed state
    pub fn apply(&mut self, raw: &MetricSet) -> &MetricSet {
        if !self.initialized {
            self.state = raw.clone();
            self.initialized = true;
            return &self.state;
        }

        let f = self.factor;
        let s = &mut self.state;
        s.channels = raw.channels;
        s.amplitude = ema(s.amplitude, raw.amplitude, f);
        s.band_energy = ema_band(&s.band_energy, &raw.band_energy, f);
        s.harshness = ema(s.harshness, raw.harshness, f);
        s.mud = ema(s.mud, raw.mud, f);
        s.compression = ema(s.compression, raw.compression, f);
        s.collision = ema(s.collision, raw.collision, f);
        s.low_imbalance = ema(s.low_imbalance, raw.low_imbalance, f);
        s.emptiness = ema(s.emptiness, raw.emptiness, f);
        s.phase_risk = ema(s.phase_risk, raw.phase_risk, f);
        s.stereo_width = ema_band(&s.stereo_width, &raw.stereo_width, f);
        s.pan_position = ema_band(&s.pan_position, &raw.pan_position, f);
        s.coherence = ema(s.coherence, raw.coherence, f);
        &self.state
    }
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_FACTOR)
    }
}

fn ema_band(old: &Band3, input: &Band3, factor: f64) -> Band3 {
    Band3 {
        low: ema(old.low, input.low, factor),
        mid: ema(old.mid, input.mid, factor),
        high: ema(old.high, input.high, factor),
    }
}
