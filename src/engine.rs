//! Analysis Engine and Capture Session Lifecycle
//!
//! The engine owns the whole per-tick pipeline: raw extraction, temporal
//! smoothing, adaptive normalization, and modulation routing, in that
//! order, on a single logical timeline. One tick fully completes before
//! the next starts; there is no internal parallelism and nothing in the
//! tick path can fail — numerical degeneracies resolve locally and the
//! renderer always receives a value.
//!
//! Capture acquisition itself is external. The engine only tracks whether
//! a session is active: enabling while enabled is a no-op, disabling is
//! idempotent, and a restart performs a full statistics reset (previous
//! spectrum, smoothing snap flag, normalizer histories and bounds, slot
//! accumulators) so nothing bleeds between sessions. Slot configuration
//! survives restarts.

use crate::features::FeatureExtractor;
use crate::frame::{AudioFrame, ChannelMode};
use crate::metrics::{MetricId, MetricSet};
use crate::normalize::{
    AdaptiveNormalizer, NormalizerConfig, DEFAULT_ADAPT_RATE, DEFAULT_COLD_START_LEN,
    DEFAULT_HISTORY_CAPACITY,
};
use crate::router::{ModulationRouter, RouteInfo};
use crate::smoothing::{TemporalSmoother, DEFAULT_SMOOTHING_FACTOR};
use serde::Serialize;
use std::collections::BTreeMap;

/// Engine tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Whole-set temporal smoothing factor
    pub smoothing_factor: f64,
    /// Normalizer rolling-history capacity
    pub history_capacity: usize,
    /// Samples before normalizer bounds adaptation begins
    pub cold_start_len: usize,
    /// Fraction of the window extremes adopted per tick
    pub adapt_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            cold_start_len: DEFAULT_COLD_START_LEN,
            adapt_rate: DEFAULT_ADAPT_RATE,
        }
    }
}

impl EngineConfig {
    pub fn with_smoothing_factor(mut self, factor: f64) -> Self {
        self.smoothing_factor = factor;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_cold_start_len(mut self, len: usize) -> Self {
        self.cold_start_len = len;
        self
    }

    pub fn with_adapt_rate(mut self, rate: f64) -> Self {
        self.adapt_rate = rate;
        self
    }
}

/// Errors surfaced when starting a capture session
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// The source reported a non-positive sample rate
    InvalidSampleRate(f64),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::InvalidSampleRate(rate) => {
                write!(f, "Invalid sample rate: {}", rate)
            }
        }
    }
}

impl std::error::Error for CaptureError {}

/// Everything one tick produces for downstream consumers
#[derive(Debug, Clone)]
pub struct TickOutput {
    /// Normalized metric set for meters and legends
    pub metrics: MetricSet,
    /// Additive per-parameter deltas for the renderer's parameter store
    pub deltas: BTreeMap<String, f64>,
}

/// One normalized metric reading for the diagnostics surface
#[derive(Debug, Clone, Serialize)]
pub struct MetricReading {
    pub id: MetricId,
    pub label: &'static str,
    pub value: f64,
}

/// Serializable per-tick summary consumed read-only by meters and legends
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSnapshot {
    pub active: bool,
    pub channels: ChannelMode,
    pub metrics: Vec<MetricReading>,
    pub routes: Vec<RouteInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SessionInfo {
    sample_rate: f64,
    channels: ChannelMode,
}

/// The full metric/modulation pipeline behind a capture-session gate.
pub struct AnalysisEngine {
    config: EngineConfig,
    extractor: FeatureExtractor,
    smoother: TemporalSmoother,
    normalizer: AdaptiveNormalizer,
    router: ModulationRouter,
    session: Option<SessionInfo>,
    normalized: MetricSet,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            extractor: FeatureExtractor::new(),
            smoother: TemporalSmoother::new(config.smoothing_factor),
            normalizer: AdaptiveNormalizer::new(NormalizerConfig {
                history_capacity: config.history_capacity,
                cold_start_len: config.cold_start_len,
                adapt_rate: config.adapt_rate,
            }),
            router: ModulationRouter::new(),
            session: None,
            normalized: MetricSet::neutral(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// The modulation matrix, for evaluation-independent inspection
    pub fn router(&self) -> &ModulationRouter {
        &self.router
    }

    /// The modulation matrix, for configuration edits
    pub fn router_mut(&mut self) -> &mut ModulationRouter {
        &mut self.router
    }

    /// The normalized metric set as of the last tick
    pub fn normalized_metrics(&self) -> &MetricSet {
        &self.normalized
    }

    /// The smoothed metric set as of the last tick
    pub fn smoothed_metrics(&self) -> &MetricSet {
        self.smoother.smoothed()
    }

    /// Begin a capture session.
    ///
    /// Calling while already active is a no-op. Starting after a stop is a
    /// restart: all rolling statistics reset so the new session begins
    /// clean, while the modulation configuration is preserved.
    pub fn start_capture(
        &mut self,
        sample_rate: f64,
        channels: ChannelMode,
    ) -> Result<(), CaptureError> {
        if self.session.is_some() {
            log::debug!("capture already active; ignoring start");
            return Ok(());
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(CaptureError::InvalidSampleRate(sample_rate));
        }
        self.reset_statistics();
        self.session = Some(SessionInfo {
            sample_rate,
            channels,
        });
        log::info!(
            "capture started: {} Hz, {:?}",
            sample_rate,
            channels
        );
        Ok(())
    }

    /// End the capture session. Idempotent; takes effect before the next
    /// tick begins.
    pub fn stop_capture(&mut self) {
        if self.session.take().is_some() {
            log::info!("capture stopped");
        }
        self.normalized = MetricSet::neutral();
    }

    /// Run one tick of the pipeline.
    ///
    /// While no session is active the frame is ignored and the neutral
    /// placeholder set drives the output, so consumers always have data.
    pub fn tick(&mut self, frame: &AudioFrame) -> TickOutput {
        if self.session.is_none() {
            let neutral = MetricSet::neutral();
            let deltas = self.router.evaluate(&neutral);
            self.normalized = neutral.clone();
            return TickOutput {
                metrics: neutral,
                deltas,
            };
        }

        let raw = self.extractor.extract(frame);
        let smoothed = self.smoother.apply(&raw).clone();
        self.normalized = self.normalizer.process(&smoothed);
        let deltas = self.router.evaluate(&smoothed);
        TickOutput {
            metrics: self.normalized.clone(),
            deltas,
        }
    }

    /// Drive one tick from a buffer source. Returns `None` when the source
    /// had no fresh data, leaving all state untouched.
    pub fn tick_from(
        &mut self,
        source: &mut dyn crate::frame::SpectralBufferSource,
        frame: &mut AudioFrame,
    ) -> Option<TickOutput> {
        frame.sample_rate = source.sample_rate();
        frame.channels = source.channels();
        if !source.fill_frame(frame) {
            return None;
        }
        Some(self.tick(frame))
    }

    /// Read-only summary for meters and legends
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        let metrics = MetricId::ALL
            .iter()
            .filter_map(|&id| {
                self.normalized.value(id).map(|value| MetricReading {
                    id,
                    label: id.label(),
                    value,
                })
            })
            .collect();
        DiagnosticsSnapshot {
            active: self.is_active(),
            channels: self.normalized.channels,
            metrics,
            routes: self.router.active_routes(),
        }
    }

    fn reset_statistics(&mut self) {
        self.extractor.reset();
        self.smoother.reset();
        self.normalizer.reset();
        self.router.reset_accumulators();
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}
