//! # Mixlens: Perceptual Mix Metrics for Visualizers
//!
//! `mixlens` turns a live audio signal into a set of perceptual
//! "mix-quality" metrics — loudness, spectral balance, harshness, masking,
//! dynamic compression, transient collision, stereo phase risk, spatial
//! width — and routes them through a configurable modulation matrix onto
//! additive offsets for real-valued visual parameters.
//!
//! ## Architecture
//!
//! The pipeline runs once per tick (~60 Hz), strictly downstream:
//!
//! - **Feature extraction** - raw metrics from the current analysis buffers
//! - **Temporal smoothing** - one EMA over the whole set, snap-initialized
//! - **Adaptive normalization** - rolling min/max bounds per metric,
//!   producing 0-1 values for meters and legends
//! - **Modulation routing** - per-parameter slot chains summed into deltas
//!   for an externally owned parameter store
//!
//! Capture acquisition, rendering, and preset persistence live outside
//! this crate; the engine consumes filled [`AudioFrame`]s and produces
//! plain numbers.
//!
//! ## Quick Start
//!
//! ```rust
//! use mixlens::prelude::*;
//!
//! let mut engine = AnalysisEngine::new();
//!
//! // Route smoothed harshness onto a renderer parameter
//! engine.router_mut().add_slot(
//!     "bloom_intensity",
//!     ModulationSlot::new(MetricId::Harshness)
//!         .with_curve(0.7)
//!         .with_range(0.0, 2.5),
//! );
//!
//! engine.start_capture(48_000.0, ChannelMode::Mono).unwrap();
//!
//! // Each tick: fill a frame from the capture backend, then run it
//! let mut frame = AudioFrame::mono(48_000.0);
//! frame.spectrum.fill(0.3);
//! let out = engine.tick(&frame);
//!
//! let delta = out.deltas["bloom_intensity"];
//! assert!((0.0..=2.5).contains(&delta));
//! ```

pub mod config;
pub mod engine;
pub mod features;
pub mod frame;
pub mod metrics;
pub mod normalize;
pub mod router;
pub mod smoothing;

/// Prelude module for convenient imports
pub mod prelude {
    // Analysis boundary
    pub use crate::frame::{
        AudioFrame, ChannelMode, SpectralBufferSource, ANALYSIS_WINDOW, SPECTRUM_BINS,
    };

    // Metrics
    pub use crate::metrics::{Band, Band3, MetricId, MetricSet};

    // Pipeline stages
    pub use crate::features::FeatureExtractor;
    pub use crate::normalize::{AdaptiveNormalizer, MinMaxBounds, NormalizerConfig};
    pub use crate::smoothing::TemporalSmoother;

    // Modulation matrix
    pub use crate::router::{ModulationRouter, ModulationSlot, RouteInfo, SlotKey};

    // Configuration surface
    pub use crate::config::{ConfigError, NaturalRanges, ParameterConfig, RouterConfig};

    // Engine
    pub use crate::engine::{
        AnalysisEngine, CaptureError, DiagnosticsSnapshot, EngineConfig, MetricReading, TickOutput,
    };
}

// Re-export key types at crate root for convenience
pub use prelude::*;
