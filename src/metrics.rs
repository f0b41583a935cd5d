//! Metric Identifiers and Metric Sets
//!
//! This module defines the closed set of mix-quality metrics the pipeline
//! produces: a fixed struct of scalars and low/mid/high band vectors, plus
//! the identifier enum used to address individual components from the
//! modulation matrix and the configuration surface.

use crate::frame::ChannelMode;
use serde::{Deserialize, Serialize};

/// One of the three frequency partitions used by banded metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Low,
    Mid,
    High,
}

/// A low/mid/high band triple
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Band3 {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

impl Band3 {
    pub fn splat(value: f64) -> Self {
        Self {
            low: value,
            mid: value,
            high: value,
        }
    }

    pub fn get(&self, band: Band) -> f64 {
        match band {
            Band::Low => self.low,
            Band::Mid => self.mid,
            Band::High => self.high,
        }
    }

    pub fn set(&mut self, band: Band, value: f64) {
        match band {
            Band::Low => self.low = value,
            Band::Mid => self.mid = value,
            Band::High => self.high = value,
        }
    }
}

/// Identifier for every addressable metric component.
///
/// Banded metrics expose one identifier per component so a modulation slot
/// can source, say, only the low band's energy. The enum is exhaustive by
/// design: an unsupported source name fails configuration parsing instead
/// of silently reading zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "wasm", derive(tsify::Tsify))]
#[serde(rename_all = "snake_case")]
pub enum MetricId {
    Amplitude,
    BandLow,
    BandMid,
    BandHigh,
    Harshness,
    Mud,
    Compression,
    Collision,
    LowImbalance,
    Emptiness,
    PhaseRisk,
    WidthLow,
    WidthMid,
    WidthHigh,
    PanLow,
    PanMid,
    PanHigh,
    Coherence,
}

impl MetricId {
    /// Every metric identifier, in display order
    pub const ALL: [MetricId; 18] = [
        MetricId::Amplitude,
        MetricId::BandLow,
        MetricId::BandMid,
        MetricId::BandHigh,
        MetricId::Harshness,
        MetricId::Mud,
        MetricId::Compression,
        MetricId::Collision,
        MetricId::LowImbalance,
        MetricId::Emptiness,
        MetricId::PhaseRisk,
        MetricId::WidthLow,
        MetricId::WidthMid,
        MetricId::WidthHigh,
        MetricId::PanLow,
        MetricId::PanMid,
        MetricId::PanHigh,
        MetricId::Coherence,
    ];

    /// Whether this metric only exists for two-channel capture
    pub fn is_stereo_only(&self) -> bool {
        matches!(
            self,
            MetricId::PhaseRisk
                | MetricId::WidthLow
                | MetricId::WidthMid
                | MetricId::WidthHigh
                | MetricId::PanLow
                | MetricId::PanMid
                | MetricId::PanHigh
        )
    }

    /// Whether this metric is naturally bipolar (−1..1) rather than 0–1
    pub fn is_bipolar(&self) -> bool {
        matches!(self, MetricId::PanLow | MetricId::PanMid | MetricId::PanHigh)
    }

    /// Human-readable label for meters and legends
    pub fn label(&self) -> &'static str {
        match self {
            MetricId::Amplitude => "Amplitude",
            MetricId::BandLow => "Low Energy",
            MetricId::BandMid => "Mid Energy",
            MetricId::BandHigh => "High Energy",
            MetricId::Harshness => "Harshness",
            MetricId::Mud => "Mud",
            MetricId::Compression => "Compression",
            MetricId::Collision => "Collision",
            MetricId::LowImbalance => "Low Imbalance",
            MetricId::Emptiness => "Emptiness",
            MetricId::PhaseRisk => "Phase Risk",
            MetricId::WidthLow => "Width (Low)",
            MetricId::WidthMid => "Width (Mid)",
            MetricId::WidthHigh => "Width (High)",
            MetricId::PanLow => "Pan (Low)",
            MetricId::PanMid => "Pan (Mid)",
            MetricId::PanHigh => "Pan (High)",
            MetricId::Coherence => "Coherence",
        }
    }
}

/// One full set of mix-quality metrics.
///
/// Three instances live concurrently in the pipeline: the raw set computed
/// this tick, the smoothed set persisting across ticks, and the normalized
/// set derived for diagnostics. Component lookup goes through [`value`],
/// which yields `None` for stereo-only metrics when the set was computed
/// from a mono stream — that is what makes a mono-mode stereo slot
/// contribute nothing downstream.
///
/// [`value`]: MetricSet::value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub channels: ChannelMode,
    pub amplitude: f64,
    pub band_energy: Band3,
    pub harshness: f64,
    pub mud: f64,
    pub compression: f64,
    pub collision: f64,
    pub low_imbalance: f64,
    pub emptiness: f64,
    pub phase_risk: f64,
    pub stereo_width: Band3,
    pub pan_position: Band3,
    pub coherence: f64,
}

impl MetricSet {
    /// All-zero set for the given channel mode
    pub fn zeroed(channels: ChannelMode) -> Self {
        Self {
            channels,
            amplitude: 0.0,
            band_energy: Band3::default(),
            harshness: 0.0,
            mud: 0.0,
            compression: 0.0,
            collision: 0.0,
            low_imbalance: 0.0,
            emptiness: 0.0,
            phase_risk: 0.0,
            stereo_width: Band3::default(),
            pan_position: Band3::default(),
            coherence: 0.0,
        }
    }

    /// Fixed placeholder substituted while capture is disabled: a healthy,
    /// mid-level signal with no problems, so meters and the renderer never
    /// observe missing data.
    pub fn neutral() -> Self {
        Self {
            channels: ChannelMode::Mono,
            amplitude: 0.5,
            band_energy: Band3::default(),
            harshness: 0.0,
            mud: 0.0,
            compression: 0.0,
            collision: 0.0,
            low_imbalance: 0.0,
            emptiness: 0.0,
            phase_risk: 0.0,
            stereo_width: Band3::default(),
            pan_position: Band3::default(),
            coherence: 1.0,
        }
    }

    /// Look up one metric component.
    ///
    /// Returns `None` exactly when the component is stereo-only and this
    /// set was computed from a mono stream.
    pub fn value(&self, id: MetricId) -> Option<f64> {
        if id.is_stereo_only() && self.channels == ChannelMode::Mono {
            return None;
        }
        Some(match id {
            MetricId::Amplitude => self.amplitude,
            MetricId::BandLow => self.band_energy.low,
            MetricId::BandMid => self.band_energy.mid,
            MetricId::BandHigh => self.band_energy.high,
            MetricId::Harshness => self.harshness,
            MetricId::Mud => self.mud,
            MetricId::Compression => self.compression,
            MetricId::Collision => self.collision,
            MetricId::LowImbalance => self.low_imbalance,
            MetricId::Emptiness => self.emptiness,
            MetricId::PhaseRisk => self.phase_risk,
            MetricId::WidthLow => self.stereo_width.low,
            MetricId::WidthMid => self.stereo_width.mid,
            MetricId::WidthHigh => self.stereo_width.high,
            MetricId::PanLow => self.pan_position.low,
            MetricId::PanMid => self.pan_position.mid,
            MetricId::PanHigh => self.pan_position.high,
            MetricId::Coherence => self.coherence,
        })
    }

    /// Write one metric component
    pub fn set_value(&mut self, id: MetricId, value: f64) {
        match id {
            MetricId::Amplitude => self.amplitude = value,
            MetricId::BandLow => self.band_energy.low = value,
            MetricId::BandMid => self.band_energy.mid = value,
            MetricId::BandHigh => self.band_energy.high = value,
            MetricId::Harshness => self.harshness = value,
            MetricId::Mud => self.mud = value,
            MetricId::Compression => self.compression = value,
            MetricId::Collision => self.collision = value,
            MetricId::LowImbalance => self.low_imbalance = value,
            MetricId::Emptiness => self.emptiness = value,
            MetricId::PhaseRisk => self.phase_risk = value,
            MetricId::WidthLow => self.stereo_width.low = value,
            MetricId::WidthMid => self.stereo_width.mid = value,
            MetricId::WidthHigh => self.stereo_width.high = value,
            MetricId::PanLow => self.pan_position.low = value,
            MetricId::PanMid => self.pan_position.mid = value,
            MetricId::PanHigh => self.pan_position.high = value,
            MetricId::Coherence => self.coherence = value,
        }
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::neutral()
    }
}
