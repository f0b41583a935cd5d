//! Raw Metric Extraction
//!
//! This module computes one raw [`MetricSet`] per tick from the current
//! analysis buffers. Every formula is a pure function of the frame except
//! transient collision, which compares against the single previous-frame
//! spectrum the extractor retains.
//!
//! All ratio computations guard their denominators: anything below the
//! epsilon threshold contributes exactly zero (or the documented fallback)
//! rather than dividing. Every output is clamped to its documented range,
//! so no metric can leave this module as NaN or infinite.

use crate::frame::{AudioFrame, ChannelMode};
use crate::metrics::{Band3, MetricSet};
use core::ops::Range;

/// Near-zero threshold for denominators, in normalized units
const DENOM_EPS: f64 = 0.01;

/// Band boundaries in Hz: low 20–250, mid 250–4000, high ≥4000
const LOW_BAND_MIN_HZ: f64 = 20.0;
const LOW_BAND_MAX_HZ: f64 = 250.0;
const MID_BAND_MAX_HZ: f64 = 4000.0;

/// Gain applied to the harshness blend
const HARSHNESS_GAIN: f64 = 1.3;

/// Gain applied to the mud blend
const MUD_GAIN: f64 = 1.2;

/// Low band's ideal share of total band energy
const IDEAL_LOW_RATIO: f64 = 0.35;

/// Bins quieter than this count toward emptiness (10 in byte-magnitude units)
const EMPTINESS_THRESHOLD: f32 = 10.0 / 255.0;

/// Per-bin full-scale positive flux (50 in byte-magnitude units)
const FLUX_BIN_FULL_SCALE: f64 = 50.0 / 255.0;

/// Crest factor mapped to full compression loss
const CREST_FULL_SCALE: f64 = 10.0;

/// Amplitude floor for the loud-and-clean coherence boost
const COHERENCE_BOOST_AMPLITUDE: f64 = 0.1;

/// Mud/harshness ceiling for the loud-and-clean coherence boost
const COHERENCE_BOOST_PROBLEM_CEIL: f64 = 0.3;

/// Computes raw metrics from analysis buffers.
///
/// Holds no state other than the previous merged spectrum used by the
/// transient-collision flux. [`reset`] drops that retained frame, which
/// must happen whenever a capture session restarts.
///
/// [`reset`]: FeatureExtractor::reset
#[derive(Debug, Default)]
pub struct FeatureExtractor {
    prev_spectrum: Vec<f32>,
    has_prev: bool,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the retained previous-frame spectrum
    pub fn reset(&mut self) {
        self.prev_spectrum.clear();
        self.has_prev = false;
    }

    /// Compute one raw metric set from the current frame
    pub fn extract(&mut self, frame: &AudioFrame) -> MetricSet {
        let mut metrics = MetricSet::zeroed(frame.channels);

        metrics.amplitude = amplitude_rms(&frame.samples);

        let ranges = band_bin_ranges(frame.sample_rate, frame.bin_count());
        metrics.band_energy = Band3 {
            low: band_mean(&frame.spectrum, &ranges[0]),
            mid: band_mean(&frame.spectrum, &ranges[1]),
            high: band_mean(&frame.spectrum, &ranges[2]),
        };

        let total = metrics.band_energy.low + metrics.band_energy.mid + metrics.band_energy.high;

        metrics.harshness = problem_blend(
            metrics.band_energy.high,
            share_of(metrics.band_energy.high, total),
            HARSHNESS_GAIN,
        );
        metrics.mud = problem_blend(
            metrics.band_energy.mid,
            share_of(metrics.band_energy.mid, total),
            MUD_GAIN,
        );

        metrics.compression = compression_loss(&frame.samples, metrics.amplitude);
        metrics.collision = self.spectral_flux(&frame.spectrum);

        let low_share = share_of(metrics.band_energy.low, total);
        metrics.low_imbalance = ((low_share - IDEAL_LOW_RATIO).abs() * 2.0).clamp(0.0, 1.0);

        metrics.emptiness = emptiness(&frame.spectrum);

        if frame.channels == ChannelMode::Stereo {
            let left = &frame.left_spectrum;
            let right = &frame.right_spectrum;
            let full = 0..left.len().min(right.len());

            metrics.phase_risk = (1.0 - correlation(left, right, &full)).clamp(0.0, 1.0);
            metrics.stereo_width = Band3 {
                low: (1.0 - correlation(left, right, &ranges[0])).clamp(0.0, 1.0),
                mid: (1.0 - correlation(left, right, &ranges[1])).clamp(0.0, 1.0),
                high: (1.0 - correlation(left, right, &ranges[2])).clamp(0.0, 1.0),
            };
            metrics.pan_position = Band3 {
                low: pan_position(left, right, &ranges[0]),
                mid: pan_position(left, right, &ranges[1]),
                high: pan_position(left, right, &ranges[2]),
            };
        }

        metrics.coherence = coherence(&metrics);
        metrics
    }

    /// Positive frame-to-frame spectral flux, a transient-overlap proxy.
    /// The first frame after a reset reads 0.
    fn spectral_flux(&mut self, spectrum: &[f32]) -> f64 {
        let flux = if self.has_prev && !spectrum.is_empty() {
            let n = spectrum.len().min(self.prev_spectrum.len());
            let mut rise = 0.0f64;
            for i in 0..n {
                let delta = (spectrum[i] - self.prev_spectrum[i]) as f64;
                if delta > 0.0 {
                    rise += delta;
                }
            }
            (rise / (spectrum.len() as f64 * FLUX_BIN_FULL_SCALE)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.prev_spectrum.clear();
        self.prev_spectrum.extend_from_slice(spectrum);
        self.has_prev = !spectrum.is_empty();
        flux
    }
}

/// RMS amplitude over −1..1 samples, scaled ×2 and clamped to 1
fn amplitude_rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    (rms * 2.0).clamp(0.0, 1.0)
}

/// Bin ranges for the low/mid/high partitions at the given resolution
fn band_bin_ranges(sample_rate: f64, bin_count: usize) -> [Range<usize>; 3] {
    let nyquist = sample_rate / 2.0;
    if nyquist <= 0.0 || bin_count == 0 {
        return [0..0, 0..0, 0..0];
    }
    let bin_for = |hz: f64| -> usize { ((hz / nyquist) * bin_count as f64).floor() as usize };
    let low_start = bin_for(LOW_BAND_MIN_HZ).min(bin_count);
    let low_end = bin_for(LOW_BAND_MAX_HZ).min(bin_count);
    let mid_end = bin_for(MID_BAND_MAX_HZ).min(bin_count);
    [
        low_start..low_end.max(low_start),
        low_end..mid_end.max(low_end),
        mid_end..bin_count,
    ]
}

/// Mean magnitude over a bin range; empty ranges contribute 0
fn band_mean(spectrum: &[f32], range: &Range<usize>) -> f64 {
    let end = range.end.min(spectrum.len());
    if range.start >= end {
        return 0.0;
    }
    let sum: f64 = spectrum[range.start..end].iter().map(|&m| m as f64).sum();
    (sum / (end - range.start) as f64).clamp(0.0, 1.0)
}

/// A band's share of total band energy, zero-guarded
fn share_of(band: f64, total: f64) -> f64 {
    if total < DENOM_EPS {
        0.0
    } else {
        band / total
    }
}

/// Equal-weight blend of band energy and band share, amplified and clamped
fn problem_blend(energy: f64, share: f64, gain: f64) -> f64 {
    ((0.5 * energy + 0.5 * share) * gain).clamp(0.0, 1.0)
}

/// Dynamic-range loss from the crest factor: flat signals read high,
/// transient-rich signals read low. Near-silence is treated as crest 1.
fn compression_loss(samples: &[f32], amplitude: f64) -> f64 {
    let peak = samples.iter().map(|&s| s.abs()).fold(0.0f32, f32::max) as f64;
    let crest = if amplitude < DENOM_EPS {
        1.0
    } else {
        peak / amplitude
    };
    1.0 - (crest / CREST_FULL_SCALE).clamp(0.0, 1.0)
}

/// Fraction of bins below the low-magnitude threshold
fn emptiness(spectrum: &[f32]) -> f64 {
    if spectrum.is_empty() {
        return 0.0;
    }
    let quiet = spectrum.iter().filter(|&&m| m < EMPTINESS_THRESHOLD).count();
    quiet as f64 / spectrum.len() as f64
}

/// Normalized cross-energy of two spectra over a bin range.
///
/// Returns 1 (perfectly correlated, no risk) when either side's energy is
/// near zero, so silent bands never read as phase problems.
fn correlation(left: &[f32], right: &[f32], range: &Range<usize>) -> f64 {
    let end = range.end.min(left.len()).min(right.len());
    if range.start >= end {
        return 1.0;
    }
    let mut cross = 0.0f64;
    let mut energy_l = 0.0f64;
    let mut energy_r = 0.0f64;
    for i in range.start..end {
        let l = left[i] as f64;
        let r = right[i] as f64;
        cross += l * r;
        energy_l += l * l;
        energy_r += r * r;
    }
    let denom = (energy_l * energy_r).sqrt();
    if denom < DENOM_EPS {
        1.0
    } else {
        (cross / denom).clamp(-1.0, 1.0)
    }
}

/// Per-band pan position: −1 fully left, +1 fully right, 0 when quiet
fn pan_position(left: &[f32], right: &[f32], range: &Range<usize>) -> f64 {
    let end = range.end.min(left.len()).min(right.len());
    if range.start >= end {
        return 0.0;
    }
    let sum_l: f64 = left[range.start..end].iter().map(|&m| m as f64).sum();
    let sum_r: f64 = right[range.start..end].iter().map(|&m| m as f64).sum();
    let total = sum_l + sum_r;
    if total < DENOM_EPS {
        0.0
    } else {
        ((sum_r - sum_l) / total).clamp(-1.0, 1.0)
    }
}

/// Composite mix-health score: inverse of the weighted problem metrics,
/// boosted toward 1 when the signal is loud and clean. The boost curve is a
/// tuning choice carried over unchanged.
fn coherence(metrics: &MetricSet) -> f64 {
    let mut c = (1.0
        - (0.25 * metrics.mud
            + 0.25 * metrics.harshness
            + 0.2 * metrics.compression
            + 0.2 * metrics.collision
            + 0.1 * metrics.phase_risk))
        .clamp(0.0, 1.0);
    if metrics.amplitude > COHERENCE_BOOST_AMPLITUDE
        && metrics.mud < COHERENCE_BOOST_PROBLEM_CEIL
        && metrics.harshness < COHERENCE_BOOST_PROBLEM_CEIL
    {
        c += (1.0 - c) * 0.2;
    }
    c.clamp(0.0, 1.0)
}
