//! Modulation Routing
//!
//! The modulation matrix: each visual parameter owns an ordered list of
//! slots, each slot sources one metric component and shapes it through a
//! fixed chain (amount, power curve, inversion, per-slot smoothing, affine
//! transform, output range). Included slot outputs are summed into a single
//! additive delta per parameter; the external parameter store adds that
//! delta to its base value and clamps to its own range.
//!
//! Slots live in a stable-key arena. Their smoothing accumulators are keyed
//! by the same arena key, so removing or reordering slots can never detach
//! a slot from its own smoothing state — ordering is an explicit per-route
//! list, never an implicit array position.

use crate::metrics::{MetricId, MetricSet};
use crate::smoothing::ema;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use std::collections::BTreeMap;

new_key_type! {
    /// Stable identifier for a modulation slot
    pub struct SlotKey;
}

/// One metric-to-parameter routing with its shaping parameters.
///
/// The evaluation chain applies, in order: `amount` scaling, clamp to 0–1,
/// power `curve` (1 is linear and skipped exactly; below 1 boosts low-end
/// sensitivity), optional inversion, per-slot EMA smoothing, `multiplier`
/// and `offset` with a clamp, then mapping into `[range_min, range_max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "wasm", derive(tsify::Tsify))]
pub struct ModulationSlot {
    pub source: MetricId,
    pub amount: f64,
    pub curve: f64,
    pub invert: bool,
    pub smoothing: f64,
    pub multiplier: f64,
    pub offset: f64,
    pub range_min: f64,
    pub range_max: f64,
    pub muted: bool,
    pub solo: bool,
}

impl ModulationSlot {
    pub fn new(source: MetricId) -> Self {
        Self {
            source,
            amount: 1.0,
            curve: 1.0,
            invert: false,
            smoothing: 0.0,
            multiplier: 1.0,
            offset: 0.0,
            range_min: 0.0,
            range_max: 1.0,
            muted: false,
            solo: false,
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_curve(mut self, curve: f64) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_invert(mut self) -> Self {
        self.invert = true;
        self
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_transform(mut self, multiplier: f64, offset: f64) -> Self {
        self.multiplier = multiplier;
        self.offset = offset;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range_min = min;
        self.range_max = max;
        self
    }

    pub fn muted(mut self) -> Self {
        self.muted = true;
        self
    }

    pub fn soloed(mut self) -> Self {
        self.solo = true;
        self
    }
}

/// One parameter's ordered slot list and enable flag
#[derive(Debug, Clone, Default)]
pub struct ParameterRoute {
    pub enabled: bool,
    pub slots: Vec<SlotKey>,
}

/// Introspection view of one route, for legends and editors
#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    pub parameter: String,
    pub enabled: bool,
    pub slot_count: usize,
    /// Slots that currently contribute after mute/solo resolution
    pub included_slots: usize,
    pub sources: Vec<MetricId>,
}

/// The modulation matrix.
#[derive(Debug, Default)]
pub struct ModulationRouter {
    slots: SlotMap<SlotKey, ModulationSlot>,
    accumulators: SecondaryMap<SlotKey, f64>,
    routes: BTreeMap<String, ParameterRoute>,
}

impl ModulationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot to a parameter's route, creating the route if needed.
    /// New routes start enabled.
    pub fn add_slot(&mut self, parameter: &str, slot: ModulationSlot) -> SlotKey {
        let key = self.slots.insert(slot);
        let route = self
            .routes
            .entry(parameter.to_string())
            .or_insert_with(|| ParameterRoute {
                enabled: true,
                slots: Vec::new(),
            });
        route.slots.push(key);
        key
    }

    /// Remove a slot by its position within a parameter's route.
    ///
    /// Drops the slot's own smoothing accumulator; every other slot keeps
    /// its accumulator because keys are stable across removal.
    pub fn remove_slot(&mut self, parameter: &str, index: usize) -> Option<ModulationSlot> {
        let route = self.routes.get_mut(parameter)?;
        if index >= route.slots.len() {
            return None;
        }
        let key = route.slots.remove(index);
        self.accumulators.remove(key);
        self.slots.remove(key)
    }

    /// Mutable access to a slot by key
    pub fn slot_mut(&mut self, key: SlotKey) -> Option<&mut ModulationSlot> {
        self.slots.get_mut(key)
    }

    /// Read a slot by key
    pub fn slot(&self, key: SlotKey) -> Option<&ModulationSlot> {
        self.slots.get(key)
    }

    /// Ordered slot keys for a parameter
    pub fn slots_for(&self, parameter: &str) -> &[SlotKey] {
        self.routes
            .get(parameter)
            .map(|r| r.slots.as_slice())
            .unwrap_or(&[])
    }

    /// Ensure a parameter has a route, creating an empty enabled one
    /// if needed
    pub fn ensure_parameter(&mut self, parameter: &str) {
        self.routes
            .entry(parameter.to_string())
            .or_insert_with(|| ParameterRoute {
                enabled: true,
                slots: Vec::new(),
            });
    }

    /// Enable or disable a parameter's route. Disabling keeps the slots
    /// and their accumulators, so re-enabling resumes smoothly.
    pub fn set_enabled(&mut self, parameter: &str, enabled: bool) -> bool {
        match self.routes.get_mut(parameter) {
            Some(route) => {
                route.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, parameter: &str) -> bool {
        self.routes.get(parameter).map_or(false, |r| r.enabled)
    }

    /// Names of all configured parameters
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Remove a parameter's route and all of its slots
    pub fn clear_parameter(&mut self, parameter: &str) {
        if let Some(route) = self.routes.remove(parameter) {
            for key in route.slots {
                self.accumulators.remove(key);
                self.slots.remove(key);
            }
        }
    }

    /// Remove every route and slot
    pub fn clear(&mut self) {
        self.slots.clear();
        self.accumulators.clear();
        self.routes.clear();
    }

    /// Drop all smoothing accumulators without touching configuration.
    /// Called on capture restart so a new session starts from fresh state.
    pub fn reset_accumulators(&mut self) {
        self.accumulators.clear();
    }

    /// Evaluate every enabled route against the smoothed metric set,
    /// producing one additive delta per parameter.
    pub fn evaluate(&mut self, metrics: &MetricSet) -> BTreeMap<String, f64> {
        let mut deltas = BTreeMap::new();
        for (name, route) in &self.routes {
            if !route.enabled || route.slots.is_empty() {
                continue;
            }
            let any_solo = route
                .slots
                .iter()
                .any(|&k| self.slots.get(k).map_or(false, |s| s.solo));

            let mut delta = 0.0;
            for &key in &route.slots {
                let Some(slot) = self.slots.get(key) else {
                    continue;
                };
                let included = if any_solo { slot.solo } else { !slot.muted };
                if !included {
                    continue;
                }
                delta += evaluate_slot(slot, key, metrics, &mut self.accumulators);
            }
            deltas.insert(name.clone(), delta);
        }
        deltas
    }

    /// Introspection listing of every route, in parameter order
    pub fn active_routes(&self) -> Vec<RouteInfo> {
        self.routes
            .iter()
            .map(|(name, route)| {
                let any_solo = route
                    .slots
                    .iter()
                    .any(|&k| self.slots.get(k).map_or(false, |s| s.solo));
                let included = route
                    .slots
                    .iter()
                    .filter_map(|&k| self.slots.get(k))
                    .filter(|s| if any_solo { s.solo } else { !s.muted })
                    .count();
                RouteInfo {
                    parameter: name.clone(),
                    enabled: route.enabled,
                    slot_count: route.slots.len(),
                    included_slots: included,
                    sources: route
                        .slots
                        .iter()
                        .filter_map(|&k| self.slots.get(k))
                        .map(|s| s.source)
                        .collect(),
                }
            })
            .collect()
    }
}

/// Run one slot's shaping chain.
///
/// A source that is absent from the metric set (a stereo-only metric while
/// capture is mono) contributes exactly zero and leaves the slot's
/// accumulator untouched.
fn evaluate_slot(
    slot: &ModulationSlot,
    key: SlotKey,
    metrics: &MetricSet,
    accumulators: &mut SecondaryMap<SlotKey, f64>,
) -> f64 {
    let Some(raw) = metrics.value(slot.source) else {
        return 0.0;
    };

    let mut v = (raw * slot.amount).clamp(0.0, 1.0);
    if slot.curve != 1.0 {
        v = v.powf(slot.curve);
    }
    if slot.invert {
        v = 1.0 - v;
    }

    // First use seeds the accumulator at the incoming value, so a fresh
    // slot does not ramp up from zero.
    let smoothed = match accumulators.get(key) {
        Some(&acc) => ema(acc, v, slot.smoothing),
        None => v,
    };
    accumulators.insert(key, smoothed);
    v = smoothed;

    v = (v * slot.multiplier + slot.offset).clamp(0.0, 1.0);
    slot.range_min + v * (slot.range_max - slot.range_min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ChannelMode;

    fn metrics_with(id: MetricId, value: f64) -> MetricSet {
        let mut m = MetricSet::zeroed(ChannelMode::Stereo);
        m.set_value(id, value);
        m
    }

    #[test]
    fn test_identity_chain_maps_range_exactly() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "bloom",
            ModulationSlot::new(MetricId::Amplitude).with_range(0.0, 100.0),
        );
        let deltas = router.evaluate(&metrics_with(MetricId::Amplitude, 0.5));
        assert_eq!(deltas["bloom"], 50.0);
    }

    #[test]
    fn test_power_curve() {
        let mut router = ModulationRouter::new();
        router.add_slot("warp", ModulationSlot::new(MetricId::Harshness).with_curve(2.0));
        let deltas = router.evaluate(&metrics_with(MetricId::Harshness, 0.5));
        assert!((deltas["warp"] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_inversion() {
        let mut router = ModulationRouter::new();
        router.add_slot("fade", ModulationSlot::new(MetricId::Coherence).with_invert());
        let deltas = router.evaluate(&metrics_with(MetricId::Coherence, 0.8));
        assert!((deltas["fade"] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_amount_scales_before_curve() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "glow",
            ModulationSlot::new(MetricId::Amplitude)
                .with_amount(0.5)
                .with_curve(2.0),
        );
        // 1.0 * 0.5 = 0.5, then squared
        let deltas = router.evaluate(&metrics_with(MetricId::Amplitude, 1.0));
        assert!((deltas["glow"] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_multiplier_offset_clamp() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "shift",
            ModulationSlot::new(MetricId::Amplitude).with_transform(2.0, 0.5),
        );
        // 0.4 * 2 + 0.5 = 1.3 -> clamped to 1.0
        let deltas = router.evaluate(&metrics_with(MetricId::Amplitude, 0.4));
        assert_eq!(deltas["shift"], 1.0);
    }

    #[test]
    fn test_multi_slot_summation() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "size",
            ModulationSlot::new(MetricId::Amplitude).with_range(0.0, 50.0),
        );
        router.add_slot(
            "size",
            ModulationSlot::new(MetricId::Harshness).with_range(0.0, 50.0),
        );
        let mut m = MetricSet::zeroed(ChannelMode::Stereo);
        m.amplitude = 0.5;
        m.harshness = 0.3;
        let deltas = router.evaluate(&m);
        assert!((deltas["size"] - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_solo_excludes_everything_else() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "hue",
            ModulationSlot::new(MetricId::Amplitude).with_range(0.0, 10.0),
        );
        router.add_slot(
            "hue",
            ModulationSlot::new(MetricId::Harshness)
                .with_range(0.0, 10.0)
                .soloed(),
        );
        let mut m = MetricSet::zeroed(ChannelMode::Stereo);
        m.amplitude = 1.0;
        m.harshness = 0.5;
        let deltas = router.evaluate(&m);
        // Only the soloed harshness slot contributes
        assert!((deltas["hue"] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_muted_slot_contributes_nothing() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "spin",
            ModulationSlot::new(MetricId::Amplitude).with_range(0.0, 10.0).muted(),
        );
        let deltas = router.evaluate(&metrics_with(MetricId::Amplitude, 1.0));
        assert_eq!(deltas["spin"], 0.0);
    }

    #[test]
    fn test_missing_source_contributes_zero_even_inverted() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "sway",
            ModulationSlot::new(MetricId::PhaseRisk)
                .with_invert()
                .with_range(0.0, 10.0),
        );
        // Mono capture: phase risk does not exist, so even an inverting
        // slot must contribute zero rather than range-mapping 1.0
        let mono = MetricSet::zeroed(ChannelMode::Mono);
        let deltas = router.evaluate(&mono);
        assert_eq!(deltas["sway"], 0.0);
    }

    #[test]
    fn test_slot_smoothing_seeds_then_tracks() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "pulse",
            ModulationSlot::new(MetricId::Amplitude).with_smoothing(0.5),
        );
        // First evaluation seeds the accumulator directly
        let first = router.evaluate(&metrics_with(MetricId::Amplitude, 0.8));
        assert_eq!(first["pulse"], 0.8);
        // Second evaluation smooths: 0.8 * 0.5 + 0.0 * 0.5
        let second = router.evaluate(&metrics_with(MetricId::Amplitude, 0.0));
        assert!((second["pulse"] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_removal_keeps_sibling_accumulators() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "flow",
            ModulationSlot::new(MetricId::Harshness).with_smoothing(0.5),
        );
        router.add_slot(
            "flow",
            ModulationSlot::new(MetricId::Amplitude).with_smoothing(0.5),
        );

        let mut m = MetricSet::zeroed(ChannelMode::Stereo);
        m.amplitude = 0.8;
        router.evaluate(&m);

        // Removing the first slot must not disturb the second's state
        let removed = router.remove_slot("flow", 0);
        assert_eq!(removed.map(|s| s.source), Some(MetricId::Harshness));

        m.amplitude = 0.0;
        let deltas = router.evaluate(&m);
        // Accumulator continues from 0.8, not from a reset
        assert!((deltas["flow"] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_disable_preserves_accumulators() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "beam",
            ModulationSlot::new(MetricId::Amplitude).with_smoothing(0.9),
        );
        router.evaluate(&metrics_with(MetricId::Amplitude, 1.0));

        router.set_enabled("beam", false);
        let silent = router.evaluate(&metrics_with(MetricId::Amplitude, 0.0));
        assert!(!silent.contains_key("beam"));

        // Re-enabling resumes from the held accumulator, not from zero
        router.set_enabled("beam", true);
        let resumed = router.evaluate(&metrics_with(MetricId::Amplitude, 1.0));
        assert_eq!(resumed["beam"], 1.0);
    }

    #[test]
    fn test_curve_one_is_skipped_exactly() {
        let mut router = ModulationRouter::new();
        router.add_slot("dust", ModulationSlot::new(MetricId::Amplitude));
        let v = 0.123456789;
        let deltas = router.evaluate(&metrics_with(MetricId::Amplitude, v));
        assert_eq!(deltas["dust"], v);
    }

    #[test]
    fn test_reset_accumulators_keeps_configuration() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "arc",
            ModulationSlot::new(MetricId::Amplitude).with_smoothing(0.9),
        );
        router.evaluate(&metrics_with(MetricId::Amplitude, 1.0));
        router.reset_accumulators();

        assert_eq!(router.slots_for("arc").len(), 1);
        // Next evaluation re-seeds instead of decaying from 1.0
        let deltas = router.evaluate(&metrics_with(MetricId::Amplitude, 0.2));
        assert!((deltas["arc"] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_active_routes_view() {
        let mut router = ModulationRouter::new();
        router.add_slot("a", ModulationSlot::new(MetricId::Amplitude));
        router.add_slot("a", ModulationSlot::new(MetricId::Mud).muted());
        router.set_enabled("a", false);

        let routes = router.active_routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].parameter, "a");
        assert!(!routes[0].enabled);
        assert_eq!(routes[0].slot_count, 2);
        assert_eq!(routes[0].included_slots, 1);
        assert_eq!(routes[0].sources, vec![MetricId::Amplitude, MetricId::Mud]);
    }

    #[test]
    fn test_clear_parameter() {
        let mut router = ModulationRouter::new();
        let key = router.add_slot("x", ModulationSlot::new(MetricId::Amplitude));
        router.clear_parameter("x");
        assert!(router.slot(key).is_none());
        assert!(router.slots_for("x").is_empty());
    }

    #[test]
    fn test_external_clamp_pins_parameter_at_maximum() {
        let mut router = ModulationRouter::new();
        router.add_slot(
            "intensity",
            ModulationSlot::new(MetricId::Amplitude).with_range(0.0, 999.0),
        );
        let deltas = router.evaluate(&metrics_with(MetricId::Amplitude, 1.0));

        // The parameter store owns the valid range; a huge delta cannot
        // push a maxed-out parameter past it.
        let base = 1.0;
        let clamped = (base + deltas["intensity"]).clamp(0.0, 1.0);
        assert_eq!(clamped, 1.0);
    }
}
