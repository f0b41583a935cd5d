//! Configuration Export and Import
//!
//! The modulation matrix serializes to plain data: a versioned map of
//! parameter names to enabled flags and ordered slot lists. Export and
//! import are pure — no I/O happens here; the host's preset store decides
//! where the JSON lives.
//!
//! Import validates the entire payload before touching the router, so a
//! malformed preset can never leave the matrix half-applied. The legacy
//! flat format (one source and a sensitivity per parameter, no slots) is
//! detected and upgraded transparently to a single-slot route.

use crate::metrics::MetricId;
use crate::router::{ModulationRouter, ModulationSlot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current configuration schema version
pub const CONFIG_VERSION: u32 = 2;

/// Natural parameter bounds used when upgrading legacy presets,
/// keyed by parameter name
pub type NaturalRanges = BTreeMap<String, (f64, f64)>;

/// Serializable state of one parameter's route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "wasm", derive(tsify::Tsify))]
pub struct ParameterConfig {
    pub enabled: bool,
    pub slots: Vec<ModulationSlot>,
}

/// Serializable state of the whole modulation matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "wasm", derive(tsify::Tsify))]
pub struct RouterConfig {
    /// Schema version for forward compatibility
    pub version: u32,
    pub parameters: BTreeMap<String, ParameterConfig>,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            parameters: BTreeMap::new(),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON, accepting both the current schema and the legacy
    /// flat format. Legacy routes take their output range from
    /// `natural_ranges` (0–1 when the parameter is unknown).
    pub fn from_json(json: &str, natural_ranges: &NaturalRanges) -> Result<Self, ConfigError> {
        let any: AnyConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config = match any {
            AnyConfig::Modern(config) => config,
            AnyConfig::Legacy(flat) => upgrade_legacy(flat, natural_ranges),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every slot field for sanity without applying anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (parameter, param) in &self.parameters {
            for (index, slot) in param.slots.iter().enumerate() {
                if let Err(reason) = validate_slot(slot) {
                    return Err(ConfigError::InvalidSlot {
                        parameter: parameter.clone(),
                        index,
                        reason,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors surfaced by configuration import
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The payload was not parseable as any supported schema
    Parse(String),
    /// One slot carried an out-of-range or non-finite field
    InvalidSlot {
        parameter: String,
        index: usize,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "Unparseable configuration: {}", msg),
            ConfigError::InvalidSlot {
                parameter,
                index,
                reason,
            } => write!(f, "Invalid slot {} on '{}': {}", index, parameter, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Legacy flat entry: one source with a sensitivity, no slot list
#[derive(Debug, Clone, Deserialize)]
struct LegacyParameter {
    source: MetricId,
    sensitivity: f64,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnyConfig {
    Modern(RouterConfig),
    Legacy(BTreeMap<String, LegacyParameter>),
}

fn upgrade_legacy(flat: BTreeMap<String, LegacyParameter>, ranges: &NaturalRanges) -> RouterConfig {
    let mut config = RouterConfig::new();
    for (name, legacy) in flat {
        let (range_min, range_max) = ranges.get(&name).copied().unwrap_or((0.0, 1.0));
        let slot = ModulationSlot::new(legacy.source)
            .with_amount(legacy.sensitivity.clamp(0.0, 1.0))
            .with_range(range_min, range_max);
        config.parameters.insert(
            name,
            ParameterConfig {
                enabled: legacy.enabled,
                slots: vec![slot],
            },
        );
    }
    config
}

fn validate_slot(slot: &ModulationSlot) -> Result<(), String> {
    if !slot.amount.is_finite() || !(0.0..=1.0).contains(&slot.amount) {
        return Err(format!("amount {} outside 0-1", slot.amount));
    }
    if !slot.curve.is_finite() || slot.curve <= 0.0 {
        return Err(format!("curve {} must be positive", slot.curve));
    }
    if !slot.smoothing.is_finite() || !(0.0..1.0).contains(&slot.smoothing) {
        return Err(format!("smoothing {} outside 0-1", slot.smoothing));
    }
    if !slot.multiplier.is_finite() || !slot.offset.is_finite() {
        return Err("non-finite transform".to_string());
    }
    if !slot.range_min.is_finite() || !slot.range_max.is_finite() {
        return Err("non-finite range".to_string());
    }
    if slot.range_min > slot.range_max {
        return Err(format!(
            "range {}..{} is inverted",
            slot.range_min, slot.range_max
        ));
    }
    Ok(())
}

impl ModulationRouter {
    /// Snapshot the matrix as plain serializable data
    pub fn export_config(&self) -> RouterConfig {
        let mut config = RouterConfig::new();
        for name in self.parameters().map(String::from).collect::<Vec<_>>() {
            let slots = self
                .slots_for(&name)
                .iter()
                .filter_map(|&key| self.slot(key).cloned())
                .collect();
            config.parameters.insert(
                name.clone(),
                ParameterConfig {
                    enabled: self.is_enabled(&name),
                    slots,
                },
            );
        }
        config
    }

    /// Replace the matrix with the given configuration.
    ///
    /// The payload is validated in full first; on any error the existing
    /// routes, slots, and accumulators are left untouched.
    pub fn import_config(&mut self, config: &RouterConfig) -> Result<(), ConfigError> {
        if let Err(err) = config.validate() {
            log::warn!("rejecting modulation config import: {}", err);
            return Err(err);
        }
        self.clear();
        for (name, param) in &config.parameters {
            self.ensure_parameter(name);
            for slot in &param.slots {
                self.add_slot(name, slot.clone());
            }
            self.set_enabled(name, param.enabled);
        }
        Ok(())
    }
}
