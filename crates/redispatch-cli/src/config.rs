//! Run configuration
//!
//! ```toml
//! [solver]
//! name = "clarabel"
//! preset = "default"
//!
//! [solver.options]
//! fixed_tolerance = 1e-9
//!
//! [zones]
//! strategy = "latitude"
//! latitude = 51.0
//!
//! [bidding]
//! asymmetric = true
//! ```
//!
//! Every section and field is optional. Command-line flags override the file.

use anyhow::{Context, Result};
use redispatch_algo::{SolverOption, SolverSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RedispatchConfig {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub zones: ZoneConfig,
    #[serde(default)]
    pub bidding: BiddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// LP solver identifier
    #[serde(default = "default_solver")]
    pub name: String,
    /// Named option block, see [`SolverSettings::preset`]
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Extra options, applied on top of the preset
    #[serde(default)]
    pub options: BTreeMap<String, SolverOption>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            name: default_solver(),
            preset: default_preset(),
            options: BTreeMap::new(),
        }
    }
}

fn default_solver() -> String {
    "clarabel".to_string()
}

fn default_preset() -> String {
    "default".to_string()
}

impl SolverConfig {
    pub fn settings(&self) -> Result<SolverSettings> {
        let mut settings = SolverSettings::preset(&self.name, &self.preset)?;
        settings
            .options
            .extend(self.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// `country` or `latitude`
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Split latitude for the `latitude` strategy
    #[serde(default = "default_latitude")]
    pub latitude: f64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            latitude: default_latitude(),
        }
    }
}

fn default_strategy() -> String {
    "country".to_string()
}

fn default_latitude() -> f64 {
    51.0
}

impl ZoneConfig {
    pub fn strategy(&self) -> Result<ZoneStrategy> {
        match self.strategy.as_str() {
            "country" => Ok(ZoneStrategy::Country),
            "latitude" => Ok(ZoneStrategy::Latitude(self.latitude)),
            other => anyhow::bail!("unknown zone strategy '{other}' (expected country or latitude)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiddingConfig {
    #[serde(default)]
    pub asymmetric: bool,
    #[serde(default = "default_up_factor")]
    pub up_factor: f64,
    #[serde(default = "default_down_factor")]
    pub down_factor: f64,
}

impl Default for BiddingConfig {
    fn default() -> Self {
        Self {
            asymmetric: false,
            up_factor: default_up_factor(),
            down_factor: default_down_factor(),
        }
    }
}

fn default_up_factor() -> f64 {
    2.0
}

fn default_down_factor() -> f64 {
    -0.5
}

/// Bidding-zone assignment selected on the command line or in the config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneStrategy {
    Country,
    Latitude(f64),
}

impl FromStr for ZoneStrategy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.split_once(':') {
            None if value == "country" => Ok(ZoneStrategy::Country),
            None if value == "latitude" => Ok(ZoneStrategy::Latitude(default_latitude())),
            Some(("latitude", degrees)) => degrees
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(ZoneStrategy::Latitude)
                .ok_or_else(|| format!("invalid latitude '{degrees}'")),
            _ => Err(format!(
                "unknown zone strategy '{value}' (expected country or latitude[:<degrees>])"
            )),
        }
    }
}

impl fmt::Display for ZoneStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneStrategy::Country => f.write_str("country"),
            ZoneStrategy::Latitude(y) => write!(f, "latitude:{y}"),
        }
    }
}

/// Load a config file; a missing path gives the defaults.
pub fn load_config(path: Option<&Path>) -> Result<RedispatchConfig> {
    let Some(path) = path else {
        return Ok(RedispatchConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config.solver.name, "clarabel");
        assert_eq!(config.zones.strategy().unwrap(), ZoneStrategy::Country);
        assert!(!config.bidding.asymmetric);
        assert!(config.solver.settings().unwrap().options.is_empty());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: RedispatchConfig = toml::from_str(
            r#"
            [solver]
            preset = "default"
            [solver.options]
            fixed_tolerance = 1e-6

            [zones]
            strategy = "latitude"
            "#,
        )
        .unwrap();
        assert_eq!(config.solver.name, "clarabel");
        assert_eq!(config.zones.strategy().unwrap(), ZoneStrategy::Latitude(51.0));
        assert_eq!(config.bidding.up_factor, 2.0);
        let settings = config.solver.settings().unwrap();
        assert_eq!(
            settings.option("fixed_tolerance"),
            Some(&SolverOption::Float(1e-6))
        );
    }

    #[test]
    fn gurobi_preset_options_are_merged() {
        let config = SolverConfig {
            name: "gurobi".into(),
            preset: "default".into(),
            options: BTreeMap::from([("Threads".to_string(), SolverOption::Int(8))]),
        };
        let settings = config.settings().unwrap();
        assert_eq!(settings.options.len(), 8);
        assert_eq!(settings.option("Threads"), Some(&SolverOption::Int(8)));
    }

    #[test]
    fn zone_strategy_parsing() {
        assert_eq!("country".parse::<ZoneStrategy>(), Ok(ZoneStrategy::Country));
        assert_eq!("latitude:48.5".parse::<ZoneStrategy>(), Ok(ZoneStrategy::Latitude(48.5)));
        assert_eq!("latitude".parse::<ZoneStrategy>(), Ok(ZoneStrategy::Latitude(51.0)));
        assert!("latitude:north".parse::<ZoneStrategy>().is_err());
        assert!("nuts2".parse::<ZoneStrategy>().is_err());
    }

    #[test]
    fn unknown_config_strategy_fails() {
        let zones = ZoneConfig {
            strategy: "nuts2".into(),
            latitude: 51.0,
        };
        assert!(zones.strategy().is_err());
    }
}
