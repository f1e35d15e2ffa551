//! Process configuration shared by every component.
//!
//! Passive data: nothing here changes once the hub is built.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Unit system for temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }

    /// Parse a unit symbol (`°C`, `C`, `°F`, `F`).
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim_start_matches('°') {
            "C" | "c" => Some(Self::Celsius),
            "F" | "f" => Some(Self::Fahrenheit),
            _ => None,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Location, units and paths of this hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub time_zone: String,
    pub temperature_unit: TemperatureUnit,
    /// Directory the hub reads its files from.
    pub config_dir: PathBuf,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            location_name: "Home".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            time_zone: "UTC".to_string(),
            temperature_unit: TemperatureUnit::Celsius,
            config_dir: PathBuf::from("."),
        }
    }
}

impl HubConfig {
    /// Join `parts` under the configuration directory.
    #[must_use]
    pub fn path(&self, parts: &[&str]) -> PathBuf {
        parts
            .iter()
            .fold(self.config_dir.clone(), |acc, part| acc.join(part))
    }

    /// Convert `value` expressed in `unit` into the configured unit,
    /// rounded to one decimal.
    #[must_use]
    pub fn temperature(&self, value: f64, unit: TemperatureUnit) -> f64 {
        let converted = match (unit, self.temperature_unit) {
            (TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit) => value * 1.8 + 32.0,
            (TemperatureUnit::Fahrenheit, TemperatureUnit::Celsius) => (value - 32.0) / 1.8,
            _ => value,
        };
        (converted * 10.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.location_name, "Home");
        assert_eq!(config.time_zone, "UTC");
        assert_eq!(config.temperature_unit, TemperatureUnit::Celsius);
    }

    #[test]
    fn should_join_path_under_config_dir() {
        let config = HubConfig {
            config_dir: PathBuf::from("/etc/homecore"),
            ..HubConfig::default()
        };
        assert_eq!(
            config.path(&["scripts", "wake.toml"]),
            PathBuf::from("/etc/homecore/scripts/wake.toml")
        );
        assert_eq!(config.path(&[]), PathBuf::from("/etc/homecore"));
    }

    #[test]
    fn should_convert_fahrenheit_to_celsius() {
        let config = HubConfig::default();
        let celsius = config.temperature(212.0, TemperatureUnit::Fahrenheit);
        assert!((celsius - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_convert_celsius_to_fahrenheit() {
        let config = HubConfig {
            temperature_unit: TemperatureUnit::Fahrenheit,
            ..HubConfig::default()
        };
        assert!((config.temperature(21.5, TemperatureUnit::Celsius) - 70.7).abs() < 1e-9);
    }

    #[test]
    fn should_keep_value_when_units_match() {
        let config = HubConfig::default();
        assert!((config.temperature(21.54, TemperatureUnit::Celsius) - 21.5).abs() < 1e-9);
    }

    #[test]
    fn should_parse_unit_symbols() {
        assert_eq!(TemperatureUnit::from_symbol("°F"), Some(TemperatureUnit::Fahrenheit));
        assert_eq!(TemperatureUnit::from_symbol("C"), Some(TemperatureUnit::Celsius));
        assert_eq!(TemperatureUnit::from_symbol("K"), None);
    }

    #[test]
    fn should_deserialize_partial_json_with_defaults() {
        let config: HubConfig =
            serde_json::from_str(r#"{"location_name": "Cabin", "temperature_unit": "fahrenheit"}"#)
                .unwrap();
        assert_eq!(config.location_name, "Cabin");
        assert_eq!(config.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(config.time_zone, "UTC");
    }
}
