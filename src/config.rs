//! `config.toml` loading. Every section falls back to its defaults.

use crate::proximity::DEFAULT_RADIUS_KM;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub location: LocationConfig,
    pub api: ApiConfig,
    pub ui: UiConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    pub auto_detect: bool,              // Use IP geolocation if true
    pub lookup_ip: String,              // IP to geolocate; empty means our own
    pub manual_lat: Option<f64>,        // Used when auto_detect is false
    pub manual_lon: Option<f64>,        // Used when auto_detect is false
    pub service_area_keywords: Vec<String>,
    pub nearby_radius_km: f64,
    pub cache_path: String, // Empty keeps the cache in memory only
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub nominatim_url: String,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    pub geocode_timeout_seconds: u64,
    pub poll_interval_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub default_view: String, // "Reports", "Location", "Submit" or "Dashboard"
    pub tick_rate_ms: u64,
    pub pin_step_degrees: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            auto_detect: true,
            lookup_ip: String::new(),
            manual_lat: None,
            manual_lon: None,
            service_area_keywords: vec!["metro manila".to_string()],
            nearby_radius_km: DEFAULT_RADIUS_KM,
            cache_path: "ulat_cache.db".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("ulat-ph/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_seconds: 10,
            geocode_timeout_seconds: 5,
            poll_interval_seconds: 30,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_view: "Reports".to_string(),
            tick_rate_ms: 150,
            pin_step_degrees: 0.001,
        }
    }
}

impl Config {
    /// Loads the config file at `path`.
    /// If it doesn't exist, writes the defaults there and uses them.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if let Ok(content) = fs::read_to_string(path) {
            match Self::parse(&content) {
                Ok(config) => return config,
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    return Config::default();
                }
            }
        }

        let default_config = Config::default();

        // Save default config to disk for the user to edit later
        match toml::to_string_pretty(&default_config) {
            Ok(toml_string) => {
                if fs::write(path, toml_string).is_err() {
                    warn!("Could not write default {} to disk.", path.display());
                }
            }
            Err(e) => warn!("Could not serialize default config: {}", e),
        }

        info!("Loaded default configuration.");
        default_config
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config = Config::parse(
            r#"
            [location]
            auto_detect = false
            manual_lat = 14.5995
            manual_lon = 120.9842
            service_area_keywords = ["Metro Manila", "Rizal"]

            [api]
            base_url = "http://192.168.1.3:5000"
            "#,
        )
        .unwrap();

        assert!(!config.location.auto_detect);
        assert_eq!(config.location.manual_lat, Some(14.5995));
        assert_eq!(config.location.service_area_keywords.len(), 2);
        assert_eq!(config.location.nearby_radius_km, DEFAULT_RADIUS_KM);
        assert_eq!(config.api.base_url, "http://192.168.1.3:5000");
        assert_eq!(config.api.geocode_timeout_seconds, 5);
        assert_eq!(config.ui, UiConfig::default());
    }

    #[test]
    fn defaults_survive_a_toml_round_trip() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert_eq!(Config::parse(&text).unwrap(), Config::default());
    }

    #[test]
    fn missing_file_writes_defaults() {
        let path = std::env::temp_dir().join(format!("ulat-config-{}.toml", std::process::id()));
        let _ = fs::remove_file(&path);

        let config = Config::load(&path);

        assert_eq!(config, Config::default());
        assert!(path.exists());
        let _ = fs::remove_file(&path);
    }
}
