use crate::distance::{environments, tx_power};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub emitters: EmittersConfig,
    #[serde(default)]
    pub distance: DistanceConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmittersConfig {
    /// Known emitters, in output order
    pub identities: Vec<String>,
    /// Which scan field the identities refer to
    #[serde(default)]
    pub match_by: MatchBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBy {
    #[default]
    Ssid,
    Bssid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceConfig {
    /// Reference signal strength at 1 meter (dBm), typical range: -40 to -50
    pub tx_power_dbm: f64,
    /// Path loss exponent: 2.0 = free space, 2.5-4.0 = indoors with obstacles
    pub path_loss_exponent: f64,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        DistanceConfig {
            tx_power_dbm: tx_power::PHONE_HOTSPOT,
            path_loss_exponent: environments::OPEN_INDOOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    Recursive,
    Window,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionPolicy {
    /// Time update only runs together with a measurement
    #[default]
    OnObservation,
    /// Every emitter is predicted once per cycle, observed or not
    EveryCycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub kind: FilterKind,
    /// Seeded RSSI estimate (dBm) before any observation
    pub initial_estimate: f64,
    /// Seeded estimator uncertainty, must be positive
    pub initial_error: f64,
    pub process_noise: f64,
    /// RSSI variance
    pub measurement_noise: f64,
    /// Moving average length for the window filter
    pub window_size: usize,
    #[serde(default)]
    pub prediction: PredictionPolicy,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            kind: FilterKind::Recursive,
            initial_estimate: -60.0,
            initial_error: 1.0,
            process_noise: 0.125,
            measurement_noise: 4.0,
            window_size: 10,
            prediction: PredictionPolicy::OnObservation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Delay between the end of one cycle and the next scan
    pub interval_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        CycleConfig { interval_ms: 500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub interface: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            interface: "wlan0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Print the DATA line to stdout
    pub console: bool,
    #[serde(default)]
    pub udp: UdpConfig,
    /// SQLite cycle log, disabled when unset
    #[serde(default)]
    pub database: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            console: true,
            udp: UdpConfig::default(),
            database: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for UdpConfig {
    fn default() -> Self {
        UdpConfig {
            enabled: false,
            host: "192.168.1.105".to_string(),
            port: 4210,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| "Failed to parse config file")?;

        Ok(config)
    }

    pub fn default_config() -> Self {
        Config {
            emitters: EmittersConfig {
                identities: vec![
                    "narzo".to_string(),
                    "Y_GIRIBABU3 4620".to_string(),
                    "A".to_string(),
                ],
                match_by: MatchBy::Ssid,
            },
            distance: DistanceConfig::default(),
            filter: FilterConfig::default(),
            cycle: CycleConfig::default(),
            scan: ScanConfig::default(),
            output: OutputConfig::default(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let json = r#"{ "emitters": { "identities": ["A", "B", "C"] } }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.emitters.identities, vec!["A", "B", "C"]);
        assert_eq!(config.emitters.match_by, MatchBy::Ssid);
        assert_eq!(config.filter.kind, FilterKind::Recursive);
        assert_eq!(config.filter.prediction, PredictionPolicy::OnObservation);
        assert_eq!(config.cycle.interval_ms, 500);
        assert_eq!(config.output.udp.port, 4210);
        assert!(config.output.database.is_none());
    }

    #[test]
    fn test_distance_defaults_use_calibration_constants() {
        let distance = DistanceConfig::default();
        assert_eq!(distance.tx_power_dbm, tx_power::PHONE_HOTSPOT);
        assert_eq!(distance.path_loss_exponent, environments::OPEN_INDOOR);
        assert_eq!(Config::default().distance.tx_power_dbm, -45.0);
    }

    #[test]
    fn test_enum_names() {
        let json = r#"{
            "emitters": { "identities": ["aa:bb:cc:dd:ee:ff"], "match_by": "bssid" },
            "filter": {
                "kind": "window",
                "initial_estimate": -60.0,
                "initial_error": 1.0,
                "process_noise": 0.125,
                "measurement_noise": 4.0,
                "window_size": 5,
                "prediction": "every_cycle"
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.emitters.match_by, MatchBy::Bssid);
        assert_eq!(config.filter.kind, FilterKind::Window);
        assert_eq!(config.filter.window_size, 5);
        assert_eq!(config.filter.prediction, PredictionPolicy::EveryCycle);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("rangewatch-config-{}.json", std::process::id()));
        let config = Config::default();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.emitters.identities, config.emitters.identities);
        assert_eq!(loaded.distance.tx_power_dbm, -45.0);
        assert_eq!(loaded.filter.window_size, 10);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load("/nonexistent/rangewatch.json").is_err());
    }
}
