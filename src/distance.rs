//! Distance estimation from RSSI signal strength
//!
//! Uses the Log-Distance Path Loss Model:
//! distance = 10 ^ ((tx_power - rssi) / (10 * n))
//!
//! Where:
//! - tx_power: Reference signal strength at 1 meter (dBm)
//! - rssi: Filtered signal strength (dBm)
//! - n: Path loss exponent (environment dependent)
//!
//! Calibration constants are not validated here. A non-positive exponent
//! gives a meaningless result; `validation::validate_config` guards it at
//! startup.

use crate::config::DistanceConfig;

/// Estimate distance in meters from a (filtered) RSSI value
///
/// # Arguments
/// * `signal_dbm` - Signal strength in dBm, usually a filter estimate
/// * `tx_power_dbm` - Reference signal at 1 meter (typically -40 to -50 dBm)
/// * `path_loss_exponent` - Environment factor (2.0=free space, 3.0=indoor, 4.0=dense obstacles)
///
/// # Returns
/// Estimated distance in meters, or None when the signal is exactly 0 dBm,
/// which the model treats as unavailable
pub fn to_distance(signal_dbm: f64, tx_power_dbm: f64, path_loss_exponent: f64) -> Option<f64> {
    if signal_dbm == 0.0 {
        return None;
    }

    let exponent = (tx_power_dbm - signal_dbm) / (10.0 * path_loss_exponent);
    Some(10.0_f64.powf(exponent))
}

/// Calibrated log-distance model for one deployment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceModel {
    pub tx_power_dbm: f64,
    pub path_loss_exponent: f64,
}

impl DistanceModel {
    pub fn new(tx_power_dbm: f64, path_loss_exponent: f64) -> Self {
        DistanceModel {
            tx_power_dbm,
            path_loss_exponent,
        }
    }

    pub fn from_config(config: &DistanceConfig) -> Self {
        Self::new(config.tx_power_dbm, config.path_loss_exponent)
    }

    pub fn distance(&self, signal_dbm: f64) -> Option<f64> {
        to_distance(signal_dbm, self.tx_power_dbm, self.path_loss_exponent)
    }
}

/// Get a human-readable distance category
pub fn distance_category(distance_m: f64) -> &'static str {
    match distance_m {
        d if d < 1.0 => "immediate (<1m)",
        d if d < 3.0 => "very close (1-3m)",
        d if d < 10.0 => "close (3-10m)",
        d if d < 20.0 => "nearby (10-20m)",
        d if d < 40.0 => "far (20-40m)",
        _ => "very far (>40m)",
    }
}

/// Format distance for display, `N/A` when unavailable
pub fn format_distance(distance_m: Option<f64>) -> String {
    match distance_m {
        None => "N/A".to_string(),
        Some(d) if d < 10.0 => format!("{:.1}m", d),
        Some(d) => format!("{:.0}m", d),
    }
}

/// Typical path loss exponents for different environments
pub mod environments {
    pub const FREE_SPACE: f64 = 2.0;
    pub const OPEN_INDOOR: f64 = 2.5;
    pub const TYPICAL_INDOOR: f64 = 3.0;
    pub const DENSE_INDOOR: f64 = 3.5;
    pub const HEAVY_OBSTACLES: f64 = 4.0;
}

/// Typical reference power at 1 meter for common emitters
pub mod tx_power {
    pub const PHONE_HOTSPOT: f64 = -45.0;
    pub const HOME_ROUTER: f64 = -40.0;
    pub const ESP32_SOFTAP: f64 = -50.0;
}
