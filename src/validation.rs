use crate::config::Config;
use crate::emitter::EmitterId;
use crate::scanner::list_wireless_interfaces;
use log::{info, warn};
use std::collections::HashSet;
use thiserror::Error;

/// Configuration problems that should stop startup.
///
/// The tracking core does not check its parameters itself; these checks are
/// the operator-side guard.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("no emitters configured")]
    NoEmitters,
    #[error("invalid emitter identity {identity:?}: {reason}")]
    BadIdentity { identity: String, reason: String },
    #[error("emitter {0:?} is listed more than once")]
    DuplicateIdentity(String),
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("window_size must be at least 1")]
    EmptyWindow,
    #[error(
        "wireless interface '{interface}' not found.\n\n\
        Available interfaces: {available}\n\
        Run 'rangewatch interfaces' to list them, or pass --interface"
    )]
    NoInterface { interface: String, available: String },
}

/// Check the static configuration before any cycle runs
pub fn validate_config(config: &Config) -> Result<(), ValidationError> {
    let identities = &config.emitters.identities;
    if identities.is_empty() {
        return Err(ValidationError::NoEmitters);
    }

    let mut seen = HashSet::new();
    for raw in identities {
        let id = EmitterId::parse(raw, config.emitters.match_by).map_err(|e| {
            ValidationError::BadIdentity {
                identity: raw.clone(),
                reason: e.to_string(),
            }
        })?;
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateIdentity(raw.clone()));
        }
    }

    let filter = &config.filter;
    for (name, value) in [
        ("path_loss_exponent", config.distance.path_loss_exponent),
        ("process_noise", filter.process_noise),
        ("measurement_noise", filter.measurement_noise),
        ("initial_error", filter.initial_error),
    ] {
        if !(value > 0.0) {
            return Err(ValidationError::NotPositive { name, value });
        }
    }
    if filter.window_size == 0 {
        return Err(ValidationError::EmptyWindow);
    }

    if config.distance.tx_power_dbm >= 0.0 {
        warn!(
            "tx_power_dbm is {} dBm; reference power at 1m is normally negative",
            config.distance.tx_power_dbm
        );
    }

    Ok(())
}

/// Make sure the scan interface exists. If `iw` itself is unavailable the
/// check is skipped and the scanner reports the failure per cycle.
pub fn validate_interface(interface: &str) -> Result<(), ValidationError> {
    let interfaces = match list_wireless_interfaces() {
        Ok(list) => list,
        Err(e) => {
            warn!("Could not list wireless interfaces: {:#}", e);
            return Ok(());
        }
    };

    if interfaces.iter().any(|(name, _)| name == interface) {
        info!("Using interface: {}", interface);
        return Ok(());
    }

    let available = if interfaces.is_empty() {
        "none".to_string()
    } else {
        interfaces
            .iter()
            .map(|(name, mode)| format!("{} ({})", name, mode))
            .collect::<Vec<_>>()
            .join(", ")
    };

    Err(ValidationError::NoInterface {
        interface: interface.to_string(),
        available,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchBy;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&Config::default()), Ok(()));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_emitters() {
        let mut config = Config::default();
        config.emitters.identities.clear();
        assert_eq!(validate_config(&config), Err(ValidationError::NoEmitters));

        config.emitters.identities = vec!["A".into(), "B".into(), "A".into()];
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::DuplicateIdentity("A".into()))
        );
    }

    #[test]
    fn test_bssid_duplicates_after_normalization() {
        let mut config = Config::default();
        config.emitters.match_by = MatchBy::Bssid;
        config.emitters.identities = vec!["a6:8b:48:bc:06:ba".into(), "A6-8B-48-BC-06-BA".into()];
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::DuplicateIdentity(_))
        ));

        config.emitters.identities = vec!["narzo".into()];
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::BadIdentity { .. })
        ));
    }

    #[test]
    fn test_rejects_non_positive_parameters() {
        let mut config = Config::default();
        config.distance.path_loss_exponent = 0.0;
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::NotPositive {
                name: "path_loss_exponent",
                value: 0.0
            })
        );

        let mut config = Config::default();
        config.filter.measurement_noise = f64::NAN;
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::NotPositive { name: "measurement_noise", .. })
        ));

        let mut config = Config::default();
        config.filter.window_size = 0;
        assert_eq!(validate_config(&config), Err(ValidationError::EmptyWindow));
    }

    #[test]
    fn test_error_messages() {
        let err = ValidationError::NotPositive {
            name: "process_noise",
            value: -1.0,
        };
        assert_eq!(err.to_string(), "process_noise must be positive, got -1");
    }
}
