use crate::config::MatchBy;
use macaddr::MacAddr6;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("empty emitter identity")]
    Empty,
    #[error("'{0}' is not a hardware address")]
    BadAddress(String),
}

/// Stable key of one known emitter: an SSID label or a normalized BSSID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmitterId(String);

impl EmitterId {
    pub fn parse(raw: &str, match_by: MatchBy) -> Result<Self, IdentityError> {
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }
        match match_by {
            MatchBy::Ssid => Ok(EmitterId(raw.to_string())),
            MatchBy::Bssid => normalize_mac(raw).map(EmitterId),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EmitterId {
    fn from(label: &str) -> Self {
        EmitterId(label.to_string())
    }
}

impl fmt::Display for EmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a hardware address to upper-case, colon separated form.
/// Accepts `:`, `-` and dotted notations.
pub fn normalize_mac(raw: &str) -> Result<String, IdentityError> {
    let mac: MacAddr6 = raw
        .trim()
        .parse()
        .map_err(|_| IdentityError::BadAddress(raw.to_string()))?;

    Ok(mac
        .as_bytes()
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":"))
}

/// One emitter reading from a scan cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: EmitterId,
    pub rssi: f64,
    /// false means "not seen this cycle"
    pub valid: bool,
}

impl Observation {
    pub fn new(id: impl Into<EmitterId>, rssi: f64) -> Self {
        Observation {
            id: id.into(),
            rssi,
            valid: true,
        }
    }

    pub fn missing(id: impl Into<EmitterId>) -> Self {
        Observation {
            id: id.into(),
            rssi: 0.0,
            valid: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssid_identity_is_verbatim() {
        let id = EmitterId::parse("Y_GIRIBABU3 4620", MatchBy::Ssid).unwrap();
        assert_eq!(id.as_str(), "Y_GIRIBABU3 4620");
        assert_eq!(id.to_string(), "Y_GIRIBABU3 4620");
    }

    #[test]
    fn test_bssid_identity_is_normalized() {
        let a = EmitterId::parse("a6:8b:48:bc:06:ba", MatchBy::Bssid).unwrap();
        let b = EmitterId::parse("A6-8B-48-BC-06-BA", MatchBy::Bssid).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "A6:8B:48:BC:06:BA");
    }

    #[test]
    fn test_bad_identities() {
        assert_eq!(EmitterId::parse("", MatchBy::Ssid), Err(IdentityError::Empty));
        assert!(matches!(
            EmitterId::parse("narzo", MatchBy::Bssid),
            Err(IdentityError::BadAddress(_))
        ));
    }

    #[test]
    fn test_observation_constructors() {
        let seen = Observation::new("A", -50.0);
        assert!(seen.valid);
        assert_eq!(seen.rssi, -50.0);

        let gone = Observation::missing("B");
        assert!(!gone.valid);
        assert_eq!(gone.id, EmitterId::from("B"));
    }
}
