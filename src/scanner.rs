use crate::config::MatchBy;
use crate::emitter::{EmitterId, Observation};
use anyhow::{Context, Result};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::process::Command;

/// One network seen by a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub ssid: String,
    #[serde(default)]
    pub bssid: String,
    pub rssi: f64,
}

impl ScanEntry {
    pub fn new(ssid: &str, bssid: &str, rssi: f64) -> Self {
        ScanEntry {
            ssid: ssid.to_string(),
            bssid: bssid.to_string(),
            rssi,
        }
    }
}

/// Source of one scan per cycle
pub trait Scanner {
    /// Scan once. `Ok(None)` means the source is exhausted.
    fn scan(&mut self) -> Result<Option<Vec<ScanEntry>>>;
}

/// Turn raw scan entries into observations keyed the way emitters are configured.
/// Scan order is preserved.
pub fn to_observations(entries: &[ScanEntry], match_by: MatchBy) -> Vec<Observation> {
    entries
        .iter()
        .filter_map(|entry| {
            let raw = match match_by {
                MatchBy::Ssid => &entry.ssid,
                MatchBy::Bssid => &entry.bssid,
            };
            match EmitterId::parse(raw, match_by) {
                Ok(id) => Some(Observation::new(id, entry.rssi)),
                Err(e) => {
                    trace!("Skipping scan entry {:?}: {}", entry, e);
                    None
                }
            }
        })
        .collect()
}

/// Live scanner backed by `iw dev <interface> scan`
pub struct IwScanner {
    interface: String,
}

impl IwScanner {
    pub fn new(interface: String) -> Self {
        IwScanner { interface }
    }
}

impl Scanner for IwScanner {
    fn scan(&mut self) -> Result<Option<Vec<ScanEntry>>> {
        let output = Command::new("iw")
            .args(["dev", &self.interface, "scan"])
            .output()
            .context("Failed to execute iw command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("iw scan failed: {}", stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let entries = parse_iw_scan(&stdout);
        debug!("Scanned {} networks on {}", entries.len(), self.interface);
        Ok(Some(entries))
    }
}

/// Parse `iw dev <if> scan` output into scan entries.
/// BSS blocks without a signal line are dropped.
pub fn parse_iw_scan(output: &str) -> Vec<ScanEntry> {
    let mut entries = Vec::new();
    let mut bssid: Option<String> = None;
    let mut ssid = String::new();
    let mut rssi: Option<f64> = None;

    fn flush(entries: &mut Vec<ScanEntry>, bssid: Option<String>, ssid: &str, rssi: Option<f64>) {
        if let (Some(bssid), Some(rssi)) = (bssid, rssi) {
            entries.push(ScanEntry {
                ssid: ssid.to_string(),
                bssid,
                rssi,
            });
        }
    }

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("BSS ") {
            flush(&mut entries, bssid.take(), &ssid, rssi.take());
            ssid.clear();
            let addr = rest
                .split(|c: char| c == '(' || c.is_whitespace())
                .next()
                .unwrap_or("");
            bssid = Some(addr.to_string());
            continue;
        }

        let line = line.trim();
        if let Some(value) = line.strip_prefix("signal:") {
            rssi = value
                .trim()
                .trim_end_matches("dBm")
                .trim()
                .parse::<f64>()
                .ok();
        } else if let Some(value) = line.strip_prefix("SSID:") {
            ssid = value.trim().to_string();
        }
    }
    flush(&mut entries, bssid, &ssid, rssi);

    entries
}

/// Plays back recorded scans, one JSON array of entries per line
pub struct ReplayScanner {
    cycles: VecDeque<Vec<ScanEntry>>,
}

impl ReplayScanner {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read scan file: {:?}", path.as_ref()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut cycles = VecDeque::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entries: Vec<ScanEntry> = serde_json::from_str(line)
                .with_context(|| format!("Invalid scan record on line {}", idx + 1))?;
            cycles.push_back(entries);
        }
        Ok(ReplayScanner { cycles })
    }

    pub fn from_cycles(cycles: Vec<Vec<ScanEntry>>) -> Self {
        ReplayScanner {
            cycles: cycles.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.cycles.len()
    }
}

impl Scanner for ReplayScanner {
    fn scan(&mut self) -> Result<Option<Vec<ScanEntry>>> {
        Ok(self.cycles.pop_front())
    }
}

/// List all wireless interfaces with their modes
pub fn list_wireless_interfaces() -> Result<Vec<(String, String)>> {
    let output = Command::new("iw")
        .args(["dev"])
        .output()
        .context("Failed to list wireless devices")?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_iw_dev(&stdout))
}

fn parse_iw_dev(output: &str) -> Vec<(String, String)> {
    let mut interfaces = Vec::new();
    let mut current_interface: Option<String> = None;
    let mut current_type = String::from("unknown");

    for line in output.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix("Interface ") {
            if let Some(iface) = current_interface.take() {
                interfaces.push((iface, current_type.clone()));
            }
            current_interface = Some(name.to_string());
            current_type = String::from("unknown");
        } else if let Some(kind) = line.strip_prefix("type ") {
            current_type = kind.to_string();
        }
    }

    if let Some(iface) = current_interface {
        interfaces.push((iface, current_type));
    }

    interfaces
}
