use crate::distance::DistanceModel;
use crate::emitter::EmitterId;
use crate::tracker::Snapshot;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceEntry {
    pub id: EmitterId,
    /// Filtered RSSI (dBm)
    pub estimate: f64,
    pub observed: bool,
    /// Meters, None when the model can't be evaluated
    pub distance: Option<f64>,
}

/// Everything one cycle produces, in configured emitter order
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub entries: Vec<DistanceEntry>,
}

impl CycleReport {
    pub fn from_snapshot(cycle: u64, snapshot: &Snapshot, model: &DistanceModel) -> Self {
        let entries = snapshot
            .entries()
            .iter()
            .map(|e| DistanceEntry {
                id: e.id.clone(),
                estimate: e.estimate,
                observed: e.observed,
                distance: model.distance(e.estimate),
            })
            .collect();

        CycleReport { cycle, entries }
    }

    /// Raw distances for programmatic consumers, unavailable mapped to 0
    pub fn distances(&self) -> Vec<f64> {
        self.entries.iter().map(|e| emitted_distance(e.distance)).collect()
    }

    pub fn data_line(&self) -> String {
        let distances: Vec<Option<f64>> = self.entries.iter().map(|e| e.distance).collect();
        format_data_line(&distances)
    }

    pub fn missing(&self) -> impl Iterator<Item = &EmitterId> {
        self.entries.iter().filter(|e| !e.observed).map(|e| &e.id)
    }

    /// Human-readable table of filtered RSSI and distance per emitter
    pub fn status_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- Cycle {} ---", self.cycle);
        for entry in &self.entries {
            let distance = match entry.distance {
                Some(d) => format!("{:.3}", d),
                None => "N/A".to_string(),
            };
            let _ = writeln!(
                out,
                "Emitter: {}\tFiltered RSSI: {:.2} dBm\tDistance: {}{}",
                entry.id,
                entry.estimate,
                distance,
                if entry.observed { "" } else { " (stale)" }
            );
        }
        out.push_str("----------------");
        out
    }
}

/// Clamp a distance for external emission: unavailable, negative and
/// non-finite values all become 0.
pub fn emitted_distance(distance: Option<f64>) -> f64 {
    match distance {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => 0.0,
    }
}

/// Render `DATA:<d0>,<d1>,...` with three decimals per distance
pub fn format_data_line(distances: &[Option<f64>]) -> String {
    let body = distances
        .iter()
        .map(|d| format!("{:.3}", emitted_distance(*d)))
        .collect::<Vec<_>>()
        .join(",");
    format!("DATA:{}", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::emitter::Observation;
    use crate::tracker::TrackerRegistry;

    #[test]
    fn test_format_data_line() {
        assert_eq!(
            format_data_line(&[Some(1.234), None, Some(0.5)]),
            "DATA:1.234,0.000,0.500"
        );
        assert_eq!(format_data_line(&[]), "DATA:");
    }

    #[test]
    fn test_emitted_distance_clamps() {
        assert_eq!(emitted_distance(Some(-3.0)), 0.0);
        assert_eq!(emitted_distance(Some(f64::NAN)), 0.0);
        assert_eq!(emitted_distance(Some(f64::INFINITY)), 0.0);
        assert_eq!(emitted_distance(None), 0.0);
        assert_eq!(emitted_distance(Some(2.5)), 2.5);
    }

    #[test]
    fn test_report_from_snapshot() {
        let ids = vec![EmitterId::from("A"), EmitterId::from("B")];
        let mut tracker = TrackerRegistry::new(ids, &FilterConfig::default());
        let snap = tracker.update_cycle(&[Observation::new("A", -45.0)]);
        let model = DistanceModel::new(-45.0, 2.5);

        let report = CycleReport::from_snapshot(7, &snap, &model);
        assert_eq!(report.cycle, 7);
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.missing().collect::<Vec<_>>(), vec![&EmitterId::from("B")]);

        // B still sits at the -60 dBm seed: 10^(15/25)
        let expected_b = 10.0_f64.powf(0.6);
        assert!((report.distances()[1] - expected_b).abs() < 1e-9);
        assert!(report.data_line().starts_with("DATA:"));
        assert_eq!(report.data_line().split(',').count(), 2);
    }

    #[test]
    fn test_status_table_marks_unavailable() {
        let report = CycleReport {
            cycle: 1,
            entries: vec![DistanceEntry {
                id: EmitterId::from("A"),
                estimate: 0.0,
                observed: false,
                distance: None,
            }],
        };
        let table = report.status_table();
        assert!(table.contains("Distance: N/A (stale)"));
        assert!(table.contains("Filtered RSSI: 0.00 dBm"));
    }
}
