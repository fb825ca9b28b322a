use crate::config::{FilterConfig, PredictionPolicy};
use crate::emitter::{EmitterId, Observation};
use crate::filter::{FilterState, NoiseFilter};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};

/// Owns one filter per known emitter and applies scan cycles to them.
///
/// The identity set and its order are fixed at construction. Filter state is
/// only ever mutated through `update_cycle`.
pub struct TrackerRegistry {
    order: Vec<EmitterId>,
    filters: HashMap<EmitterId, FilterState>,
    prediction: PredictionPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimateEntry {
    pub id: EmitterId,
    /// Filtered RSSI (dBm)
    pub estimate: f64,
    /// Whether a valid observation fed the filter this cycle
    pub observed: bool,
}

/// Estimates for every known emitter after one cycle, in configured order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    entries: Vec<EstimateEntry>,
}

impl Snapshot {
    pub fn entries(&self) -> &[EstimateEntry] {
        &self.entries
    }

    pub fn get(&self, id: &EmitterId) -> Option<f64> {
        self.entries.iter().find(|e| &e.id == id).map(|e| e.estimate)
    }

    pub fn estimates(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.estimate).collect()
    }

    pub fn observed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.observed).count()
    }

    pub fn to_map(&self) -> BTreeMap<EmitterId, f64> {
        self.entries
            .iter()
            .map(|e| (e.id.clone(), e.estimate))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TrackerRegistry {
    /// Build a registry with every filter seeded from `config`.
    /// Repeated identities are tracked once, at their first position.
    pub fn new(identities: Vec<EmitterId>, config: &FilterConfig) -> Self {
        let mut order = Vec::with_capacity(identities.len());
        let mut filters = HashMap::with_capacity(identities.len());

        for id in identities {
            if filters.contains_key(&id) {
                warn!("Duplicate emitter identity '{}' ignored", id);
                continue;
            }
            filters.insert(id.clone(), FilterState::from_config(config));
            order.push(id);
        }

        TrackerRegistry {
            order,
            filters,
            prediction: config.prediction,
        }
    }

    pub fn identities(&self) -> &[EmitterId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn filter(&self, id: &EmitterId) -> Option<&FilterState> {
        self.filters.get(id)
    }

    /// Apply one cycle of observations and return estimates for all emitters.
    ///
    /// For each known emitter the first valid observation with its identity
    /// is used; later duplicates and unknown identities are ignored. Emitters
    /// without an observation keep their previous estimate.
    pub fn update_cycle(&mut self, observations: &[Observation]) -> Snapshot {
        let mut entries = Vec::with_capacity(self.order.len());

        for id in &self.order {
            let Some(filter) = self.filters.get_mut(id) else {
                continue;
            };

            let reading = observations.iter().find(|o| o.valid && &o.id == id);

            if self.prediction == PredictionPolicy::EveryCycle {
                filter.predict();
            }

            let (estimate, observed) = match reading {
                Some(obs) => {
                    let estimate = match self.prediction {
                        PredictionPolicy::OnObservation => filter.update(obs.rssi),
                        PredictionPolicy::EveryCycle => filter.correct(obs.rssi),
                    };
                    debug!("Emitter '{}': rssi={} filtered={:.2}", id, obs.rssi, estimate);
                    (estimate, true)
                }
                None => {
                    info!("Emitter '{}' not found. Retaining previous estimate.", id);
                    (filter.current_estimate(), false)
                }
            };

            entries.push(EstimateEntry {
                id: id.clone(),
                estimate,
                observed,
            });
        }

        Snapshot { entries }
    }

    /// Current estimates without touching filter state
    pub fn snapshot(&self) -> Snapshot {
        let entries = self
            .order
            .iter()
            .filter_map(|id| {
                self.filters.get(id).map(|f| EstimateEntry {
                    id: id.clone(),
                    estimate: f.current_estimate(),
                    observed: false,
                })
            })
            .collect();
        Snapshot { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterKind;

    fn ids(labels: &[&str]) -> Vec<EmitterId> {
        labels.iter().map(|l| EmitterId::from(*l)).collect()
    }

    fn registry(config: &FilterConfig) -> TrackerRegistry {
        TrackerRegistry::new(ids(&["A", "B", "C"]), config)
    }

    #[test]
    fn test_seeded_estimates() {
        let tracker = registry(&FilterConfig::default());
        let snap = tracker.snapshot();
        assert_eq!(snap.estimates(), vec![-60.0, -60.0, -60.0]);
        assert_eq!(snap.observed_count(), 0);
    }

    #[test]
    fn test_partial_cycle_retains_missing() {
        let mut tracker = registry(&FilterConfig::default());
        let snap = tracker.update_cycle(&[
            Observation::new("A", -50.0),
            Observation::new("C", -70.0),
        ]);

        assert_eq!(snap.len(), 3);
        assert!(snap.get(&"A".into()).unwrap() > -60.0);
        assert_eq!(snap.get(&"B".into()), Some(-60.0));
        assert!(snap.get(&"C".into()).unwrap() < -60.0);
        assert_eq!(
            snap.entries().iter().map(|e| e.observed).collect::<Vec<_>>(),
            vec![true, false, true]
        );

        match tracker.filter(&"B".into()) {
            Some(FilterState::Recursive(f)) => assert_eq!(f.error_estimate(), 1.0),
            other => panic!("unexpected filter: {:?}", other),
        }
    }

    #[test]
    fn test_empty_cycle_is_idempotent() {
        let mut tracker = registry(&FilterConfig::default());
        let first = tracker.update_cycle(&[Observation::new("B", -48.0)]);
        let second = tracker.update_cycle(&[]);
        let third = tracker.update_cycle(&[]);

        assert_eq!(first.to_map(), second.to_map());
        assert_eq!(second, third);
    }

    #[test]
    fn test_first_match_wins() {
        let mut tracker = registry(&FilterConfig::default());
        let mut reference = registry(&FilterConfig::default());

        let snap = tracker.update_cycle(&[
            Observation::new("A", -40.0),
            Observation::new("A", -90.0),
        ]);
        let expected = reference.update_cycle(&[Observation::new("A", -40.0)]);
        assert_eq!(snap, expected);
    }

    #[test]
    fn test_invalid_and_unknown_observations_ignored() {
        let mut tracker = registry(&FilterConfig::default());
        let snap = tracker.update_cycle(&[
            Observation::missing("A"),
            Observation::new("A", -45.0),
            Observation::new("Z", -30.0),
        ]);

        assert_eq!(snap.len(), 3);
        assert!(snap.get(&"Z".into()).is_none());
        // invalid entry skipped, the valid one after it is used
        assert!(snap.entries()[0].observed);
    }

    #[test]
    fn test_duplicate_identities_tracked_once() {
        let tracker = TrackerRegistry::new(ids(&["A", "B", "A"]), &FilterConfig::default());
        assert_eq!(tracker.identities(), &ids(&["A", "B"])[..]);
    }

    #[test]
    fn test_every_cycle_prediction_inflates_missing() {
        let config = FilterConfig {
            prediction: PredictionPolicy::EveryCycle,
            ..FilterConfig::default()
        };
        let mut tracker = registry(&config);
        let mut reference = registry(&FilterConfig::default());

        let snap = tracker.update_cycle(&[Observation::new("A", -50.0)]);
        let expected = reference.update_cycle(&[Observation::new("A", -50.0)]);
        // observed emitters behave like predict + correct
        assert_eq!(snap.get(&"A".into()), expected.get(&"A".into()));
        assert_eq!(snap.get(&"B".into()), Some(-60.0));

        match tracker.filter(&"B".into()) {
            Some(FilterState::Recursive(f)) => assert!((f.error_estimate() - 1.125).abs() < 1e-12),
            other => panic!("unexpected filter: {:?}", other),
        }
    }

    #[test]
    fn test_window_registry_unobserved_is_zero() {
        let config = FilterConfig {
            kind: FilterKind::Window,
            window_size: 3,
            ..FilterConfig::default()
        };
        let mut tracker = registry(&config);
        tracker.update_cycle(&[Observation::new("A", -50.0)]);
        let snap = tracker.update_cycle(&[Observation::new("A", -60.0)]);

        assert_eq!(snap.get(&"A".into()), Some(-55.0));
        assert_eq!(snap.get(&"B".into()), Some(0.0));
    }
}
