use crate::config::{Config, MatchBy};
use crate::distance::DistanceModel;
use crate::emitter::{EmitterId, Observation};
use crate::output::CycleReport;
use crate::scanner::{to_observations, ScanEntry, Scanner};
use crate::sink::Sink;
use crate::tracker::TrackerRegistry;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy)]
pub struct LoopOptions {
    /// Pause between cycles
    pub interval: Duration,
    /// Stop after this many cycles, run until stopped when None
    pub max_cycles: Option<u64>,
}

/// Drives scan → filter → distance cycles
pub struct CycleRunner {
    registry: TrackerRegistry,
    model: DistanceModel,
    match_by: MatchBy,
    cycle: u64,
}

impl CycleRunner {
    pub fn new(registry: TrackerRegistry, model: DistanceModel, match_by: MatchBy) -> Self {
        CycleRunner {
            registry,
            model,
            match_by,
            cycle: 0,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let match_by = config.emitters.match_by;
        let identities = config
            .emitters
            .identities
            .iter()
            .map(|raw| {
                EmitterId::parse(raw, match_by)
                    .with_context(|| format!("Invalid emitter identity: {:?}", raw))
            })
            .collect::<Result<Vec<_>>>()?;

        let registry = TrackerRegistry::new(identities, &config.filter);
        let model = DistanceModel::from_config(&config.distance);
        Ok(Self::new(registry, model, match_by))
    }

    pub fn registry(&self) -> &TrackerRegistry {
        &self.registry
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycle
    }

    /// Run one cycle over already-keyed observations
    pub fn run_cycle(&mut self, observations: &[Observation]) -> CycleReport {
        self.cycle += 1;
        let snapshot = self.registry.update_cycle(observations);
        CycleReport::from_snapshot(self.cycle, &snapshot, &self.model)
    }

    /// Run one cycle over a raw scan
    pub fn process_scan(&mut self, entries: &[ScanEntry]) -> CycleReport {
        let observations = to_observations(entries, self.match_by);
        debug!(
            "Cycle {}: {} networks, {} candidate observations",
            self.cycle + 1,
            entries.len(),
            observations.len()
        );
        self.run_cycle(&observations)
    }

    /// Repeat cycles until stopped, the scanner runs dry or `max_cycles` is hit.
    /// Returns the number of cycles run by this call.
    pub async fn run(
        &mut self,
        scanner: &mut dyn Scanner,
        sinks: &mut [Box<dyn Sink + Send>],
        options: LoopOptions,
        running: Arc<AtomicBool>,
    ) -> Result<u64> {
        let mut completed = 0u64;

        info!(
            "Tracking {} emitters, interval {}ms. Press Ctrl+C to stop.",
            self.registry.len(),
            options.interval.as_millis()
        );

        while running.load(Ordering::SeqCst)
            && options.max_cycles.map_or(true, |max| completed < max)
        {
            // `iw` and file reads block; keep them off the reactor
            let scanned = tokio::task::block_in_place(|| scanner.scan());
            let entries = match scanned {
                Ok(Some(entries)) => entries,
                Ok(None) => {
                    info!("Scan source exhausted");
                    break;
                }
                Err(e) => {
                    warn!("Scan failed, treating as empty: {:#}", e);
                    Vec::new()
                }
            };

            let report = self.process_scan(&entries);
            tokio::task::block_in_place(|| {
                for sink in sinks.iter_mut() {
                    if let Err(e) = sink.emit(&report) {
                        error!("Sink {} failed: {:#}", sink.name(), e);
                    }
                }
            });
            completed += 1;

            let more = options.max_cycles.map_or(true, |max| completed < max);
            if more && !options.interval.is_zero() {
                sleep(options.interval).await;
            }
        }

        info!("Tracking stopped after {} cycles", completed);
        Ok(completed)
    }
}
