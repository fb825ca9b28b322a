use crate::database::Database;
use crate::distance::distance_category;
use anyhow::Result;
use chrono::{TimeZone, Utc};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn generate_history(db: &Database, last: usize, output: Option<&Path>) -> Result<()> {
        let mut writer: Box<dyn Write> = match output {
            Some(path) => Box::new(File::create(path)?),
            None => Box::new(io::stdout()),
        };
        Self::write_history(db, last, &mut writer)
    }

    pub fn write_history<W: Write + ?Sized>(db: &Database, last: usize, writer: &mut W) -> Result<()> {
        let cycles = db.recent_cycles(last)?;

        writeln!(writer, "Recorded cycles: {} (showing {})", db.count_cycles()?, cycles.len())?;
        writeln!(writer)?;

        for cycle in cycles.iter().rev() {
            writeln!(
                writer,
                "Cycle {} at {}",
                cycle.cycle,
                format_timestamp(cycle.recorded_at)
            )?;
            for reading in &cycle.readings {
                let distance = reading
                    .distance_m
                    .map(|d| format!("{:.3} m", d))
                    .unwrap_or_else(|| "N/A".to_string());
                writeln!(
                    writer,
                    "  {:<20} {:>8.2} dBm  {:>10}{}",
                    reading.emitter,
                    reading.estimate,
                    distance,
                    if reading.observed { "" } else { "  (stale)" }
                )?;
            }
        }

        Ok(())
    }

    pub fn generate_stats(db: &Database) -> Result<()> {
        Self::write_stats(db, &mut io::stdout())
    }

    pub fn write_stats<W: Write + ?Sized>(db: &Database, writer: &mut W) -> Result<()> {
        let stats = db.emitter_stats()?;

        writeln!(writer, "========================================")?;
        writeln!(writer, "        RANGEWATCH CYCLE STATISTICS")?;
        writeln!(writer, "========================================")?;
        writeln!(writer)?;
        writeln!(writer, "Total cycles: {}", db.count_cycles()?)?;
        writeln!(writer)?;

        if stats.is_empty() {
            writeln!(writer, "No cycles recorded.")?;
            return Ok(());
        }

        for s in &stats {
            writeln!(writer, "Emitter: {}", s.emitter)?;
            writeln!(
                writer,
                "  Observed: {}/{} cycles ({:.1}%)",
                s.observed,
                s.cycles,
                s.observed_ratio() * 100.0
            )?;
            match (s.mean_distance_m, s.min_distance_m, s.max_distance_m) {
                (Some(mean), Some(min), Some(max)) => {
                    writeln!(
                        writer,
                        "  Distance: mean {:.3} m [{}], min {:.3} m, max {:.3} m",
                        mean,
                        distance_category(mean),
                        min,
                        max
                    )?;
                }
                _ => writeln!(writer, "  Distance: N/A")?,
            }
            writeln!(writer)?;
        }

        Ok(())
    }
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
