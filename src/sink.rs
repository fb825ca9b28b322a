use crate::config::OutputConfig;
use crate::database::Database;
use crate::output::CycleReport;
use anyhow::{Context, Result};
use log::{debug, info};
use std::io::{self, Write};
use std::net::UdpSocket;

/// Destination for each cycle's output
pub trait Sink {
    fn name(&self) -> &str;
    fn emit(&mut self, report: &CycleReport) -> Result<()>;
}

/// Writes the DATA line, optionally preceded by the status table
pub struct ConsoleSink {
    writer: Box<dyn Write + Send>,
    show_status: bool,
}

impl ConsoleSink {
    pub fn stdout(show_status: bool) -> Self {
        Self::new(Box::new(io::stdout()), show_status)
    }

    pub fn new(writer: Box<dyn Write + Send>, show_status: bool) -> Self {
        ConsoleSink {
            writer,
            show_status,
        }
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn emit(&mut self, report: &CycleReport) -> Result<()> {
        if self.show_status {
            writeln!(self.writer, "{}", report.status_table())?;
        }
        writeln!(self.writer, "{}", report.data_line())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Sends the DATA line as one datagram per cycle
pub struct UdpSink {
    socket: UdpSocket,
    target: String,
}

impl UdpSink {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind UDP socket")?;
        let target = format!("{}:{}", host, port);
        info!("Sending cycle data to udp://{}", target);
        Ok(UdpSink { socket, target })
    }
}

impl Sink for UdpSink {
    fn name(&self) -> &str {
        "udp"
    }

    fn emit(&mut self, report: &CycleReport) -> Result<()> {
        let line = report.data_line();
        self.socket
            .send_to(line.as_bytes(), &self.target)
            .with_context(|| format!("Failed to send to {}", self.target))?;
        debug!("Sent {} bytes to {}", line.len(), self.target);
        Ok(())
    }
}

/// Records every cycle in the SQLite log
pub struct DatabaseSink {
    db: Database,
}

impl DatabaseSink {
    pub fn new(db: Database) -> Self {
        DatabaseSink { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl Sink for DatabaseSink {
    fn name(&self) -> &str {
        "database"
    }

    fn emit(&mut self, report: &CycleReport) -> Result<()> {
        self.db.insert_cycle(report)?;
        Ok(())
    }
}

/// Build the sinks enabled in `config`
pub fn build_sinks(config: &OutputConfig, show_status: bool) -> Result<Vec<Box<dyn Sink + Send>>> {
    let mut sinks: Vec<Box<dyn Sink + Send>> = Vec::new();

    if config.console {
        sinks.push(Box::new(ConsoleSink::stdout(show_status)));
    }
    if config.udp.enabled {
        sinks.push(Box::new(UdpSink::new(&config.udp.host, config.udp.port)?));
    }
    if let Some(path) = &config.database {
        let db = Database::open(path).context("Failed to open cycle database")?;
        sinks.push(Box::new(DatabaseSink::new(db)));
    }

    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UdpConfig;
    use crate::emitter::EmitterId;
    use crate::output::DistanceEntry;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn report() -> CycleReport {
        CycleReport {
            cycle: 1,
            entries: vec![
                DistanceEntry {
                    id: EmitterId::from("A"),
                    estimate: -45.0,
                    observed: true,
                    distance: Some(1.0),
                },
                DistanceEntry {
                    id: EmitterId::from("B"),
                    estimate: 0.0,
                    observed: false,
                    distance: None,
                },
            ],
        }
    }

    #[test]
    fn test_console_sink_writes_data_line() {
        let buf = SharedBuf::default();
        let mut sink = ConsoleSink::new(Box::new(buf.clone()), false);
        sink.emit(&report()).unwrap();

        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "DATA:1.000,0.000\n");
    }

    #[test]
    fn test_console_sink_with_status() {
        let buf = SharedBuf::default();
        let mut sink = ConsoleSink::new(Box::new(buf.clone()), true);
        sink.emit(&report()).unwrap();

        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(written.contains("Emitter: B"));
        assert!(written.ends_with("DATA:1.000,0.000\n"));
    }

    #[test]
    fn test_udp_sink_sends_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut sink = UdpSink::new("127.0.0.1", port).unwrap();
        sink.emit(&report()).unwrap();

        let mut buf = [0u8; 128];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"DATA:1.000,0.000");
    }

    #[test]
    fn test_database_sink_records() {
        let mut sink = DatabaseSink::new(Database::open_in_memory().unwrap());
        sink.emit(&report()).unwrap();
        sink.emit(&report()).unwrap();
        assert_eq!(sink.database().count_cycles().unwrap(), 2);
    }

    #[test]
    fn test_build_sinks() {
        let config = OutputConfig {
            console: false,
            udp: UdpConfig::default(),
            database: None,
        };
        assert!(build_sinks(&config, false).unwrap().is_empty());

        let config = OutputConfig {
            console: true,
            udp: UdpConfig {
                enabled: true,
                host: "127.0.0.1".to_string(),
                port: 4210,
            },
            database: None,
        };
        let names: Vec<String> = build_sinks(&config, false)
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["console", "udp"]);
    }
}
