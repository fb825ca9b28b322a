use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use rangewatch::config::Config;
use rangewatch::cycle::{CycleRunner, LoopOptions};
use rangewatch::database::Database;
use rangewatch::distance::{distance_category, format_distance, to_distance};
use rangewatch::report::ReportGenerator;
use rangewatch::scanner::{list_wireless_interfaces, IwScanner, ReplayScanner, Scanner};
use rangewatch::sink::build_sinks;
use rangewatch::validation::{validate_config, validate_interface};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rangewatch")]
#[command(author = "spikehead")]
#[command(version = "0.1.0")]
#[command(about = "Filtered RSSI distance tracker for a fixed set of Wi-Fi emitters")]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Cycle database (overrides config)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Verbose output, including a status table every cycle
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan live and emit distances every cycle
    Run {
        /// Wi-Fi interface (overrides config)
        #[arg(short, long)]
        interface: Option<String>,

        /// Stop after N cycles
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Run the tracker over a recorded scan file (one JSON array per line)
    Replay {
        /// Scan file
        file: PathBuf,

        /// Stop after N cycles
        #[arg(long)]
        cycles: Option<u64>,

        /// Keep the configured delay between cycles
        #[arg(long)]
        realtime: bool,
    },

    /// Convert one RSSI value to a distance
    Distance {
        /// Signal strength in dBm
        #[arg(long, allow_negative_numbers = true)]
        rssi: f64,

        /// Reference signal at 1 meter (overrides config)
        #[arg(long, allow_negative_numbers = true)]
        tx_power: Option<f64>,

        /// Path loss exponent (overrides config)
        #[arg(long)]
        exponent: Option<f64>,
    },

    /// List wireless interfaces
    Interfaces,

    /// Write the default configuration
    Init,

    /// Show recently recorded cycles
    History {
        /// Number of cycles to show
        #[arg(long, default_value = "10")]
        last: usize,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show per-emitter statistics from the cycle database
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_secs()
        .init();

    // Handle init command before loading config
    if matches!(cli.command, Commands::Init) {
        return handle_init(&cli.config);
    }

    // Load configuration
    let mut config = if cli.config.exists() {
        Config::load(&cli.config).context("Failed to load config")?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    // Override config with CLI args
    if let Some(database) = cli.database {
        config.output.database = Some(database.to_string_lossy().to_string());
    }

    match cli.command {
        Commands::Run { interface, cycles } => {
            if let Some(interface) = interface {
                config.scan.interface = interface;
            }
            handle_run(config, cycles, cli.verbose).await
        }
        Commands::Replay {
            file,
            cycles,
            realtime,
        } => handle_replay(config, file, cycles, realtime, cli.verbose).await,
        Commands::Distance {
            rssi,
            tx_power,
            exponent,
        } => handle_distance(&config, rssi, tx_power, exponent),
        Commands::Interfaces => handle_interfaces(),
        Commands::Init => unreachable!(),
        Commands::History { last, output } => {
            let db = open_database(&config)?;
            ReportGenerator::generate_history(&db, last, output.as_deref())
        }
        Commands::Stats => {
            let db = open_database(&config)?;
            ReportGenerator::generate_stats(&db)
        }
    }
}

async fn handle_run(config: Config, cycles: Option<u64>, verbose: bool) -> Result<()> {
    validate_config(&config)?;
    validate_interface(&config.scan.interface)?;

    let mut scanner = IwScanner::new(config.scan.interface.clone());
    let options = LoopOptions {
        interval: Duration::from_millis(config.cycle.interval_ms),
        max_cycles: cycles,
    };
    run_loop(&config, &mut scanner, options, verbose).await
}

async fn handle_replay(
    config: Config,
    file: PathBuf,
    cycles: Option<u64>,
    realtime: bool,
    verbose: bool,
) -> Result<()> {
    validate_config(&config)?;

    let mut scanner = ReplayScanner::open(&file)?;
    info!("Replaying {} recorded scans from {:?}", scanner.remaining(), file);

    let interval = if realtime {
        Duration::from_millis(config.cycle.interval_ms)
    } else {
        Duration::ZERO
    };
    let options = LoopOptions {
        interval,
        max_cycles: cycles,
    };
    run_loop(&config, &mut scanner, options, verbose).await
}

async fn run_loop(
    config: &Config,
    scanner: &mut dyn Scanner,
    options: LoopOptions,
    verbose: bool,
) -> Result<()> {
    let mut runner = CycleRunner::from_config(config)?;
    let mut sinks = build_sinks(&config.output, verbose)?;

    // Set up shared running flag for signal handling
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, stopping after this cycle...");
        r.store(false, Ordering::SeqCst);
    })?;

    runner.run(scanner, &mut sinks, options, running).await?;
    Ok(())
}

fn handle_distance(
    config: &Config,
    rssi: f64,
    tx_power: Option<f64>,
    exponent: Option<f64>,
) -> Result<()> {
    let tx_power = tx_power.unwrap_or(config.distance.tx_power_dbm);
    let exponent = exponent.unwrap_or(config.distance.path_loss_exponent);

    match to_distance(rssi, tx_power, exponent) {
        Some(d) => println!(
            "{:.3} m ~{} ({})",
            d,
            format_distance(Some(d)),
            distance_category(d)
        ),
        None => println!("N/A"),
    }
    Ok(())
}

fn handle_interfaces() -> Result<()> {
    let interfaces = list_wireless_interfaces()?;

    if interfaces.is_empty() {
        println!("No wireless interfaces found.");
        return Ok(());
    }

    for (iface, mode) in &interfaces {
        println!("[{}] {}", mode, iface);
    }
    Ok(())
}

fn handle_init(path: &Path) -> Result<()> {
    info!("Initializing rangewatch configuration...");

    let config = Config::default();
    config.save(path)?;
    info!("Created {:?}", path);
    info!("Edit the emitter list and calibration, then run 'rangewatch run -i <interface>'.");

    Ok(())
}

fn open_database(config: &Config) -> Result<Database> {
    let path = config
        .output
        .database
        .as_deref()
        .context("No cycle database configured; set output.database or pass --database")?;
    Database::open(path).context("Failed to open database")
}
