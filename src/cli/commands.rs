use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure for the speedwatch daemon
#[derive(Parser, Debug)]
#[command(author = "Kaipo Chen")]
#[command(version)]
#[command(about = "Speedtest monitoring daemon - periodic throughput and latency measurements")]
#[command(long_about = "Speedwatch periodically measures uplink/downlink throughput and latency against \
the nearest speedtest.net server, and recomputes both rates independently from the uplink interface \
byte counters. Configuration comes from an optional file and SPEEDTEST_* environment variables \
(SPEEDTEST_INTERFACE, SPEEDTEST_INTERVAL, SPEEDTEST_RETRY_INTERVAL, SPEEDTEST_LATITUDE, SPEEDTEST_LONGITUDE).")]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (TOML, JSON or YAML); environment variables override it
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the speedtest monitoring daemon
    #[command(long_about = "Runs a measurement cycle every interval (retry interval after a failure) \
until SIGINT or SIGTERM is received.\n\n\
Examples:\n  \
speedwatch run                              # Defaults: eth0, every 15m, retry after 5m\n  \
SPEEDTEST_INTERVAL=1h speedwatch run -v     # Hourly tests with debug logs\n  \
speedwatch -c /etc/speedwatch.toml run      # Read settings from a file")]
    Run,

    /// Run a single measurement cycle and print the health and result as JSON
    Once {
        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// List network interfaces with their cumulative byte counters
    Interfaces,
}
