mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Commands};
use log::info;
use serde_json::json;
use std::sync::Arc;

use speedwatch::collectors::{InterfaceCounterReader, SysinfoCounterReader};
use speedwatch::component::{MeasurementScheduler, Supervisor};
use speedwatch::config::Config;
use speedwatch::formatting::format_bytes;
use speedwatch::handlers;
use speedwatch::speedtest::{SpeedtestNetProvider, ThroughputProber};
use speedwatch::store::ResultStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = Config::load(cli.config_file.as_deref())
        .context("unable to load the configuration")?;

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Once { pretty } => once(config, pretty).await,
        Commands::Interfaces => interfaces(&config),
    }
}

fn build_prober(config: &Config) -> Result<ThroughputProber> {
    let provider = SpeedtestNetProvider::new(config.location)
        .context("unable to initialize the speedtest provider")?;
    Ok(ThroughputProber::new(
        config.interface.clone(),
        Arc::new(SysinfoCounterReader::new()),
        Arc::new(provider),
    ))
}

async fn run(config: Config) -> Result<()> {
    let scheduler = MeasurementScheduler::new(
        &config,
        build_prober(&config)?,
        Arc::new(ResultStore::new()),
    );

    let mut supervisor = Supervisor::new();
    supervisor.forward_os_signals();
    supervisor.start(Arc::new(scheduler));

    let failed: Vec<String> = supervisor
        .wait()
        .await
        .into_iter()
        .filter(|(_, outcome)| outcome.is_failure())
        .map(|(name, outcome)| format!("{}: {}", name, outcome))
        .collect();

    if !failed.is_empty() {
        bail!("{}", failed.join("; "));
    }

    info!("shutdown complete");
    Ok(())
}

async fn once(config: Config, pretty: bool) -> Result<()> {
    let prober = build_prober(&config)?;
    prober
        .read_counters()
        .with_context(|| format!("unable to use the {:?} network interface", config.interface))?;

    let store = ResultStore::new();
    let outcome = prober.run().await;
    match &outcome {
        Ok(result) => store.publish_success(result.clone()),
        Err(e) => store.publish_failure(e),
    }

    let body = json!({
        "health": handlers::health(&store),
        "result": handlers::latest_result(&store).result,
    });
    let output = if pretty {
        serde_json::to_string_pretty(&body)?
    } else {
        serde_json::to_string(&body)?
    };
    println!("{}", output);

    outcome.map(|_| ()).context("the speedtest cycle has failed")
}

fn interfaces(config: &Config) -> Result<()> {
    let interfaces = SysinfoCounterReader::new().list()?;

    println!("Network Interfaces");
    println!("==================");

    for (name, counters) in interfaces {
        let marker = if name == config.interface { "*" } else { " " };
        println!("\n{} {}", marker, name);
        println!("  Received: {}", format_bytes(counters.bytes_received as f64));
        println!("  Sent: {}", format_bytes(counters.bytes_sent as f64));
    }

    println!("\n* configured speedtest interface");
    Ok(())
}
