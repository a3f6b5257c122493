use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use threshold_alarm::{build_info, HostConfig, Pipeline};
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info};

/// Threshold alarm processor: JSON lines on stdin, alarms on stdout
#[derive(Debug, Parser)]
#[command(name = "threshold-alarm", version = threshold_alarm::VERSION, about)]
struct Args {
    /// Alarm or host configuration (YAML, or JSON with a .json extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log directive when RUST_LOG is unset
    #[arg(long, default_value = threshold_alarm::DEFAULT_LOG_DIRECTIVE)]
    log_level: String,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    threshold_alarm::init(Some(&args.log_level));

    let config = match &args.config {
        Some(path) => HostConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => HostConfig::default(),
    };

    if args.print_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    info!("threshold-alarm {} starting", build_info::summary());

    let pipeline = Pipeline::new(&config).context("invalid alarm configuration")?;
    info!("Alarm: {}", pipeline.engine().settings().summary());
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    tokio::select! {
        res = pipeline.run(reader, writer) => match res {
            Ok(summary) => info!(
                "Input closed: {} lines, {} alarms, {} errors",
                summary.lines, summary.engine.emitted, summary.errors
            ),
            Err(e) => {
                error!("Pipeline error: {}", e);
                return Err(e.into());
            }
        },
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
            pipeline.engine().shutdown();
        }
    }

    let stats = pipeline.engine().stats();
    info!(
        "Final stats: {} messages, {} alarms, {} resets, uptime: {}s",
        stats.messages, stats.emitted, stats.resets, stats.uptime_secs
    );

    Ok(())
}
