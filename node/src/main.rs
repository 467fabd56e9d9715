//! Lachesis Node Binary

use clap::{Parser, Subcommand};
use lachesis_core::{ConsensusConfig, NodeConfig};
use lachesis_dag::Event;
use lachesis_node::{init_logging, spawn_event_logger, IngestService};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lachesis-node")]
#[command(about = "Lachesis node - aBFT ordering of DAG events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines event log and print the Atropos sequence
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,

        /// Event log, one JSON event per line
        #[arg(short, long)]
        events: PathBuf,
    },

    /// Generate a configuration with equally weighted validators
    InitConfig {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Number of validators
        #[arg(long, default_value = "4")]
        validators: u32,

        /// Weight of each validator
        #[arg(long, default_value = "1")]
        weight: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, events } => {
            let config = NodeConfig::from_file(&config)?;
            init_logging(&config.log_level);
            info!("Starting Lachesis node {}", config.name);

            let mut service = IngestService::start(config)?;
            let logger = service.take_events().map(spawn_event_logger);
            let handle = service.handle();

            let content = std::fs::read_to_string(&events)?;
            let mut submitted = 0usize;
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let event: Event = serde_json::from_str(line)
                    .map_err(|e| anyhow::anyhow!("line {}: {}", line_no + 1, e))?;
                if let Err(e) = handle.submit(event).await {
                    warn!("Line {} rejected: {}", line_no + 1, e);
                }
                submitted += 1;
            }

            let pending = handle.pending_count();
            if pending > 0 {
                warn!(
                    "{} events still wait for {} missing parents",
                    pending,
                    handle.missing_parents().len()
                );
            }
            info!(
                "Replayed {} events, {} inserted, {} frames decided",
                submitted,
                handle.len(),
                handle.atropos_sequence().len()
            );
            if !handle.cheaters().is_empty() {
                warn!("Forking validators: {:?}", handle.cheaters());
            }

            println!(
                "{}",
                serde_json::to_string_pretty(&handle.atropos_sequence())?
            );
            service.shutdown().await?;

            // Dropping the last handle drops the engine, which ends the logger
            drop(handle);
            if let Some(logger) = logger {
                let seen = logger.await?;
                info!("Logged {} consensus notifications", seen);
            }
        }

        Commands::InitConfig {
            output,
            validators,
            weight,
        } => {
            let config = NodeConfig {
                consensus: ConsensusConfig::uniform(validators, weight),
                ..NodeConfig::default()
            };
            config.validate()?;

            let json = config.to_json()?;
            std::fs::write(&output, &json)?;

            println!("Configuration saved to: {}", output.display());
        }
    }

    Ok(())
}
