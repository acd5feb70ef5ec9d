use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use workflow_signal::{
    service::{EventRequest, RunRequest},
    utils::init_logging, SignalConfig, SignalError, SignalService,
};

#[derive(Parser)]
#[command(name = "workflow-signal")]
#[command(about = "Workflow telemetry and behavior scoring for coding assessments", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file; missing means defaults
    #[arg(short, long, env = "SIGNAL_CONFIG", default_value = "workflow-signal.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append events from a JSON-lines file
    Ingest { file: PathBuf },
    /// Print the report for one session
    Report { candidate_id: i64, task_id: i64 },
    /// Run a source file once without tests and record the attempt
    Run {
        candidate_id: i64,
        task_id: i64,
        file: PathBuf,
    },
    /// List every session with its score
    Overview,
    /// List the task catalogue
    Tasks {
        /// Annotate each task with this candidate's submission state
        #[arg(long)]
        candidate: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SignalConfig::load(&cli.config)?;
    init_logging(config.debug);

    info!(
        "workflow-signal using store {}",
        config.database_path.display()
    );
    let service = SignalService::open(&config).await?;

    let result = match cli.command {
        Commands::Ingest { file } => ingest(&service, file).await,
        Commands::Report {
            candidate_id,
            task_id,
        } => print_json(&service.session_report(candidate_id, task_id).await?),
        Commands::Run {
            candidate_id,
            task_id,
            file,
        } => {
            let code = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let request = RunRequest {
                candidate_id,
                task_id,
                code,
            };
            print_json(&service.run(request).await?)
        }
        Commands::Overview => print_json(&service.candidate_overview().await?),
        Commands::Tasks { candidate: None } => print_json(&service.tasks().await?),
        Commands::Tasks {
            candidate: Some(candidate_id),
        } => print_json(&service.candidate_tasks(candidate_id).await?),
    };

    service.shutdown();
    result
}

async fn ingest(service: &SignalService, file: PathBuf) -> Result<()> {
    let reader = BufReader::new(
        File::open(&file).with_context(|| format!("failed to open {}", file.display()))?,
    );

    let (mut accepted, mut rejected) = (0usize, 0usize);
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", file.display()))?;
        if line.trim().is_empty() {
            continue;
        }

        let request: EventRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                warn!("line {}: not an event request: {err}", index + 1);
                rejected += 1;
                continue;
            }
        };

        match service.ingest_event(request).await {
            Ok(_) => accepted += 1,
            Err(err @ SignalError::InvalidEvent { .. }) => {
                warn!("line {}: {err}", index + 1);
                rejected += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    info!("Ingested {accepted} events ({rejected} rejected) from {}", file.display());
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
