use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use friction_engine::{
    config::{Config, LogFormat},
    model::{AssessmentStatus, RespondentType},
    storage::SqliteStorage,
    AnalysisOptions, AnalysisService,
};

/// Friction analysis engine CLI.
#[derive(Parser, Debug)]
#[command(name = "friction-engine", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Analyze a unit of an assessment
    Analyze {
        /// Assessment ID
        #[arg(long)]
        assessment: String,

        /// Unit ID
        #[arg(long)]
        unit: String,

        /// Skip misalignment analysis
        #[arg(long)]
        skip_misalignment: bool,

        /// Skip substitution detection
        #[arg(long)]
        skip_substitution: bool,

        /// Skip KCC projection
        #[arg(long)]
        skip_kcc: bool,
    },

    /// Show gated field scores of a unit
    Scores {
        /// Assessment ID
        #[arg(long)]
        assessment: String,

        /// Unit ID
        #[arg(long)]
        unit: String,

        /// Restrict to one stream: employee, leader_assess, leader_self
        #[arg(long)]
        respondent: Option<RespondentType>,
    },

    /// Write the default KCC mapping and substitution rules
    SeedDefaults {
        /// Overwrite tables that already have rows
        #[arg(long)]
        force: bool,
    },

    /// Change an assessment's status
    Status {
        /// Assessment ID
        #[arg(long)]
        assessment: String,

        /// Target status: scheduled, sent, completed
        #[arg(long)]
        to: AssessmentStatus,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "Friction engine starting...");

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    let service = AnalysisService::new(storage, config.analysis.clone());

    if let Err(e) = run(&service, cli.command).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(service: &AnalysisService, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Analyze {
            assessment,
            unit,
            skip_misalignment,
            skip_substitution,
            skip_kcc,
        } => {
            let options = AnalysisOptions::default()
                .with_misalignment(!skip_misalignment)
                .with_substitution(!skip_substitution)
                .with_kcc(!skip_kcc);
            print_json(&service.analyze(&assessment, &unit, options).await?)
        }
        Command::Scores {
            assessment,
            unit,
            respondent,
        } => print_json(&service.field_scores(&assessment, &unit, respondent).await?),
        Command::SeedDefaults { force } => print_json(&service.seed_defaults(force).await?),
        Command::Status { assessment, to } => {
            print_json(&service.transition_status(&assessment, to).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
