mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dockermatch_core::inspect::{BollardEngine, ImageInspector};
use dockermatch_core::{parse_package_command, ErrorKind, MatchConfig, MatchError, Matcher};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "dockermatch",
    version,
    about = "dockermatch — did this Dockerfile produce that container image?",
    long_about = "Compare a Dockerfile against a built image and get an explainable match report:\nan overall score, per-facet sub-scores, and the reasons behind every mismatch."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match a Dockerfile against an image and print the report
    Match {
        /// Path to the Dockerfile
        #[arg(short, long, default_value = "Dockerfile")]
        dockerfile: PathBuf,

        /// Image reference ([registry/]repo[:tag|@sha256:...])
        #[arg(short, long)]
        image: String,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Inspection deadline in seconds (including a pull on miss)
        #[arg(long)]
        timeout: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Parse a Dockerfile and print its instruction stream
    Parse {
        /// Path to the Dockerfile
        dockerfile: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Extract a package-manager invocation from a shell command
    Packages {
        /// The shell command (quoted or as trailing words)
        #[arg(required = true)]
        command: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Inspect an image and print its normalized facts
    Inspect {
        /// Image reference
        image: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Map the core error taxonomy onto exit codes.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<MatchError>().map(MatchError::kind) {
        Some(ErrorKind::InvalidInput) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Environment) | Some(ErrorKind::Transient) => 4,
        Some(ErrorKind::Cancelled) => 130,
        None => 1,
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Match {
            dockerfile,
            image,
            config,
            timeout,
            format,
        } => {
            let mut match_config = load_config(config.as_deref())?;
            if let Some(timeout) = timeout {
                match_config.inspection.timeout_secs = timeout;
            }
            match_config.validate()?;

            let dockerfile_source = std::fs::read_to_string(&dockerfile)
                .with_context(|| format!("failed to read {}", dockerfile.display()))?;

            let matcher = Matcher::connect(match_config)?;
            let cancel = cancel_on_ctrl_c();
            let report = matcher
                .match_image_with(&dockerfile_source, &image, None, cancel)
                .await?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display::print_match_report(&report, &dockerfile.display().to_string(), &image);
            }
        }

        Commands::Parse { dockerfile, format } => {
            let source = std::fs::read_to_string(&dockerfile)
                .with_context(|| format!("failed to read {}", dockerfile.display()))?;
            let analysis = dockermatch_core::parser::parse(&source)?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                display::print_instructions(&analysis);
            }
        }

        Commands::Packages { command, format } => {
            let command = command.join(" ");
            match parse_package_command(&command) {
                Some(parsed) => {
                    if format == "json" {
                        println!("{}", serde_json::to_string_pretty(&parsed)?);
                    } else {
                        display::print_package_command(&parsed);
                    }
                }
                None => println!("no package-manager invocation found"),
            }
        }

        Commands::Inspect { image, format } => {
            let config = MatchConfig::from_env()?;
            let engine = BollardEngine::connect()
                .map_err(|e| MatchError::Configuration(e.to_string()))?;
            let inspector = ImageInspector::new(
                Arc::new(engine),
                Duration::from_secs(config.inspection.timeout_secs),
            );
            let cancel = cancel_on_ctrl_c();
            let facts = inspector.inspect(&image, &cancel).await?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&*facts)?);
            } else {
                display::print_image_facts(&facts);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<MatchConfig> {
    let config = match path {
        Some(path) => MatchConfig::load(path)?,
        None => MatchConfig::from_env()?,
    };
    Ok(config)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });
    cancel
}
