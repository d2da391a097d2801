//! sourcesense CLI - PostgreSQL metadata extraction.

use clap::{Parser, Subcommand};
use sourcesense::{
    Config, EntityKind, ExtractError, Orchestrator, RawRecord, RunIdentity, TransformContext,
    Transformer,
};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "sourcesense")]
#[command(about = "PostgreSQL metadata extraction for catalog ingestion")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Timeout in seconds for graceful shutdown (default: 60)
    #[arg(long, default_value = "60")]
    shutdown_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract metadata from the configured source
    Extract {
        /// Override the steps to run (comma-separated kinds)
        #[arg(long, value_delimiter = ',')]
        steps: Option<Vec<String>>,

        /// Override the output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Override the number of concurrent steps
        #[arg(long)]
        concurrency: Option<usize>,

        /// Override the query batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override the workflow run id
        #[arg(long)]
        workflow_run_id: Option<String>,
    },

    /// Transform a JSON-lines file of raw records without a database
    Transform {
        /// Input file with one raw record per line ("-" for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Entity kind of every record (case-insensitive)
        #[arg(short, long)]
        kind: String,

        /// Connection qualified name merged into every record
        #[arg(long, default_value = "")]
        connection_qualified_name: String,

        /// Connection name merged into every record
        #[arg(long, default_value = "")]
        connection_name: String,

        /// Workflow id stamped on every entity
        #[arg(long, default_value = "sourcesense-transform")]
        workflow_id: String,

        /// Workflow run id stamped on every entity
        #[arg(long, default_value = "local")]
        workflow_run_id: String,
    },

    /// List the built-in entity kinds
    Kinds,

    /// Test the source database connection
    HealthCheck,

    /// Check which tables and schemas the configured filters select
    Preflight,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ExtractError> {
    let cli = Cli::parse();

    // Kinds needs neither logging nor a config
    if let Commands::Kinds = cli.command {
        for kind in EntityKind::builtins() {
            println!("{:<12} {}", kind, kind.partition_name());
        }
        return Ok(());
    }

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| ExtractError::Config(e.to_string()))?;

    // Transform works offline from a file
    if let Commands::Transform {
        input,
        kind,
        connection_qualified_name,
        connection_name,
        workflow_id,
        workflow_run_id,
    } = cli.command
    {
        let run = RunIdentity::new(workflow_id, workflow_run_id);
        let ctx = TransformContext::new(connection_qualified_name, connection_name);
        return transform_file(&input, &kind, &run, &ctx);
    }

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let cancel_token = setup_signal_handler(cli.shutdown_timeout).await?;

    match cli.command {
        Commands::Kinds | Commands::Transform { .. } => unreachable!(), // Handled above
        Commands::Extract {
            steps,
            output_dir,
            concurrency,
            batch_size,
            workflow_run_id,
        } => {
            // Apply overrides
            if let Some(steps) = steps {
                config.extraction.steps = steps;
            }
            if let Some(dir) = output_dir {
                config.extraction.output_dir = dir;
            }
            if let Some(c) = concurrency {
                config.extraction.concurrency = Some(c);
            }
            if let Some(size) = batch_size {
                config.extraction.batch_size = size;
            }
            if let Some(id) = workflow_run_id {
                config.workflow.workflow_run_id = Some(id);
            }
            config.validate()?;
            let config = config.with_auto_tuning();

            let orchestrator = Orchestrator::new(config).await?;

            // Running steps get shutdown_timeout to finish after a signal
            let shutdown = cancel_token.clone();
            let result = tokio::select! {
                result = orchestrator.run(Some(cancel_token)) => result,
                _ = async {
                    shutdown.cancelled().await;
                    tokio::time::sleep(Duration::from_secs(cli.shutdown_timeout)).await;
                } => Err(ExtractError::Cancelled),
            };
            orchestrator.close().await;
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nExtraction {}!", result.status);
                println!("  Run ID: {}", result.run_id);
                println!("  Workflow: {}", result.workflow_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Steps: {}/{}", result.steps_success, result.steps_total);
                for step in &result.steps {
                    println!(
                        "    {:<12} {} entities, {} skipped",
                        step.typename, step.total_record_count, step.failed_record_count
                    );
                }
                println!("  Entities: {}", result.total_record_count);
                println!("  Skipped rows: {}", result.failed_record_count);
                if !result.failed_steps.is_empty() {
                    println!("  Failed steps:");
                    for failed in &result.failed_steps {
                        println!("    {}: {}", failed.step, failed.error);
                    }
                }
            }

            if !result.is_success() {
                return Err(ExtractError::step(
                    "extract",
                    format!(
                        "{} of {} steps failed",
                        result.steps_failed, result.steps_total
                    ),
                ));
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.health_check().await?;
            orchestrator.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (PostgreSQL): {} ({}ms)",
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(ref version) = result.server_version {
                    println!("    Version: {}", version);
                }
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(ExtractError::NotConnected("Health check failed".to_string()));
            }
        }

        Commands::Preflight => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.preflight().await;
            orchestrator.close().await;
            let result = result?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Preflight Results:");
                println!("  Tables matching filters: {}", result.table_count);
                println!("  Schemas: {}", result.schemas.len());
                for schema in &result.schemas {
                    println!("    {}.{}", schema.catalog_name, schema.schema_name);
                }
                println!(
                    "\n  Overall: {}",
                    if result.is_ok() { "OK" } else { "NO TABLES SELECTED" }
                );
            }

            if !result.is_ok() {
                return Err(ExtractError::Config(
                    "Preflight failed: no tables match the configured filters".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Transform every record in a JSON-lines file, printing envelopes to stdout
/// and a summary to stderr.
fn transform_file(
    input: &Path,
    kind: &str,
    run: &RunIdentity,
    ctx: &TransformContext,
) -> Result<(), ExtractError> {
    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        Box::new(BufReader::new(std::fs::File::open(input)?))
    };

    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: RawRecord = serde_json::from_str(&line).map_err(|e| {
            ExtractError::Config(format!("{:?} line {}: invalid record: {}", input, i + 1, e))
        })?;
        records.push(record);
    }

    let transformer = Transformer::with_builtins();
    let outcome = transformer.transform_batch(kind, &records, run, ctx, None);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for envelope in &outcome.envelopes {
        writeln!(out, "{}", serde_json::to_string(envelope)?)?;
    }
    out.flush()?;

    eprintln!(
        "Transformed {} of {} records ({} skipped)",
        outcome.envelopes.len(),
        records.len(),
        outcome.skipped()
    );
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries results, so logs go to stderr
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
async fn setup_signal_handler(shutdown_timeout: u64) -> Result<CancellationToken, ExtractError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token_int = cancel_token.clone();
    tokio::spawn(async move {
        sigint.recv().await;
        eprintln!(
            "\nReceived SIGINT. Finishing running steps (timeout: {}s)...",
            shutdown_timeout
        );
        token_int.cancel();
    });

    let token_term = cancel_token.clone();
    tokio::spawn(async move {
        sigterm.recv().await;
        eprintln!(
            "\nReceived SIGTERM. Finishing running steps (timeout: {}s)...",
            shutdown_timeout
        );
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler(_shutdown_timeout: u64) -> Result<CancellationToken, ExtractError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Finishing running steps...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
