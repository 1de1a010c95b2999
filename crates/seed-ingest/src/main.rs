//! Campus seed - ingestion and synthetic load tool

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use seed_common::logging::{init_logging, ConsoleStream, LogConfig, LogLevel};
use seed_ingest::config::{CourseSelection, IngestConfig, SourceKind};
use seed_ingest::dispatch::Dispatcher;
use seed_ingest::orchestrator::BatchOrchestrator;
use seed_ingest::pagination::PaginatedFetcher;
use seed_ingest::progress::{ConsoleProgress, LogProgress, ProgressObserver};
use seed_ingest::schema::EntityKind;
use seed_ingest::storage::{BlobStore, LocalBlobStore, S3BlobStore, StorageConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "seed-ingest")]
#[command(author, version, about = "Seed the campus services and generate enrollment load")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest tabular sources, then dispatch synthetic enrollments
    Run {
        /// Do not ingest students.csv; list existing students instead
        #[arg(long)]
        skip_students: bool,

        /// Number of synthetic enrollments
        #[arg(long, value_name = "N")]
        enrollments: Option<usize>,

        /// Where tabular sources are read from (s3, local)
        #[arg(long)]
        source: Option<SourceKind>,

        /// Directory of tabular sources when reading locally
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// How enrollments pick courses (known, range)
        #[arg(long)]
        course_policy: Option<CourseSelection>,

        /// Seed for reproducible synthetic data
        #[arg(long)]
        seed: Option<u64>,

        /// Copy processed sources to dated archive keys
        #[arg(long)]
        archive: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print how many entities a service currently lists
    FetchIds {
        /// students, instructors, courses or enrollments
        entity: EntityKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Summary JSON owns stdout
    let console_stream = if matches!(cli.command, Command::Run { json: true, .. }) {
        ConsoleStream::Stderr
    } else {
        ConsoleStream::Stdout
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .console_stream(console_stream)
        .log_file_prefix("seed-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let mut config = IngestConfig::from_env().context("Invalid ingestion configuration")?;

    match cli.command {
        Command::Run {
            skip_students,
            enrollments,
            source,
            source_dir,
            course_policy,
            seed,
            archive,
            json,
        } => {
            config.skip_students |= skip_students;
            config.archive |= archive;
            if let Some(count) = enrollments {
                config.enrollment_count = count;
            }
            if let Some(source) = source {
                config.source = source;
            }
            if let Some(dir) = source_dir {
                config.source_dir = dir;
            }
            if let Some(policy) = course_policy {
                config.course_selection = policy;
            }
            if seed.is_some() {
                config.rng_seed = seed;
            }
            config.validate()?;

            run(config, json).await
        },
        Command::FetchIds { entity } => {
            let dispatcher = Dispatcher::from_config(&config)?;
            let fetcher = PaginatedFetcher::new(&dispatcher, config.page_size);
            let ids = fetcher
                .fetch_all_ids(config.endpoints.for_entity(entity))
                .await;

            println!("{}: {} ids", entity, ids.len());
            Ok(())
        },
    }
}

async fn run(config: IngestConfig, json: bool) -> Result<()> {
    let store: Arc<dyn BlobStore> = match config.source {
        SourceKind::S3 => Arc::new(S3BlobStore::new(StorageConfig::from_env()).await),
        SourceKind::Local => Arc::new(LocalBlobStore::new(&config.source_dir)),
    };

    let progress: Arc<dyn ProgressObserver> = if std::io::stderr().is_terminal() {
        Arc::new(ConsoleProgress::new("Synthetic enrollments"))
    } else {
        Arc::new(LogProgress::new("enrollments"))
    };

    let dispatcher = Dispatcher::from_config(&config)?;
    let orchestrator = BatchOrchestrator::new(config, dispatcher, store).with_progress(progress);

    let summary = orchestrator.run().await;

    for report in &summary.reports {
        info!(
            entity = %report.entity,
            submitted = report.submitted,
            succeeded = report.succeeded(),
            failed = report.failed,
            "Pass summary"
        );
    }

    if json {
        summary.write_json(std::io::stdout().lock())?;
    }

    info!(run_id = %summary.run_id, "Seeding complete");
    Ok(())
}
