mod error;
mod report;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use sift_config::Config;
use sift_library::{BatchEvent, Orchestrator, PollPolicy, Records, UploadFile, UploadPolicy};
use sift_model::RecordId;
use sift_provider::oracle::{MetaDefender, MetaDefenderConfig};
use sift_store::{Database, Repository, StoreHandle};
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sift", version, about = "Scan files with a multi-engine malware scanner and keep every verdict")]
struct Cli {
    /// Configuration file (.toml, .yaml, .yml or .json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit files for scanning and record the verdicts.
    Scan {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Principal the records belong to.
        #[arg(long)]
        owner: Option<String>,
        /// MIME type for every file, instead of guessing from the extension.
        #[arg(long)]
        mime: Option<String>,
    },
    /// Print a single scan record.
    Show {
        #[arg(value_parser = parse_id)]
        id: RecordId,
    },
    /// List scan records, most recent first.
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the scan report for a record.
    Report {
        #[arg(value_parser = parse_id)]
        id: RecordId,
    },
}

fn parse_id(value: &str) -> std::result::Result<RecordId, String> {
    value.parse::<RecordId>().map_err(|err| (*err).to_string())
}

/// MIME type for the file types accepted by default; anything else is opaque bytes.
fn guess_mime(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    init_tracing(&config.log.level);

    if let Some(parent) = config.store.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Store)?;
    }
    let db = Database::connect(&config.store.database).await.or_raise(|| ErrorKind::Store)?;
    let store: StoreHandle = Arc::new(Repository::from(&db));

    let records = Records::new(store.clone());
    let code = match cli.command {
        Command::Scan { files, owner, mime } => scan(&config, store, upload_files(files, owner, mime)).await,
        Command::Show { id } => records.get(id).await.or_raise(|| ErrorKind::Lookup).map(|record| {
            print!("{}", report::render_record(&record));
            ExitCode::SUCCESS
        }),
        Command::List { limit } => records.list(limit).await.or_raise(|| ErrorKind::Lookup).map(|listed| {
            for record in &listed {
                println!("{}", report::summary_line(record));
            }
            ExitCode::SUCCESS
        }),
        Command::Report { id } => records.get(id).await.or_raise(|| ErrorKind::Lookup).map(|record| {
            print!("{}", report::render_report(&record));
            ExitCode::SUCCESS
        }),
    };
    db.close().await;
    code
}

/// Files are only described here; each is read when the batch reaches it.
fn upload_files(files: Vec<PathBuf>, owner: Option<String>, mime: Option<String>) -> Vec<UploadFile> {
    files
        .into_iter()
        .map(|path| {
            let mime_type = mime.clone().unwrap_or_else(|| guess_mime(&path).to_string());
            let file = UploadFile::new(path, mime_type);
            match &owner {
                Some(owner) => file.with_owner(owner.as_str()),
                None => file,
            }
        })
        .collect()
}

async fn scan(config: &Config, store: StoreHandle, files: Vec<UploadFile>) -> Result<ExitCode> {
    let api_key = config.provider.api_key.clone().ok_or_raise(|| ErrorKind::MissingApiKey)?;
    let provider = MetaDefender::new(
        MetaDefenderConfig::new(api_key)
            .with_base_url(config.provider.base_url.as_str())
            .with_timeout(config.provider.request_timeout()),
    )
    .or_raise(|| ErrorKind::Provider)?;
    let orchestrator = Orchestrator::new(Arc::new(provider), store)
        .with_poll_policy(PollPolicy {
            max_attempts: config.polling.max_attempts,
            delay: config.polling.delay(),
            concurrency: config.polling.concurrency,
        })
        .with_upload_policy(UploadPolicy {
            max_size_bytes: config.uploads.max_size_bytes,
            allowed_mime_types: config.uploads.allowed_mime_types.clone(),
        })
        .record_unreachable_submissions(config.uploads.record_unreachable_submissions);

    let mut failed = 0_u64;
    let mut events = pin!(orchestrator.scan_files(files));
    while let Some(event) = events.next().await {
        match event {
            BatchEvent::Started => tracing::debug!("Batch started"),
            BatchEvent::Accepted(count) => tracing::info!(files = count, "Scanning"),
            BatchEvent::Finished { result: Ok(record), .. } => println!("{}", report::summary_line(&record)),
            BatchEvent::Finished { stored_name, result: Err(err) } => {
                failed += 1;
                match err.record() {
                    Some(id) => eprintln!("{stored_name}: {} (record #{id})", *err),
                    None => eprintln!("{stored_name}: {}", *err),
                }
                tracing::debug!(error = ?err, "Submission failed");
            },
            BatchEvent::Complete => tracing::debug!(failed, "Batch complete"),
        }
    }
    Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
