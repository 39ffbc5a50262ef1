//! dbferry - scheduled MySQL dumps to a Google Drive folder with
//! time-based retention.
//!
//! Designed to run unattended from a periodic scheduler: each invocation
//! performs at most one dump, one upload and one pruning pass, strictly in
//! that order. The first run prints a consent URL; the second run (with
//! --code) persists the credential; every run after that is hands-off.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use dbferry_auth::{AuthFlow, AuthOutcome, ClientConfig, CredentialRefresher, CredentialStore};
use dbferry_backup::{hostname, prune, run_backup, DumpConfig, PipelineConfig};
use dbferry_common::{BackupScope, Error, Result, RetentionPolicy};
use dbferry_drive::DriveClient;

/// Log file name under --log-dir.
const LOG_FILE: &str = "dbferry.log";

#[derive(Parser)]
#[command(name = "dbferry")]
#[command(about = "MySQL dumps to a Google Drive folder, with retention")]
#[command(version)]
struct Cli {
    /// Google API OAuth client ID.
    #[arg(long)]
    client_id: String,

    /// Google API OAuth client secret.
    #[arg(long)]
    client_secret: String,

    /// One-time authorization code from the consent page.
    #[arg(long)]
    code: Option<String>,

    /// Credential cache file path.
    #[arg(long, default_value = "cache.json")]
    cache_file: PathBuf,

    /// Google Drive backup folder ID.
    #[arg(long)]
    folder_id: String,

    /// MySQL user for mysqldump.
    #[arg(long)]
    db_user: String,

    /// MySQL host.
    #[arg(long, default_value = "localhost")]
    db_host: String,

    /// Database name to dump.
    #[arg(long)]
    db: Option<String>,

    /// Dump all databases on the host.
    #[arg(long)]
    dump_all: bool,

    /// Keep remote backups newer than this duration (e.g. 168h).
    #[arg(long, default_value = "168h", value_parser = humantime::parse_duration)]
    keep_last: Duration,

    /// Temp directory for staging dumps.
    #[arg(long, default_value = "/tmp")]
    tmp_dir: PathBuf,

    /// Log directory.
    #[arg(long, default_value = "/var/log")]
    log_dir: PathBuf,

    /// Gzip-compress the dump before upload.
    #[arg(long)]
    gzip: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Validate the dump scope before any side effect.
    fn scope(&self) -> Result<BackupScope> {
        match (&self.db, self.dump_all) {
            (_, true) => Ok(BackupScope::AllDatabases {
                hostname: hostname(),
            }),
            (Some(db), false) => Ok(BackupScope::Database(db.clone())),
            (None, false) => Err(Error::Config(
                "You must specify a database name (--db) or --dump-all".to_string(),
            )),
        }
    }
}

/// Append to the run log under --log-dir, falling back to stderr when the
/// log file cannot be opened.
fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let log_path = cli.log_dir.join(LOG_FILE);
    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        Err(e) => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_target(false)
                .compact()
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
            tracing::warn!(
                "Could not open log file {}: {}; logging to stderr",
                log_path.display(),
                e
            );
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let scope = cli.scope()?;

    let store = CredentialStore::new(&cli.cache_file);
    let flow = AuthFlow::new(ClientConfig::new(&cli.client_id, &cli.client_secret))?;

    let credential = match flow.resolve(&store, cli.code.as_deref()).await? {
        AuthOutcome::ConsentNeeded(url) => {
            println!("Visit this URL to get a code, then run again with --code=YOUR_CODE\n");
            println!("{}", url);
            return Ok(());
        }
        AuthOutcome::Authorized(credential) => credential,
    };

    let refresher = CredentialRefresher::new(&flow, &store);
    let credential = refresher.ensure_valid(credential).await?;

    let drive = DriveClient::new(&credential.access_token);

    info!("Dump {} to Drive start", scope);

    let pipeline = PipelineConfig {
        dump: DumpConfig {
            user: cli.db_user.clone(),
            host: cli.db_host.clone(),
            scope: scope.clone(),
        },
        folder_id: cli.folder_id.clone(),
        tmp_dir: cli.tmp_dir.clone(),
        gzip: cli.gzip,
    };

    run_backup(&pipeline, &drive).await?;

    let policy = RetentionPolicy::new(cli.keep_last)?;
    let cutoff = policy.cutoff(chrono::Utc::now());

    // The backup is already uploaded: anything that goes wrong from here
    // reports as a prune failure, not a total one.
    let report = match prune(&drive, &cli.folder_id, cutoff).await {
        Ok(report) => report,
        Err(e) => return Err(Error::Prune(format!("listing failed: {}", e))),
    };

    info!("Dump {} to Drive finish", scope);

    if !report.is_clean() {
        return Err(Error::Prune(format!(
            "{} deleted, {} failed",
            report.deleted.len(),
            report.failures.len()
        )));
    }

    Ok(())
}
