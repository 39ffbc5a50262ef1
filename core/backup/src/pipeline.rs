//! Dump, compress, stage and upload.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;
use tracing::info;

use dbferry_common::{BackupScope, Error, RemoteStore, Result};

use crate::dump::{run_dump, DumpConfig};

/// Content type for plain SQL dumps.
const SQL_MIME: &str = "text/plain";
/// Content type for gzip-compressed dumps.
const GZIP_MIME: &str = "application/gzip";

/// Settings for one backup run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dump: DumpConfig,
    /// Remote folder the backup lands in.
    pub folder_id: String,
    /// Directory for the local staging file.
    pub tmp_dir: PathBuf,
    /// Gzip the dump before staging.
    pub gzip: bool,
}

/// Build the backup filename and matching content type.
///
/// The name is `{scope-label}_{RFC3339 timestamp}.sql`, with a `.gz` suffix
/// when compression is on.
pub fn backup_filename(
    scope: &BackupScope,
    timestamp: DateTime<Utc>,
    gzip: bool,
) -> (String, &'static str) {
    let stamp = timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut name = format!("{}_{}.sql", scope.label(), stamp);

    if gzip {
        name.push_str(".gz");
        (name, GZIP_MIME)
    } else {
        (name, SQL_MIME)
    }
}

/// Gzip-compress dump output in memory.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish().map_err(Error::Io)
}

/// Run one backup: dump, optionally compress, stage in a local temp file,
/// upload. Returns the remote id of the uploaded backup.
pub async fn run_backup(config: &PipelineConfig, store: &dyn RemoteStore) -> Result<String> {
    let (filename, mime_type) = backup_filename(&config.dump.scope, Utc::now(), config.gzip);

    let mut data = run_dump(&config.dump).await?;
    if config.gzip {
        data = compress(&data)?;
    }

    stage_and_upload(config, &filename, mime_type, &data, store).await
}

/// Stage the dump bytes in a local temp file and upload from it.
///
/// The staging file is a `NamedTempFile` guard, so it is removed on every
/// exit path, including upload failure.
async fn stage_and_upload(
    config: &PipelineConfig,
    filename: &str,
    mime_type: &str,
    data: &[u8],
    store: &dyn RemoteStore,
) -> Result<String> {
    let mut staged = NamedTempFile::new_in(&config.tmp_dir)?;
    staged.write_all(data)?;
    staged.flush()?;

    let payload = tokio::fs::read(staged.path()).await?;
    let uploaded = store
        .upload(filename, &config.folder_id, mime_type, payload)
        .await?;

    info!("Created: id={}, name={}", uploaded.id, uploaded.name);

    Ok(uploaded.id)
}
