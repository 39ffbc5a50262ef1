//! Backup pipeline and retention enforcement.
//!
//! One run is strictly sequential: dump the database, optionally gzip the
//! bytes, stage them in a local temp file, upload to the remote folder,
//! then prune remote backups older than the retention cutoff.

pub mod dump;
pub mod pipeline;
pub mod retention;

pub use dump::{hostname, run_dump, DumpConfig};
pub use pipeline::{backup_filename, compress, run_backup, PipelineConfig};
pub use retention::{prune, PruneReport};
