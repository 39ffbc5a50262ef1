//! Database dump invocation.

use tokio::process::Command;
use tracing::debug;

use dbferry_common::{BackupScope, Error, Result};

/// Connection parameters for mysqldump.
#[derive(Debug, Clone)]
pub struct DumpConfig {
    /// MySQL user passed as `-u`.
    pub user: String,
    /// MySQL host passed as `-h`.
    pub host: String,
    /// One database or all of them.
    pub scope: BackupScope,
}

/// Run mysqldump and capture the dump bytes.
///
/// A non-zero exit is fatal for the run; stderr is carried in the error so
/// the log shows what the tool complained about. No upload is attempted
/// after a failed dump.
pub async fn run_dump(config: &DumpConfig) -> Result<Vec<u8>> {
    let mut cmd = Command::new("mysqldump");
    cmd.arg("-u").arg(&config.user).arg("-h").arg(&config.host);

    match &config.scope {
        BackupScope::AllDatabases { .. } => {
            cmd.arg("--all-databases");
        }
        BackupScope::Database(name) => {
            cmd.arg(name);
        }
    }

    debug!("Running mysqldump for {}", config.scope.label());

    let output = cmd
        .output()
        .await
        .map_err(|e| Error::Dump(format!("Failed to run mysqldump: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Dump(format!(
            "mysqldump exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// Hostname used as the scope label for host-wide dumps.
///
/// Reads the HOSTNAME environment variable with an /etc/hostname fallback;
/// "localhost" if neither yields a name.
pub fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        let name = name.trim().to_string();
        if !name.is_empty() {
            return name;
        }
    }

    std::fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_is_never_empty() {
        assert!(!hostname().is_empty());
    }

    #[tokio::test]
    async fn test_dump_failure_maps_to_dump_error() {
        let config = DumpConfig {
            user: "nosuchuser".to_string(),
            host: "localhost".to_string(),
            scope: BackupScope::Database("dbferry_definitely_missing_db".to_string()),
        };

        // Whether mysqldump is absent from PATH or rejects the connection,
        // the failure must surface in the Dump category.
        if let Err(e) = run_dump(&config).await {
            assert!(matches!(e, Error::Dump(_)));
        }
    }
}
