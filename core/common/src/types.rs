//! Domain types used throughout dbferry.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// What a single run dumps: one named database, or every database on the
/// host (labelled with the hostname).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupScope {
    /// Dump a single database.
    Database(String),
    /// Dump all databases on the host.
    AllDatabases {
        /// Hostname used as the filename prefix for host-wide dumps.
        hostname: String,
    },
}

impl BackupScope {
    /// Label used as the backup filename prefix and in log markers.
    pub fn label(&self) -> &str {
        match self {
            BackupScope::Database(name) => name,
            BackupScope::AllDatabases { hostname } => hostname,
        }
    }
}

impl fmt::Display for BackupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Time-based retention over remote backups.
///
/// No state is persisted; the cutoff is recomputed on every run.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    max_age: Duration,
}

impl RetentionPolicy {
    /// Create a policy keeping backups newer than `max_age`.
    ///
    /// # Errors
    /// - Duration is too large to represent.
    pub fn new(max_age: std::time::Duration) -> crate::Result<Self> {
        let max_age = Duration::from_std(max_age).map_err(|_| {
            crate::Error::Config(format!("Retention duration out of range: {:?}", max_age))
        })?;
        Ok(Self { max_age })
    }

    /// The instant before which remote objects are eligible for deletion.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_label() {
        let single = BackupScope::Database("app".to_string());
        assert_eq!(single.label(), "app");

        let all = BackupScope::AllDatabases {
            hostname: "db01".to_string(),
        };
        assert_eq!(all.label(), "db01");
        assert_eq!(all.to_string(), "db01");
    }

    #[test]
    fn test_cutoff_is_now_minus_max_age() {
        let policy = RetentionPolicy::new(std::time::Duration::from_secs(7 * 24 * 3600)).unwrap();
        let now = Utc::now();

        assert_eq!(policy.cutoff(now), now - Duration::days(7));
    }

    #[test]
    fn test_retention_rejects_unrepresentable_duration() {
        let result = RetentionPolicy::new(std::time::Duration::from_secs(u64::MAX));
        assert!(result.is_err());
    }
}
