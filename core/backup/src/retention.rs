//! Time-based retention over remote backups.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{info, warn};

use dbferry_common::{Error, RemoteObject, RemoteStore, Result};

/// Retries for the folder listing. Listing is idempotent, so transient
/// network failures are retried with backoff; deletions are not.
const LIST_MAX_RETRIES: u32 = 3;
const LIST_INITIAL_DELAY_MS: u64 = 500;

/// Outcome of one pruning pass.
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Names of deleted objects.
    pub deleted: Vec<String>,
    /// Objects that could not be deleted, with the error message.
    pub failures: Vec<(String, String)>,
}

impl PruneReport {
    /// Whether every eligible object was deleted.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delete every object in `folder_id` strictly older than `cutoff`.
///
/// Deletions are independent: a failure deleting one object is recorded in
/// the report and pruning continues with the rest. Re-running with the same
/// cutoff over an unchanged folder deletes nothing, because already-deleted
/// objects no longer appear in the listing.
pub async fn prune(
    store: &dyn RemoteStore,
    folder_id: &str,
    cutoff: DateTime<Utc>,
) -> Result<PruneReport> {
    let listing = list_with_retry(store, folder_id).await?;

    let mut report = PruneReport::default();

    for object in listing {
        if object.modified >= cutoff {
            continue;
        }

        info!("Deleting: {}", object.name);

        match store.delete(&object.id).await {
            Ok(()) => report.deleted.push(object.name),
            Err(e) => {
                warn!("Failed to delete {}: {}", object.name, e);
                report.failures.push((object.name, e.to_string()));
            }
        }
    }

    Ok(report)
}

async fn list_with_retry(store: &dyn RemoteStore, folder_id: &str) -> Result<Vec<RemoteObject>> {
    let mut attempt = 0;

    loop {
        match store.list_folder(folder_id).await {
            Ok(listing) => return Ok(listing),
            Err(e) if matches!(e, Error::Network(_)) && attempt < LIST_MAX_RETRIES => {
                let delay = Duration::from_millis(LIST_INITIAL_DELAY_MS << attempt);
                attempt += 1;
                warn!(
                    "Listing attempt {} failed: {}. Retrying in {:?}...",
                    attempt, e, delay
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// In-memory remote folder with optional injected failures.
    struct FakeStore {
        objects: Mutex<Vec<RemoteObject>>,
        undeletable: HashSet<String>,
        list_failures_remaining: AtomicU32,
    }

    impl FakeStore {
        fn with_objects(objects: Vec<RemoteObject>) -> Self {
            Self {
                objects: Mutex::new(objects),
                undeletable: HashSet::new(),
                list_failures_remaining: AtomicU32::new(0),
            }
        }

        fn refusing_to_delete(mut self, id: &str) -> Self {
            self.undeletable.insert(id.to_string());
            self
        }

        fn failing_lists(self, count: u32) -> Self {
            self.list_failures_remaining.store(count, Ordering::SeqCst);
            self
        }

        fn names(&self) -> Vec<String> {
            self.objects
                .lock()
                .unwrap()
                .iter()
                .map(|o| o.name.clone())
                .collect()
        }
    }

    #[async_trait]
    impl RemoteStore for FakeStore {
        async fn upload(
            &self,
            name: &str,
            _folder_id: &str,
            _mime_type: &str,
            _data: Vec<u8>,
        ) -> Result<RemoteObject> {
            let object = RemoteObject {
                id: format!("id-{}", name),
                name: name.to_string(),
                modified: Utc::now(),
            };
            self.objects.lock().unwrap().push(object.clone());
            Ok(object)
        }

        async fn list_folder(&self, _folder_id: &str) -> Result<Vec<RemoteObject>> {
            if self
                .list_failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(Error::Network("listing flaked".to_string()));
            }
            Ok(self.objects.lock().unwrap().clone())
        }

        async fn delete(&self, id: &str) -> Result<()> {
            if self.undeletable.contains(id) {
                return Err(Error::Network("delete rejected".to_string()));
            }
            self.objects.lock().unwrap().retain(|o| o.id != id);
            Ok(())
        }
    }

    fn object(id: &str, modified: DateTime<Utc>) -> RemoteObject {
        RemoteObject {
            id: id.to_string(),
            name: format!("{}.sql", id),
            modified,
        }
    }

    #[tokio::test]
    async fn test_prune_deletes_strictly_older_than_cutoff() {
        let cutoff = Utc::now();
        let store = FakeStore::with_objects(vec![
            object("older", cutoff - ChronoDuration::seconds(1)),
            object("at-cutoff", cutoff),
            object("newer", cutoff + ChronoDuration::seconds(1)),
        ]);

        let report = prune(&store, "folder", cutoff).await.unwrap();

        assert_eq!(report.deleted, vec!["older.sql"]);
        assert!(report.is_clean());
        assert_eq!(store.names(), vec!["at-cutoff.sql", "newer.sql"]);
    }

    #[tokio::test]
    async fn test_prune_twice_is_idempotent() {
        let cutoff = Utc::now();
        let store = FakeStore::with_objects(vec![
            object("old1", cutoff - ChronoDuration::hours(2)),
            object("old2", cutoff - ChronoDuration::hours(1)),
            object("kept", cutoff + ChronoDuration::hours(1)),
        ]);

        let first = prune(&store, "folder", cutoff).await.unwrap();
        assert_eq!(first.deleted.len(), 2);

        let second = prune(&store, "folder", cutoff).await.unwrap();
        assert!(second.deleted.is_empty());
        assert!(second.is_clean());
    }

    #[tokio::test]
    async fn test_one_failed_deletion_does_not_abort_the_rest() {
        let cutoff = Utc::now();
        let store = FakeStore::with_objects(vec![
            object("stuck", cutoff - ChronoDuration::hours(3)),
            object("old", cutoff - ChronoDuration::hours(2)),
        ])
        .refusing_to_delete("stuck");

        let report = prune(&store, "folder", cutoff).await.unwrap();

        assert_eq!(report.deleted, vec!["old.sql"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "stuck.sql");
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_listing_retries_transient_network_failures() {
        let cutoff = Utc::now();
        let store = FakeStore::with_objects(vec![object(
            "old",
            cutoff - ChronoDuration::hours(1),
        )])
        .failing_lists(2);

        let report = prune(&store, "folder", cutoff).await.unwrap();
        assert_eq!(report.deleted, vec!["old.sql"]);
    }

    #[tokio::test]
    async fn test_listing_gives_up_after_max_retries() {
        let store = FakeStore::with_objects(Vec::new()).failing_lists(u32::MAX);

        let result = prune(&store, "folder", Utc::now()).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_empty_folder_is_a_clean_no_op() {
        let store = FakeStore::with_objects(Vec::new());

        let report = prune(&store, "folder", Utc::now()).await.unwrap();
        assert!(report.deleted.is_empty());
        assert!(report.is_clean());
    }
}
