use crate::domain::models::{TaskRecord, TaskRecordPatch};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::KeyValueStore;
use crate::infrastructure::local_cache::LocalCache;
use crate::infrastructure::remote_store::RemoteTaskStore;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PushReport {
    pub pushed: usize,
    pub failed: usize,
    pub already_remote: usize,
}

/// Local-first task collection with best-effort remote replication.
///
/// Every mutation lands in the local cache first; the remote call that
/// follows may fail without affecting the caller. Reads prefer the remote
/// copy and fall back to the cache when it is unreachable.
pub struct TaskStore<K, R>
where
    K: KeyValueStore,
    R: RemoteTaskStore + ?Sized + 'static,
{
    cache: Arc<LocalCache<K>>,
    remote: Arc<R>,
}

impl<K, R> TaskStore<K, R>
where
    K: KeyValueStore,
    R: RemoteTaskStore + ?Sized + 'static,
{
    pub fn new(cache: Arc<LocalCache<K>>, remote: Arc<R>) -> Self {
        Self { cache, remote }
    }

    /// Merged view of remote and local records, newest first.
    ///
    /// Local records the remote does not know yet are returned immediately
    /// and replicated in the background. A record deleted remotely but still
    /// cached locally is therefore re-inserted. The cache is read only once
    /// the remote answers, so a local delete made meanwhile is respected.
    pub async fn list(&self) -> Vec<TaskRecord> {
        let remote = match self.remote.list().await {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(error = %error, "remote list failed, serving local cache");
                return self.cache.tasks();
            }
        };
        let local = self.cache.tasks();

        let mut merged: HashMap<String, TaskRecord> = remote
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        for record in local {
            if merged.contains_key(&record.id) {
                continue;
            }
            self.replicate_in_background(record.clone());
            merged.insert(record.id.clone(), record);
        }

        let mut records = merged.into_values().collect::<Vec<_>>();
        records.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.id.cmp(&left.id))
        });
        records
    }

    pub async fn save(&self, record: &TaskRecord) {
        if let Err(error) = self.cache.prepend_task(record) {
            tracing::error!(task_id = %record.id, error = %error, "failed to write task to local cache");
        }
        match self.remote.insert(record).await {
            Ok(()) => tracing::info!(task_id = %record.id, "task saved"),
            Err(error) => {
                tracing::warn!(task_id = %record.id, error = %error, "remote insert failed, kept locally")
            }
        }
    }

    /// Returns the patched local record, or `None` when the id is not cached.
    pub async fn update(&self, id: &str, patch: &TaskRecordPatch) -> Option<TaskRecord> {
        let updated = match self.cache.update_task(id, patch) {
            Ok(updated) => updated,
            Err(error) => {
                tracing::error!(task_id = id, error = %error, "failed to update task in local cache");
                None
            }
        };
        if let Err(error) = self.remote.update(id, patch).await {
            tracing::warn!(task_id = id, error = %error, "remote update failed");
        }
        updated
    }

    /// Returns whether the record existed locally.
    pub async fn delete(&self, id: &str) -> bool {
        let removed = match self.cache.delete_task(id) {
            Ok(removed) => removed,
            Err(error) => {
                tracing::error!(task_id = id, error = %error, "failed to delete task from local cache");
                false
            }
        };
        if let Err(error) = self.remote.delete(id).await {
            tracing::warn!(task_id = id, error = %error, "remote delete failed");
        }
        removed
    }

    /// Inserts every cached record the remote is missing and waits for the
    /// results.
    pub async fn push_local(&self) -> Result<PushReport, InfraError> {
        let remote_ids = self
            .remote
            .list()
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect::<HashSet<_>>();

        let mut report = PushReport::default();
        for record in self.cache.tasks() {
            if remote_ids.contains(&record.id) {
                report.already_remote += 1;
                continue;
            }
            match self.remote.insert(&record).await {
                Ok(()) => report.pushed += 1,
                Err(error) => {
                    tracing::warn!(task_id = %record.id, error = %error, "failed to push task");
                    report.failed += 1;
                }
            }
        }
        tracing::info!(
            pushed = report.pushed,
            failed = report.failed,
            already_remote = report.already_remote,
            "local tasks pushed"
        );
        Ok(report)
    }

    fn replicate_in_background(&self, record: TaskRecord) {
        let remote = Arc::clone(&self.remote);
        tokio::spawn(async move {
            if let Err(error) = remote.insert(&record).await {
                tracing::warn!(task_id = %record.id, error = %error, "background replication failed");
            }
        });
    }
}
