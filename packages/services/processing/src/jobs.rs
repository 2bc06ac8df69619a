use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::models::{EngineStatus, Job, ProcessingError, Result, ResultBundle, StageSnapshot};
use crate::pipeline::StatusSink;

struct JobEntry {
    job: Job,
    sequence: u64,
    // Dropped once the job finishes so subscribers see the stream end
    updates: Option<broadcast::Sender<StageSnapshot>>,
}

impl JobEntry {
    fn snapshot(&self) -> StageSnapshot {
        StageSnapshot { job_id: self.job.id, sequence: self.sequence, stages: self.job.stages.clone() }
    }
}

/// In-memory job records keyed by batch ID. The orchestrator run of a job is
/// the only writer of its stage list; everything else reads.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
    buffer: usize,
}

impl JobRegistry {
    pub fn new(buffer: usize) -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())), buffer: buffer.max(1) }
    }

    pub async fn register(&self, job: Job) {
        let (tx, _) = broadcast::channel(self.buffer);
        let id = job.id;
        self.inner
            .write()
            .await
            .insert(id, JobEntry { job, sequence: 0, updates: Some(tx) });
        tracing::debug!(job_id = %id, "Registered job");
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.inner.read().await.get(&id).map(|e| e.job.clone())
    }

    pub async fn require(&self, id: Uuid) -> Result<Job> {
        self.get(id).await.ok_or(ProcessingError::JobNotFound(id))
    }

    /// Newest first.
    pub async fn list(&self, limit: Option<usize>) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.inner.read().await.values().map(|e| e.job.clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            jobs.truncate(limit);
        }
        jobs
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Current snapshot plus a receiver for every later one. The receiver is
    /// `None` when the job has already finished.
    pub async fn subscribe(&self, id: Uuid) -> Result<(StageSnapshot, Option<broadcast::Receiver<StageSnapshot>>)> {
        let guard = self.inner.read().await;
        let entry = guard.get(&id).ok_or(ProcessingError::JobNotFound(id))?;
        Ok((entry.snapshot(), entry.updates.as_ref().map(|tx| tx.subscribe())))
    }

    pub async fn publish_stages(&self, id: Uuid, stages: Vec<EngineStatus>) {
        let mut guard = self.inner.write().await;
        let Some(entry) = guard.get_mut(&id) else {
            tracing::warn!(job_id = %id, "Stage update for unknown job");
            return;
        };
        entry.job.apply_stages(stages);
        entry.sequence += 1;
        let snapshot = entry.snapshot();
        if let Some(tx) = &entry.updates {
            // No receivers is fine
            let _ = tx.send(snapshot);
        }
    }

    pub async fn complete(&self, id: Uuid, bundle: ResultBundle) {
        self.finish(id, |job| job.complete_successfully(bundle)).await;
    }

    pub async fn fail(&self, id: Uuid, error: String) {
        self.finish(id, |job| job.fail_with_error(error)).await;
    }

    async fn finish(&self, id: Uuid, apply: impl FnOnce(&mut Job)) {
        let mut guard = self.inner.write().await;
        if let Some(entry) = guard.get_mut(&id) {
            apply(&mut entry.job);
            entry.updates = None;
            tracing::debug!(job_id = %id, status = ?entry.job.status, "Job finished");
        }
    }

    /// Removes finished jobs last updated before `cutoff` and returns them.
    pub async fn remove_finished_before(&self, cutoff: DateTime<Utc>) -> Vec<Job> {
        let mut guard = self.inner.write().await;
        let expired: Vec<Uuid> = guard
            .values()
            .filter(|e| e.job.status.is_finished() && e.job.updated_at < cutoff)
            .map(|e| e.job.id)
            .collect();
        expired.into_iter().filter_map(|id| guard.remove(&id).map(|e| e.job)).collect()
    }

    pub fn sink(&self, job_id: Uuid) -> JobStatusSink {
        JobStatusSink { registry: self.clone(), job_id }
    }
}

/// Routes orchestrator snapshots for one job into the registry.
pub struct JobStatusSink {
    registry: JobRegistry,
    job_id: Uuid,
}

#[async_trait]
impl StatusSink for JobStatusSink {
    async fn publish(&self, stages: &[EngineStatus]) {
        self.registry.publish_stages(self.job_id, stages.to_vec()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobStatus, StageStatus};
    use crate::pipeline::transition;
    use crate::models::StageName;

    #[tokio::test]
    async fn subscribers_receive_full_snapshots_in_sequence() {
        let registry = JobRegistry::new(8);
        let job = Job::new(Uuid::new_v4(), vec![]);
        let id = job.id;
        registry.register(job).await;

        let (initial, rx) = registry.subscribe(id).await.unwrap();
        let mut rx = rx.unwrap();
        assert_eq!(initial.sequence, 0);
        assert!(initial.stages.iter().all(|s| s.status == StageStatus::Idle));

        let stages = transition(&initial.stages, StageName::ImageProcessing, StageStatus::Processing).unwrap();
        registry.sink(id).publish(&stages).await;

        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.stages.len(), 5);
        assert_eq!(snapshot.stages[0].status, StageStatus::Processing);
        assert_eq!(registry.get(id).await.unwrap().status, JobStatus::Running);
    }

    #[tokio::test]
    async fn finishing_closes_the_update_stream() {
        let registry = JobRegistry::new(8);
        let job = Job::new(Uuid::new_v4(), vec![]);
        let id = job.id;
        registry.register(job).await;
        let (_, rx) = registry.subscribe(id).await.unwrap();
        let mut rx = rx.unwrap();

        registry.fail(id, "storage offline".into()).await;
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));

        let (_, rx) = registry.subscribe(id).await.unwrap();
        assert!(rx.is_none());
        assert_eq!(registry.get(id).await.unwrap().error.as_deref(), Some("storage offline"));
    }

    #[tokio::test]
    async fn unknown_job_is_reported() {
        let registry = JobRegistry::new(8);
        assert!(matches!(registry.require(Uuid::new_v4()).await, Err(ProcessingError::JobNotFound(_))));
        assert!(registry.subscribe(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn only_old_finished_jobs_are_removed() {
        let registry = JobRegistry::new(8);
        let running = Job::new(Uuid::new_v4(), vec![]);
        let finished = Job::new(Uuid::new_v4(), vec![]);
        let finished_id = finished.id;
        registry.register(running).await;
        registry.register(finished).await;
        registry.fail(finished_id, "x".into()).await;

        let removed = registry.remove_finished_before(Utc::now() + chrono::Duration::seconds(1)).await;
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, finished_id);
        assert_eq!(registry.len().await, 1);
    }
}
