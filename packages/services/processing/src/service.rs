use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::jobs::JobRegistry;
use crate::metrics;
use crate::models::{IncomingFile, Job, ProcessingError, Result, ResultBundle};
use crate::pipeline::{BatchContext, Orchestrator};
use crate::processing::{BatchValidator, LocalImageStorage};

/// Wires the upload transport, job registry and orchestrator together.
#[derive(Clone)]
pub struct ProcessingService {
    pub config: Arc<Config>,
    pub validator: Arc<BatchValidator>,
    pub storage: LocalImageStorage,
    pub registry: JobRegistry,
    orchestrator: Arc<Orchestrator>,
}

impl ProcessingService {
    pub async fn new(config: Config) -> Result<Self> {
        let orchestrator = Orchestrator::standard(&config);
        Self::with_orchestrator(config, orchestrator).await
    }

    pub async fn with_orchestrator(config: Config, orchestrator: Orchestrator) -> Result<Self> {
        let storage = LocalImageStorage::new(&config).await?;
        Ok(Self {
            validator: Arc::new(BatchValidator::new(&config)),
            registry: JobRegistry::new(config.snapshot_buffer),
            config: Arc::new(config),
            storage,
            orchestrator: Arc::new(orchestrator),
        })
    }

    /// Validates and persists a batch, then registers its job with every stage idle.
    /// Nothing is stored and no job exists when this fails.
    pub async fn accept_batch(&self, files: Vec<IncomingFile>) -> Result<Job> {
        let validated = match self.validator.validate_batch(files) {
            Ok(v) => v,
            Err(e) => {
                metrics::record_batch_rejected();
                tracing::warn!(error = %e, "Rejected upload batch");
                return Err(e);
            }
        };

        let images = self.storage.store_batch(validated).await?;
        metrics::record_batch_accepted(images.len());

        let job = Job::new(Uuid::new_v4(), images);
        tracing::info!(job_id = %job.id, image_count = job.images.len(), "Accepted upload batch");
        self.registry.register(job.clone()).await;
        Ok(job)
    }

    /// Runs the pipeline for a registered job and records the outcome on it.
    pub async fn run_job(&self, job_id: Uuid) -> Result<ResultBundle> {
        let job = self.registry.require(job_id).await?;
        let ctx = BatchContext::new(job_id, job.images, self.config.artifact_schema_version.clone());
        let sink = self.registry.sink(job_id);

        match self.orchestrator.run(ctx, &sink).await {
            Ok(bundle) => {
                self.registry.complete(job_id, bundle.clone()).await;
                metrics::record_batch_completed();
                tracing::info!(job_id = %job_id, image_count = bundle.images.len(), "Published result bundle");
                Ok(bundle)
            }
            Err(e) => {
                self.registry.fail(job_id, e.to_string()).await;
                metrics::record_batch_failed();
                Err(e)
            }
        }
    }

    /// Accepts a batch and waits for its bundle. The work runs on its own
    /// task, so a caller that goes away does not leave the job unfinished.
    pub async fn process(&self, files: Vec<IncomingFile>) -> Result<(Uuid, ResultBundle)> {
        let service = self.clone();
        tokio::spawn(async move {
            let job = service.accept_batch(files).await?;
            let bundle = service.run_job(job.id).await?;
            Ok((job.id, bundle))
        })
        .await
        .map_err(|e| ProcessingError::Task(e.to_string()))?
    }

    /// Accepts a batch and runs it in the background.
    pub async fn submit(&self, files: Vec<IncomingFile>) -> Result<Job> {
        let job = self.accept_batch(files).await?;
        let service = self.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            if let Err(e) = service.run_job(job_id).await {
                tracing::error!(job_id = %job_id, error = %e, "Background job failed");
            }
        });
        Ok(job)
    }

    /// Drops finished jobs older than the retention window together with their files.
    pub async fn cleanup_expired(&self) -> usize {
        let cutoff = chrono::Utc::now() - chrono::Duration::minutes(self.config.upload_retention_minutes);
        let expired = self.registry.remove_finished_before(cutoff).await;
        let mut removed_files = 0;
        for job in &expired {
            removed_files += self.storage.delete_images(&job.images).await;
        }
        metrics::record_files_deleted(removed_files);
        if !expired.is_empty() {
            tracing::info!(jobs = expired.len(), files = removed_files, "Removed expired jobs");
        }
        expired.len()
    }
}
