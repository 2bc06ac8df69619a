use tokio_cron_scheduler::{Job, JobScheduler};

use crate::service::ProcessingService;

/// Registers the retention sweep on `scheduler`. The caller starts it.
pub async fn start_cleanup_scheduler(scheduler: &JobScheduler, service: ProcessingService) -> anyhow::Result<()> {
    let cron = service.config.cleanup_cron.clone();
    let retention_minutes = service.config.upload_retention_minutes;

    let cleanup_job = Job::new_async(cron.as_str(), move |_uuid, _l| {
        let service = service.clone();
        Box::pin(async move {
            tracing::debug!("Checking for expired jobs");
            let removed = service.cleanup_expired().await;
            if removed > 0 {
                tracing::info!(removed, "Cleanup sweep finished");
            }
        })
    })?;

    scheduler.add(cleanup_job).await?;
    tracing::info!(cron = %cron, retention_minutes, "Cleanup job registered");
    Ok(())
}
