use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::config::Config;
use crate::metrics;
use crate::models::{initial_stages, EngineStatus, ProcessingError, Result, ResultBundle, StageName, StageStatus};
use crate::pipeline::{aggregator, standard_stages, BatchContext, Stage};

/// Receives the full stage list after every transition.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn publish(&self, stages: &[EngineStatus]);
}

/// Pure state transition over a batch's stage list.
///
/// Only idle -> processing -> complete | error is allowed, and a stage may only
/// start once every stage before it is complete, so at most one stage is ever
/// processing.
pub fn transition(stages: &[EngineStatus], stage: StageName, next: StageStatus) -> Result<Vec<EngineStatus>> {
    let idx = stages
        .iter()
        .position(|s| s.name == stage)
        .ok_or_else(|| ProcessingError::Configuration(format!("stage {} is not part of this pipeline", stage)))?;
    let current = stages[idx].status;
    let invalid = || ProcessingError::InvalidTransition { stage, from: current, to: next };

    if !current.can_transition_to(next) {
        return Err(invalid());
    }
    if next == StageStatus::Processing {
        let predecessors_done = stages[..idx].iter().all(|s| s.status == StageStatus::Complete);
        let another_running = stages.iter().any(|s| s.status == StageStatus::Processing);
        if !predecessors_done || another_running {
            return Err(invalid());
        }
    }

    let mut out = stages.to_vec();
    out[idx].status = next;
    Ok(out)
}

/// Drives a batch through the stages strictly in order.
pub struct Orchestrator {
    stages: Vec<Arc<dyn Stage>>,
    pacing: Duration,
    stage_timeout: Option<Duration>,
}

impl Orchestrator {
    /// Stages must be given in the declared pipeline order.
    pub fn new(stages: Vec<Arc<dyn Stage>>, pacing: Duration, stage_timeout: Option<Duration>) -> Result<Self> {
        let names: Vec<StageName> = stages.iter().map(|s| s.name()).collect();
        if names != StageName::ALL {
            return Err(ProcessingError::Configuration(format!(
                "pipeline stages must be {:?}, got {:?}",
                StageName::ALL,
                names
            )));
        }
        Ok(Self { stages, pacing, stage_timeout })
    }

    pub fn standard(config: &Config) -> Self {
        Self {
            stages: standard_stages(),
            pacing: config.stage_delay(),
            stage_timeout: config.stage_timeout(),
        }
    }

    /// Runs every stage and assembles the bundle. The first failing stage
    /// ends the run: it is marked error and the stages after it stay idle.
    pub async fn run(&self, mut ctx: BatchContext, sink: &dyn StatusSink) -> Result<ResultBundle> {
        let job_id = ctx.job_id;
        let mut statuses = initial_stages();

        for stage in &self.stages {
            let name = stage.name();
            statuses = transition(&statuses, name, StageStatus::Processing)?;
            sink.publish(&statuses).await;
            tracing::info!(job_id = %job_id, stage = %name, "Stage started");

            let started = Instant::now();
            let outcome = self.run_stage(stage.as_ref(), &mut ctx).await;
            let took_ms = started.elapsed().as_millis() as u64;
            metrics::record_stage_latency(took_ms);

            match outcome {
                Ok(()) => {
                    statuses = transition(&statuses, name, StageStatus::Complete)?;
                    sink.publish(&statuses).await;
                    tracing::info!(job_id = %job_id, stage = %name, took_ms, "Stage complete");
                }
                Err(e) => {
                    statuses = transition(&statuses, name, StageStatus::Error)?;
                    sink.publish(&statuses).await;
                    metrics::record_stage_failure();
                    tracing::error!(job_id = %job_id, stage = %name, took_ms, error = %e, "Stage failed; aborting batch");
                    return Err(e);
                }
            }
        }

        aggregator::assemble(&statuses, ctx)
    }

    async fn run_stage(&self, stage: &dyn Stage, ctx: &mut BatchContext) -> Result<()> {
        let pacing = self.pacing;
        let work = async {
            stage.run(ctx).await?;
            if !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            Ok(())
        };

        match self.stage_timeout {
            Some(limit) => timeout(limit, work)
                .await
                .map_err(|_| ProcessingError::StageTimeout(stage.name()))?,
            None => work.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stages::{ClassificationStage, ImageProcessingStage, IntegrationStage, OutputStage, SegmentationStage};
    use tokio::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSink {
        snapshots: Mutex<Vec<Vec<EngineStatus>>>,
    }

    #[async_trait]
    impl StatusSink for RecordingSink {
        async fn publish(&self, stages: &[EngineStatus]) {
            self.snapshots.lock().await.push(stages.to_vec());
        }
    }

    struct FailingStage(StageName);

    #[async_trait]
    impl Stage for FailingStage {
        fn name(&self) -> StageName {
            self.0
        }

        async fn run(&self, _ctx: &mut BatchContext) -> Result<()> {
            Err(ProcessingError::stage(self.0, "model unavailable"))
        }
    }

    struct HangingStage(StageName);

    #[async_trait]
    impl Stage for HangingStage {
        fn name(&self) -> StageName {
            self.0
        }

        async fn run(&self, _ctx: &mut BatchContext) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn statuses_of(snapshot: &[EngineStatus]) -> Vec<StageStatus> {
        snapshot.iter().map(|s| s.status).collect()
    }

    #[test]
    fn transition_rejects_skips_and_regressions() {
        let stages = initial_stages();
        assert!(transition(&stages, StageName::Segmentation, StageStatus::Processing).is_err());
        assert!(transition(&stages, StageName::ImageProcessing, StageStatus::Complete).is_err());

        let stages = transition(&stages, StageName::ImageProcessing, StageStatus::Processing).unwrap();
        assert!(transition(&stages, StageName::ImageProcessing, StageStatus::Idle).is_err());
        assert!(transition(&stages, StageName::Segmentation, StageStatus::Processing).is_err());

        let stages = transition(&stages, StageName::ImageProcessing, StageStatus::Complete).unwrap();
        assert!(transition(&stages, StageName::ImageProcessing, StageStatus::Processing).is_err());
        let stages = transition(&stages, StageName::Segmentation, StageStatus::Processing).unwrap();
        assert_eq!(stages.iter().filter(|s| s.status == StageStatus::Processing).count(), 1);
    }

    #[test]
    fn transition_blocks_stages_after_an_error() {
        let stages = transition(&initial_stages(), StageName::ImageProcessing, StageStatus::Processing).unwrap();
        let stages = transition(&stages, StageName::ImageProcessing, StageStatus::Error).unwrap();
        assert!(matches!(
            transition(&stages, StageName::Segmentation, StageStatus::Processing),
            Err(ProcessingError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn new_rejects_out_of_order_stages() {
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(SegmentationStage),
            Arc::new(ImageProcessingStage),
            Arc::new(ClassificationStage),
            Arc::new(IntegrationStage),
            Arc::new(OutputStage),
        ];
        assert!(matches!(Orchestrator::new(stages, Duration::ZERO, None), Err(ProcessingError::Configuration(_))));
    }

    #[tokio::test]
    async fn empty_batch_walks_every_stage_in_order() {
        let orchestrator = Orchestrator::new(standard_stages(), Duration::ZERO, None).unwrap();
        let sink = RecordingSink::default();
        let bundle = orchestrator
            .run(BatchContext::new(Uuid::new_v4(), vec![], "1.0"), &sink)
            .await
            .unwrap();
        assert!(bundle.images.is_empty());

        let snapshots = sink.snapshots.lock().await;
        assert_eq!(snapshots.len(), 10);
        for snapshot in snapshots.iter() {
            assert_eq!(snapshot.len(), 5);
        }
        // every stage seen processing before complete, one at a time
        for (i, snapshot) in snapshots.iter().enumerate() {
            let stage = i / 2;
            let expected = if i % 2 == 0 { StageStatus::Processing } else { StageStatus::Complete };
            assert_eq!(snapshot[stage].status, expected);
            assert!(snapshot[..stage].iter().all(|s| s.status == StageStatus::Complete));
            assert!(snapshot[stage + 1..].iter().all(|s| s.status == StageStatus::Idle));
        }
    }

    #[tokio::test]
    async fn failing_stage_aborts_remaining_stages() {
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(ImageProcessingStage),
            Arc::new(FailingStage(StageName::Segmentation)),
            Arc::new(ClassificationStage),
            Arc::new(IntegrationStage),
            Arc::new(OutputStage),
        ];
        let orchestrator = Orchestrator::new(stages, Duration::ZERO, None).unwrap();
        let sink = RecordingSink::default();
        let err = orchestrator
            .run(BatchContext::new(Uuid::new_v4(), vec![], "1.0"), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Stage { stage: StageName::Segmentation, .. }));

        let snapshots = sink.snapshots.lock().await;
        let last = snapshots.last().unwrap();
        assert_eq!(
            statuses_of(last),
            vec![StageStatus::Complete, StageStatus::Error, StageStatus::Idle, StageStatus::Idle, StageStatus::Idle]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_stage_times_out() {
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(HangingStage(StageName::ImageProcessing)),
            Arc::new(SegmentationStage),
            Arc::new(ClassificationStage),
            Arc::new(IntegrationStage),
            Arc::new(OutputStage),
        ];
        let orchestrator = Orchestrator::new(stages, Duration::ZERO, Some(Duration::from_millis(50))).unwrap();
        let sink = RecordingSink::default();
        let err = orchestrator
            .run(BatchContext::new(Uuid::new_v4(), vec![], "1.0"), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::StageTimeout(StageName::ImageProcessing)));
        assert_eq!(sink.snapshots.lock().await.last().unwrap()[0].status, StageStatus::Error);
    }
}
