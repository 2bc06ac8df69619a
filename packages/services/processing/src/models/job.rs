use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{initial_stages, EngineStatus, ResultBundle, StageStatus, StoredImage};

#[derive(Enum, Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Session record for one uploaded batch, keyed by batch ID.
#[derive(SimpleObject, Debug, Clone, Serialize, Deserialize)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub stages: Vec<EngineStatus>,
    pub images: Vec<StoredImage>,
    #[graphql(skip)]
    pub bundle: Option<ResultBundle>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub duration_ms: Option<i64>,
}

impl Job {
    pub fn new(id: Uuid, images: Vec<StoredImage>) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            stages: initial_stages(),
            images,
            bundle: None,
            error: None,
            created_at: now,
            updated_at: now,
            duration_ms: None,
        }
    }

    pub fn apply_stages(&mut self, stages: Vec<EngineStatus>) {
        if self.status == JobStatus::Pending
            && stages.iter().any(|s| s.status != StageStatus::Idle)
        {
            self.status = JobStatus::Running;
        }
        self.stages = stages;
        self.updated_at = Utc::now();
    }

    pub fn complete_successfully(&mut self, bundle: ResultBundle) {
        self.status = JobStatus::Completed;
        self.bundle = Some(bundle);
        self.finish();
    }

    pub fn fail_with_error(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.finish();
    }

    fn finish(&mut self) {
        self.updated_at = Utc::now();
        self.duration_ms = Some((self.updated_at - self.created_at).num_milliseconds());
    }
}
