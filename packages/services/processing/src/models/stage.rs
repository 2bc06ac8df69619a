use async_graphql::{Enum, SimpleObject};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Pipeline stages, declared in execution order.
#[derive(Enum, Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum StageName {
    #[serde(rename = "Image Processing")]
    ImageProcessing,
    #[serde(rename = "Segmentation")]
    Segmentation,
    #[serde(rename = "Classification")]
    Classification,
    #[serde(rename = "Integration")]
    Integration,
    #[serde(rename = "Output")]
    Output,
}

impl StageName {
    pub const ALL: [StageName; 5] = [
        StageName::ImageProcessing,
        StageName::Segmentation,
        StageName::Classification,
        StageName::Integration,
        StageName::Output,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StageName::ImageProcessing => "Image Processing",
            StageName::Segmentation => "Segmentation",
            StageName::Classification => "Classification",
            StageName::Integration => "Integration",
            StageName::Output => "Output",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Enum, Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Idle,
    Processing,
    Complete,
    Error,
}

impl StageStatus {
    /// idle -> processing -> complete | error; nothing else.
    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        matches!(
            (self, next),
            (StageStatus::Idle, StageStatus::Processing)
                | (StageStatus::Processing, StageStatus::Complete)
                | (StageStatus::Processing, StageStatus::Error)
        )
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Idle => "idle",
            StageStatus::Processing => "processing",
            StageStatus::Complete => "complete",
            StageStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(SimpleObject, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub name: StageName,
    pub status: StageStatus,
}

impl EngineStatus {
    pub fn idle(name: StageName) -> Self {
        Self { name, status: StageStatus::Idle }
    }
}

/// Fresh stage list for a new batch: every stage idle, in declared order.
pub fn initial_stages() -> Vec<EngineStatus> {
    StageName::ALL.iter().copied().map(EngineStatus::idle).collect()
}

/// Full stage list pushed to observers after every transition.
#[derive(SimpleObject, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSnapshot {
    pub job_id: Uuid,
    pub sequence: u64,
    pub stages: Vec<EngineStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_stages_are_idle_and_ordered() {
        let stages = initial_stages();
        assert_eq!(stages.len(), 5);
        assert!(stages.iter().all(|s| s.status == StageStatus::Idle));
        let names: Vec<_> = stages.iter().map(|s| s.name).collect();
        assert_eq!(names, StageName::ALL.to_vec());
    }

    #[test]
    fn status_transitions_are_monotonic() {
        assert!(StageStatus::Idle.can_transition_to(StageStatus::Processing));
        assert!(StageStatus::Processing.can_transition_to(StageStatus::Complete));
        assert!(StageStatus::Processing.can_transition_to(StageStatus::Error));
        assert!(!StageStatus::Idle.can_transition_to(StageStatus::Complete));
        assert!(!StageStatus::Complete.can_transition_to(StageStatus::Processing));
        assert!(!StageStatus::Error.can_transition_to(StageStatus::Idle));
    }

    #[test]
    fn stage_names_serialize_as_labels() {
        let json = serde_json::to_value(EngineStatus::idle(StageName::ImageProcessing)).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Image Processing", "status": "idle"}));
    }
}
