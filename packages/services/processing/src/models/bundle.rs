use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{ProcessingError, UploadedImage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: u32,
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationResult {
    pub image_id: String,
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationData {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<SegmentationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub image_id: String,
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationData {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<ClassificationResult>,
}

/// Everything a batch produced. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultBundle {
    pub images: Vec<UploadedImage>,
    pub segmentation_data: SegmentationData,
    pub classification_data: ClassificationData,
}

impl ResultBundle {
    pub fn artifact_json(&self, kind: ArtifactKind) -> crate::models::Result<serde_json::Value> {
        let value = match kind {
            ArtifactKind::Segmentation => serde_json::to_value(&self.segmentation_data)?,
            ArtifactKind::Classification => serde_json::to_value(&self.classification_data)?,
        };
        Ok(value)
    }
}

#[derive(async_graphql::Enum, Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Segmentation,
    Classification,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Segmentation => "segmentation",
            ArtifactKind::Classification => "classification",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}-data.json", self.as_str())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "segmentation" => Ok(ArtifactKind::Segmentation),
            "classification" => Ok(ArtifactKind::Classification),
            other => Err(ProcessingError::Validation(format!("unknown artifact '{}'", other))),
        }
    }
}
