use uuid::Uuid;

use crate::models::{
    ClassificationData, ClassificationResult, SegmentationData, SegmentationResult, StoredImage, UploadedImage,
};
use crate::processing::PreprocessedImage;

/// Working state threaded through the stages of one batch. Each stage reads
/// what its predecessors produced and appends its own output.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub job_id: Uuid,
    pub images: Vec<StoredImage>,
    pub schema_version: String,
    pub preprocessed: Vec<PreprocessedImage>,
    pub segmentation: Vec<SegmentationResult>,
    pub classification: Vec<ClassificationResult>,
    pub annotated: Vec<UploadedImage>,
    pub artifacts: Option<(SegmentationData, ClassificationData)>,
}

impl BatchContext {
    pub fn new(job_id: Uuid, images: Vec<StoredImage>, schema_version: impl Into<String>) -> Self {
        Self {
            job_id,
            images,
            schema_version: schema_version.into(),
            preprocessed: Vec::new(),
            segmentation: Vec::new(),
            classification: Vec::new(),
            annotated: Vec::new(),
            artifacts: None,
        }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}
