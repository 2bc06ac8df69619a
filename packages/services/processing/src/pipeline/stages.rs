use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::models::{
    image_id, Annotation, ClassificationData, ClassificationResult, Prediction, ProcessingError, Region, Result,
    SegmentationData, SegmentationResult, StageName, UploadedImage,
};
use crate::pipeline::BatchContext;
use crate::processing::preprocess_image;

/// Labels of the road-surface classifier, in model output order.
pub const ROAD_SURFACE_LABELS: [&str; 16] = [
    "dry-asphalt-bad",
    "dry-asphalt-good",
    "dry-asphalt-intermediate",
    "dry-paved-bad",
    "dry-paved-good",
    "dry-paved-intermediate",
    "unpaved",
    "water-asphalt",
    "water-paved",
    "water-unpaved",
    "wet-asphalt-bad",
    "wet-asphalt-good",
    "wet-asphalt-intermediate",
    "wet-paved-bad",
    "wet-paved-good",
    "wet-paved-intermediate",
];

/// One unit of the pipeline. Real models plug in by implementing this trait.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    async fn run(&self, ctx: &mut BatchContext) -> Result<()>;
}

/// The five built-in stages in declared order.
pub fn standard_stages() -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(ImageProcessingStage),
        Arc::new(SegmentationStage),
        Arc::new(ClassificationStage),
        Arc::new(IntegrationStage),
        Arc::new(OutputStage),
    ]
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Deterministic placeholder score in `[floor, 1.0]` taken from one digest byte.
fn mock_confidence(digest: &[u8; 32], byte: usize, floor: f64) -> f64 {
    let unit = digest[byte % digest.len()] as f64 / 255.0;
    round4(floor + (1.0 - floor) * unit)
}

fn ensure_len(stage: StageName, what: &str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(ProcessingError::stage(
            stage,
            format!("expected {} {} entries, found {}", expected, what, got),
        ));
    }
    Ok(())
}

pub struct ImageProcessingStage;

#[async_trait]
impl Stage for ImageProcessingStage {
    fn name(&self) -> StageName {
        StageName::ImageProcessing
    }

    async fn run(&self, ctx: &mut BatchContext) -> Result<()> {
        let mut preprocessed = Vec::with_capacity(ctx.images.len());
        for (index, stored) in ctx.images.iter().enumerate() {
            let data = tokio::fs::read(&stored.path).await?;
            preprocessed.push(preprocess_image(image_id(index), stored, data).await?);
        }
        ctx.preprocessed = preprocessed;
        Ok(())
    }
}

pub struct SegmentationStage;

#[async_trait]
impl Stage for SegmentationStage {
    fn name(&self) -> StageName {
        StageName::Segmentation
    }

    async fn run(&self, ctx: &mut BatchContext) -> Result<()> {
        ensure_len(self.name(), "preprocessed", ctx.preprocessed.len(), ctx.image_count())?;

        ctx.segmentation = ctx
            .preprocessed
            .iter()
            .enumerate()
            .map(|(index, image)| {
                // Region ids stay unique across the batch
                let base = (index * 2) as u32;
                SegmentationResult {
                    image_id: image.image_id.clone(),
                    regions: vec![
                        Region { id: base, label: "road".to_string(), confidence: mock_confidence(&image.digest, 0, 0.6) },
                        Region { id: base + 1, label: "object".to_string(), confidence: mock_confidence(&image.digest, 1, 0.5) },
                    ],
                }
            })
            .collect();
        Ok(())
    }
}

pub struct ClassificationStage;

#[async_trait]
impl Stage for ClassificationStage {
    fn name(&self) -> StageName {
        StageName::Classification
    }

    async fn run(&self, ctx: &mut BatchContext) -> Result<()> {
        ensure_len(self.name(), "preprocessed", ctx.preprocessed.len(), ctx.image_count())?;

        let label_count = ROAD_SURFACE_LABELS.len();
        ctx.classification = ctx
            .preprocessed
            .iter()
            .map(|image| {
                let top = image.digest[2] as usize % label_count;
                let runner_up = (top + 1 + image.digest[3] as usize % (label_count - 1)) % label_count;
                let top_confidence = mock_confidence(&image.digest, 4, 0.5);
                let runner_up_confidence = round4((1.0 - top_confidence) * (0.5 + 0.5 * image.digest[5] as f64 / 255.0));

                ClassificationResult {
                    image_id: image.image_id.clone(),
                    predictions: vec![
                        Prediction { label: ROAD_SURFACE_LABELS[top].to_string(), confidence: top_confidence },
                        Prediction { label: ROAD_SURFACE_LABELS[runner_up].to_string(), confidence: runner_up_confidence },
                    ],
                }
            })
            .collect();
        Ok(())
    }
}

pub struct IntegrationStage;

#[async_trait]
impl Stage for IntegrationStage {
    fn name(&self) -> StageName {
        StageName::Integration
    }

    async fn run(&self, ctx: &mut BatchContext) -> Result<()> {
        let expected = ctx.image_count();
        ensure_len(self.name(), "preprocessed", ctx.preprocessed.len(), expected)?;
        ensure_len(self.name(), "segmentation", ctx.segmentation.len(), expected)?;
        ensure_len(self.name(), "classification", ctx.classification.len(), expected)?;

        let mut annotated = Vec::with_capacity(expected);
        for ((image, segments), classes) in ctx
            .preprocessed
            .iter()
            .zip(ctx.segmentation.iter())
            .zip(ctx.classification.iter())
        {
            if segments.image_id != image.image_id || classes.image_id != image.image_id {
                return Err(ProcessingError::stage(
                    self.name(),
                    format!("stage outputs out of order at {}", image.image_id),
                ));
            }

            let crop = image.crop;
            let apex_x = (crop.left + crop.width() / 2) as f64;
            let annotations = vec![
                Annotation::BoundingBox { coordinates: crop.as_bbox() },
                Annotation::Polygon {
                    points: vec![
                        [crop.left as f64, crop.bottom as f64],
                        [apex_x, crop.top as f64],
                        [crop.right as f64, crop.bottom as f64],
                    ],
                },
            ];

            annotated.push(UploadedImage {
                id: image.image_id.clone(),
                url: image.url.clone(),
                annotations,
                classification: classes.predictions.iter().map(|p| p.label.clone()).collect(),
            });
        }

        ctx.annotated = annotated;
        Ok(())
    }
}

pub struct OutputStage;

#[async_trait]
impl Stage for OutputStage {
    fn name(&self) -> StageName {
        StageName::Output
    }

    async fn run(&self, ctx: &mut BatchContext) -> Result<()> {
        let expected = ctx.image_count();
        ensure_len(self.name(), "annotated", ctx.annotated.len(), expected)?;
        ensure_len(self.name(), "segmentation", ctx.segmentation.len(), expected)?;
        ensure_len(self.name(), "classification", ctx.classification.len(), expected)?;

        let timestamp = Utc::now();
        let segmentation = SegmentationData {
            version: ctx.schema_version.clone(),
            timestamp,
            results: ctx.segmentation.clone(),
        };
        let classification = ClassificationData {
            version: ctx.schema_version.clone(),
            timestamp,
            results: ctx.classification.clone(),
        };
        ctx.artifacts = Some((segmentation, classification));
        Ok(())
    }
}
