use crate::models::{EngineStatus, ProcessingError, ResultBundle, Result, StageStatus};
use crate::pipeline::BatchContext;

/// Assembles the bundle for a finished batch. Refuses anything partial:
/// every stage must be complete and every artifact must cover every image.
pub fn assemble(stages: &[EngineStatus], ctx: BatchContext) -> Result<ResultBundle> {
    if let Some(pending) = stages.iter().find(|s| s.status != StageStatus::Complete) {
        return Err(ProcessingError::IncompleteBundle(format!(
            "stage {} is {}",
            pending.name, pending.status
        )));
    }

    let expected = ctx.image_count();
    let (segmentation_data, classification_data) = ctx
        .artifacts
        .ok_or_else(|| ProcessingError::IncompleteBundle("artifacts were not produced".to_string()))?;

    let counts = [
        ("images", ctx.annotated.len()),
        ("segmentation", segmentation_data.results.len()),
        ("classification", classification_data.results.len()),
    ];
    for (what, got) in counts {
        if got != expected {
            return Err(ProcessingError::IncompleteBundle(format!(
                "{} has {} entries for {} images",
                what, got, expected
            )));
        }
    }

    Ok(ResultBundle { images: ctx.annotated, segmentation_data, classification_data })
}
