use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::handlers::ApiError;
use crate::metrics;
use crate::models::{EngineStatus, IncomingFile, ProcessingError, ResultBundle};
use crate::service::ProcessingService;

/// Multipart field carrying the images; any other field is ignored.
pub const IMAGES_FIELD: &str = "images";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub job_id: Uuid,
    #[serde(flatten)]
    pub bundle: ResultBundle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub stages: Vec<EngineStatus>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::with_status(e.status(), ProcessingError::Multipart(e.body_text()))
}

/// Collects the `images` parts. The count cap is checked as parts arrive so
/// an oversized batch is refused before the rest of the body is buffered.
pub async fn read_images(service: &ProcessingService, mut multipart: Multipart) -> Result<Vec<IncomingFile>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGES_FIELD) {
            tracing::debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }
        if let Err(e) = service.validator.check_count(files.len() + 1) {
            metrics::record_batch_rejected();
            return Err(e.into());
        }

        let name = field.file_name().unwrap_or("image").to_string();
        let content_type = field.content_type().map(|c| c.to_string());
        let data = field.bytes().await.map_err(multipart_error)?;
        files.push(IncomingFile::new(name, content_type.as_deref(), data.to_vec()));
    }
    Ok(files)
}

/// POST /api/process: runs the whole pipeline and answers with the bundle.
pub async fn process_images(
    State(service): State<ProcessingService>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let files = read_images(&service, multipart).await?;
    let (job_id, bundle) = service.process(files).await?;
    Ok(Json(ProcessResponse { job_id, bundle }))
}

/// POST /api/jobs: accepts the batch and returns immediately with 202.
pub async fn submit_images(
    State(service): State<ProcessingService>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let files = read_images(&service, multipart).await?;
    let job = service.submit(files).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id: job.id, stages: job.stages })))
}
