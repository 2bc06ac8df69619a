use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::ApiError;
use crate::models::{ArtifactKind, Job, ProcessingError};
use crate::presentation::ResultViewer;
use crate::service::ProcessingService;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

pub async fn list_jobs(State(service): State<ProcessingService>, Query(params): Query<ListParams>) -> Json<Vec<Job>> {
    Json(service.registry.list(params.limit).await)
}

/// Malformed ids are reported with the usual `{error}` body.
pub fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ProcessingError::Validation(format!("invalid job id '{}'", raw)).into())
}

pub async fn get_job(State(service): State<ProcessingService>, Path(id): Path<String>) -> Result<Json<Job>, ApiError> {
    let id = parse_job_id(&id)?;
    Ok(Json(service.registry.require(id).await?))
}

/// Serves one artifact of a published bundle as a JSON attachment.
pub async fn download_artifact(
    State(service): State<ProcessingService>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let id = parse_job_id(&id)?;
    let kind: ArtifactKind = kind.parse()?;
    let job = service.registry.require(id).await?;

    let Some(bundle) = job.bundle.as_ref() else {
        let body = serde_json::json!({
            "error": format!("Results for job {} are not available", id),
            "status": job.status,
        });
        return Ok((StatusCode::CONFLICT, Json(body)).into_response());
    };

    let raw = ResultViewer::new(bundle).raw_json(kind)?;
    let disposition = format!("attachment; filename=\"{}\"", kind.file_name());
    Ok((
        [(header::CONTENT_TYPE, "application/json".to_string()), (header::CONTENT_DISPOSITION, disposition)],
        raw,
    )
        .into_response())
}
