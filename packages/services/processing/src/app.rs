use async_graphql_axum::{GraphQLRequest, GraphQLResponse, GraphQLSubscription};
use axum::{
    extract::DefaultBodyLimit,
    response::Html,
    routing::{get, post},
    Extension, Json, Router,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};

use crate::handlers::{download_artifact, get_job, list_jobs, process_images, submit_images};
use crate::metrics;
use crate::schema::{build_schema, ProcessingSchema};
use crate::service::ProcessingService;

/// Full HTTP surface: upload routes, job queries, stored files, GraphQL.
pub fn router(service: ProcessingService) -> Router {
    let config = service.config.clone();
    let schema = build_schema(service.clone());

    // Multipart uploads get the batch-sized limit instead of axum's 2MB default
    let uploads = Router::new()
        .route("/api/process", post(process_images))
        .route("/api/jobs", post(submit_images).get(list_jobs))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.request_body_limit()));

    Router::new()
        .merge(uploads)
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/jobs/{id}/artifacts/{kind}", get(download_artifact))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/graphql", get(graphql_playground).post(graphql_handler))
        .route_service("/graphql/ws", GraphQLSubscription::new(schema.clone()))
        .nest_service(&config.uploads_route, ServeDir::new(&config.upload_dir))
        .layer(Extension(schema))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn graphql_playground() -> Html<String> {
    Html(async_graphql::http::playground_source(
        async_graphql::http::GraphQLPlaygroundConfig::new("/graphql").subscription_endpoint("/graphql/ws"),
    ))
}

async fn graphql_handler(Extension(schema): Extension<ProcessingSchema>, req: GraphQLRequest) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics_handler() -> Json<serde_json::Value> {
    Json(metrics::export_metrics_json())
}
