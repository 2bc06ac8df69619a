pub mod app;
pub mod cli;
pub mod config;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod presentation;
pub mod processing;
pub mod scheduler;
pub mod schema;
pub mod service;

// Convenient re-exports for tests and external callers
pub use app::router;
pub use config::*;
pub use models::*;
pub use presentation::ResultViewer;
pub use service::ProcessingService;
