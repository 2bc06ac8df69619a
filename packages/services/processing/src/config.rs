use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    // Flat directory holding uploaded files, served under `uploads_route`
    pub upload_dir: PathBuf,
    pub uploads_route: String,
    pub max_files: usize,
    pub max_file_size_mb: u64,
    pub allowed_mime_types: Vec<String>,
    // Pacing applied to every stage on top of its work (mirrors the demo UI timing)
    pub stage_delay_ms: u64,
    pub stage_timeout_ms: u64,
    pub artifact_schema_version: String,
    pub snapshot_buffer: usize,
    // Retention sweeper for finished jobs and their files
    pub enable_cleanup: bool,
    pub cleanup_cron: String,
    pub upload_retention_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            upload_dir: PathBuf::from("uploads"),
            uploads_route: "/uploads".to_string(),
            max_files: 10,
            max_file_size_mb: 20,
            allowed_mime_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
            stage_delay_ms: 1500,
            stage_timeout_ms: 30000,
            artifact_schema_version: "1.0".to_string(),
            snapshot_buffer: 64,
            enable_cleanup: false,
            cleanup_cron: "0 */5 * * * *".to_string(),
            upload_retention_minutes: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
    let get = |k: &str| std::env::var(k).ok();
    let defaults = Self::default();

    let port: u16 = get("PORT").and_then(|s| s.parse().ok()).unwrap_or(defaults.port);
    let upload_dir = get("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir);
    let uploads_route = get("UPLOADS_ROUTE")
        .map(|s| format!("/{}", s.trim_matches('/')))
        .unwrap_or(defaults.uploads_route);
    let max_files: usize = get("MAX_FILES").and_then(|s| s.parse().ok()).unwrap_or(defaults.max_files);
    let max_file_size_mb: u64 = get("MAX_FILE_SIZE_MB").and_then(|s| s.parse().ok()).unwrap_or(defaults.max_file_size_mb);
    let allowed_mime_types = get("ALLOWED_MIME_TYPES")
        .map(|v| v.split(',').map(|s| s.trim().to_ascii_lowercase()).filter(|s| !s.is_empty()).collect::<Vec<_>>())
        .filter(|v| !v.is_empty())
        .unwrap_or(defaults.allowed_mime_types);
    let stage_delay_ms: u64 = get("STAGE_DELAY_MS").and_then(|s| s.parse().ok()).unwrap_or(defaults.stage_delay_ms);
    let stage_timeout_ms: u64 = get("STAGE_TIMEOUT_MS").and_then(|s| s.parse().ok()).unwrap_or(defaults.stage_timeout_ms);
    let artifact_schema_version = get("ARTIFACT_SCHEMA_VERSION").unwrap_or(defaults.artifact_schema_version);
    let snapshot_buffer: usize = get("SNAPSHOT_BUFFER").and_then(|s| s.parse().ok()).unwrap_or(defaults.snapshot_buffer).max(1);
    let enable_cleanup = get("ENABLE_CLEANUP").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(defaults.enable_cleanup);
    let cleanup_cron = get("CLEANUP_CRON").unwrap_or(defaults.cleanup_cron);
    let upload_retention_minutes: i64 = get("UPLOAD_RETENTION_MINUTES").and_then(|s| s.parse().ok()).unwrap_or(defaults.upload_retention_minutes);

        Self {
            port,
            upload_dir,
            uploads_route,
            max_files,
            max_file_size_mb,
            allowed_mime_types,
            stage_delay_ms,
            stage_timeout_ms,
            artifact_schema_version,
            snapshot_buffer,
            enable_cleanup,
            cleanup_cron,
            upload_retention_minutes,
        }
    }

    pub fn max_file_size_bytes(&self) -> usize {
        usize::try_from(self.max_file_size_mb)
            .unwrap_or(usize::MAX)
            .saturating_mul(1024 * 1024)
    }

    /// Upper bound for a whole multipart body: every file at its cap plus form overhead.
    pub fn request_body_limit(&self) -> usize {
        self.max_file_size_bytes()
            .saturating_mul(self.max_files.max(1))
            .saturating_add(1024 * 1024)
    }

    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        if self.stage_timeout_ms == 0 { None } else { Some(Duration::from_millis(self.stage_timeout_ms)) }
    }
}
